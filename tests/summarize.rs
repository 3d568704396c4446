//! Summarization engine tests
//!
//! Generative paths run against `MockModel`; nothing here needs network
//! access or model weights.

use std::sync::Arc;
use std::time::Duration;

use maildigest::config::{LimitsConfig, ModelConfig};
use maildigest::error::{MailDigestError, Result};
use maildigest::summarize::{
    extract_entities, fallback_record, heuristic_summary, FALLBACK_DOCUMENT_SUMMARY,
    FALLBACK_EMAIL_SUMMARY, FALLBACK_ENTITIES, MINIMAL_DOCUMENT_SUMMARY, MINIMAL_EMAIL_SUMMARY,
    NO_CONTENT_SUMMARY, NO_ENTITIES, NO_KEYWORDS,
};
use maildigest::{
    AttachmentRecord, EmailRecord, EmbeddingModel, Encoding, ExtractedDocument, MockBehavior,
    MockEmbedder, MockModel, ModelHandles, SummaryEngine, Tokenizer, WordTokenizer,
};

struct BrokenTokenizer;

impl Tokenizer for BrokenTokenizer {
    fn encode(&self, _text: &str, _max_tokens: usize) -> Result<Encoding> {
        Err(MailDigestError::Model("vocabulary missing".to_string()))
    }
}

struct PanickingTokenizer;

impl Tokenizer for PanickingTokenizer {
    fn encode(&self, _text: &str, _max_tokens: usize) -> Result<Encoding> {
        panic!("tokenizer state corrupted")
    }
}

fn email(subject: &str, body: &str) -> EmailRecord {
    EmailRecord {
        sender: "ops@example.com".to_string(),
        subject: subject.to_string(),
        date: "Thu, 4 Jan 2024 08:15:00 +0000".to_string(),
        body: body.to_string(),
        source_filename: "test.eml".to_string(),
        ..Default::default()
    }
}

fn document(filename: &str, text: &str) -> ExtractedDocument {
    let attachment = AttachmentRecord::new(filename, text.as_bytes().to_vec(), "text/plain");
    ExtractedDocument::new(&attachment, text.to_string())
}

fn heuristic_engine() -> SummaryEngine {
    SummaryEngine::heuristic(LimitsConfig::default())
}

fn mock_engine(model: Arc<MockModel>) -> SummaryEngine {
    SummaryEngine::new(
        ModelHandles::new(Arc::new(WordTokenizer), model),
        LimitsConfig::default(),
    )
}

// ============================================================================
// Heuristic summarizer
// ============================================================================

#[test]
fn test_heuristic_takes_first_three_sentences() {
    let text = "The vessel docked. Unloading starts at noon. Customs cleared it. Trucks wait outside.";
    assert_eq!(
        heuristic_summary(text),
        "The vessel docked. Unloading starts at noon. Customs cleared it."
    );
}

#[test]
fn test_heuristic_skips_empty_sentences() {
    let text = "...First real sentence.. . Second one. Third. Fourth.";
    assert_eq!(
        heuristic_summary(text),
        "First real sentence. Second one. Third."
    );
}

#[test]
fn test_heuristic_stops_at_character_budget() {
    let long = "a".repeat(150);
    let text = format!("{} first. {} second. third.", long, long);
    let summary = heuristic_summary(&text);

    assert_eq!(summary, format!("{} first. {} second.", long, long));
    assert!(!summary.contains("third"));
}

#[test]
fn test_heuristic_minimal_text() {
    assert_eq!(heuristic_summary(""), NO_CONTENT_SUMMARY);
    assert_eq!(heuristic_summary("   short  "), NO_CONTENT_SUMMARY);
}

#[test]
fn test_heuristic_without_periods_keeps_whole_text() {
    assert_eq!(
        heuristic_summary("  Please confirm receipt  "),
        "Please confirm receipt."
    );
}

// ============================================================================
// Keyword extraction
// ============================================================================

#[test]
fn test_entities_ranked_by_frequency() {
    let entities = extract_entities(&email("", "cargo cargo cargo ship ship dock"), &[]);
    assert_eq!(entities, ["cargo", "ship", "dock"]);
}

#[test]
fn test_entities_filter_short_and_non_alphabetic_tokens() {
    let entities = extract_entities(
        &email("", "The box at pier 42 holds spare parts, spare tools and cable"),
        &[],
    );
    assert_eq!(entities[0], "spare");
    assert!(!entities.iter().any(|e| e == "the" || e == "box" || e == "42"));
    assert!(!entities.iter().any(|e| e == "parts,"));
    assert!(entities.iter().any(|e| e == "pier"));
}

#[test]
fn test_entities_ties_keep_encounter_order() {
    let entities = extract_entities(&email("", "zeta alpha Beta ALPHA beta zeta"), &[]);
    assert_eq!(entities, ["zeta", "alpha", "beta"]);
}

#[test]
fn test_entities_include_documents_and_cap_at_ten() {
    let words = [
        "one", "apple", "banana", "cherry", "dates", "elder", "figs", "grape", "honeydew",
        "kiwis", "lemon", "mango",
    ];
    let body = words.join(" ");
    let docs = [document("fruit.txt", "mango mango lemon")];
    let entities = extract_entities(&email("", &body), &docs);

    assert_eq!(entities.len(), 10);
    assert_eq!(entities[0], "mango");
    assert_eq!(entities[1], "lemon");
    assert!(!entities.iter().any(|e| e == "one"));
}

#[test]
fn test_entities_sentinels() {
    assert_eq!(extract_entities(&email("Subject only", ""), &[]), [NO_ENTITIES]);
    assert_eq!(extract_entities(&email("", "   \n "), &[]), [NO_ENTITIES]);
    assert_eq!(extract_entities(&email("", "a an the 1234 foo,bar"), &[]), [NO_KEYWORDS]);
}

// ============================================================================
// Heuristic engine
// ============================================================================

#[tokio::test]
async fn test_empty_email_has_minimal_summary() {
    let record = heuristic_engine().summarize(&email("", ""), &[]).await;

    assert_eq!(record.email_summary, MINIMAL_EMAIL_SUMMARY);
    assert_eq!(record.key_entities, [NO_ENTITIES]);
    assert!(record.document_summaries.is_empty());
    assert_eq!(record.total_attachments, 0);
    assert_eq!(record.processed_documents, 0);
}

#[tokio::test]
async fn test_email_summary_uses_subject_and_body() {
    let record = heuristic_engine()
        .summarize(
            &email("Shipment update", "The container left. It arrives Friday. Call me."),
            &[],
        )
        .await;

    assert_eq!(
        record.email_summary,
        "Subject: Shipment update\n\nBody: The container left. It arrives Friday. Call me."
    );
    assert_eq!(record.email_metadata.subject, "Shipment update");
    assert_eq!(record.email_metadata.sender, "ops@example.com");
    assert_eq!(record.email_metadata.filename, "test.eml");
}

#[tokio::test]
async fn test_document_summaries() {
    let docs = [
        document("tiny.txt", "  ok   thx  "),
        document(
            "report.txt",
            "Quarterly volumes rose. Rotterdam led growth. Hamburg was flat. Antwerp fell.",
        ),
    ];
    let mut message = email("Reports", "Two reports attached for review.");
    message.attachments = vec![
        AttachmentRecord::new("tiny.txt", b"ok".to_vec(), "text/plain"),
        AttachmentRecord::new("report.txt", b"...".to_vec(), "text/plain"),
        AttachmentRecord::new("logo.gif", b"GIF89a".to_vec(), "image/gif"),
    ];

    let record = heuristic_engine().summarize(&message, &docs).await;

    assert_eq!(record.total_attachments, 3);
    assert_eq!(record.processed_documents, 2);
    assert_eq!(record.document_summaries.len(), 2);

    let tiny = &record.document_summaries[0];
    assert_eq!(tiny.filename, "tiny.txt");
    assert_eq!(tiny.summary, MINIMAL_DOCUMENT_SUMMARY);
    assert_eq!(tiny.word_count, 2);

    let report = &record.document_summaries[1];
    assert_eq!(report.content_type, "text/plain");
    assert_eq!(
        report.summary,
        "Quarterly volumes rose. Rotterdam led growth. Hamburg was flat."
    );
    assert_eq!(report.word_count, 11);
}

#[tokio::test]
async fn test_heuristic_output_is_repeatable() {
    let engine = heuristic_engine();
    let message = email("Repeat", "Same input every time. Same output expected. Always.");
    let docs = [document("a.txt", "Document text that is long enough.")];

    let first = engine.summarize(&message, &docs).await;
    let second = engine.summarize(&message, &docs).await;
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// ============================================================================
// Generative engine
// ============================================================================

#[tokio::test]
async fn test_model_summary_is_used() {
    let model = Arc::new(MockModel::fixed("  Container due Friday.  "));
    let engine = mock_engine(model.clone());
    assert!(engine.is_generative());

    let record = engine
        .summarize(&email("Shipment", "The container left Rotterdam today."), &[])
        .await;

    assert_eq!(record.email_summary, "Container due Friday.");
    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.starts_with("summarize: Subject: Shipment"));
}

#[tokio::test]
async fn test_minimal_inputs_skip_the_model() {
    let model = Arc::new(MockModel::fixed("unused"));
    let engine = mock_engine(model.clone());

    let record = engine
        .summarize(&email("", ""), &[document("x.txt", "short")])
        .await;

    assert_eq!(record.email_summary, MINIMAL_EMAIL_SUMMARY);
    assert_eq!(record.document_summaries[0].summary, MINIMAL_DOCUMENT_SUMMARY);
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_generation_bounds_follow_input_length() {
    let model = Arc::new(MockModel::fixed("Invoice summary."));
    let engine = mock_engine(model.clone());

    // "summarize: Invoice 1234567" is 4 tokens plus end-of-sequence
    engine
        .summarize(&email("", ""), &[document("inv.txt", "Invoice 1234567")])
        .await;

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    let params = &calls[0].1;
    assert_eq!(params.min_length, 1);
    assert_eq!(params.max_length, 100);
    assert!(params.min_length <= params.max_length);
    assert_eq!(params.num_beams, 4);
    assert_eq!(params.length_penalty, 2.0);
    assert!(params.early_stopping);
    assert!(!params.do_sample);
}

#[tokio::test]
async fn test_long_input_is_truncated() {
    let model = Arc::new(MockModel::fixed("Long email summary."));
    let engine = mock_engine(model.clone());

    let body = "alpha ".repeat(400);
    engine.summarize(&email("Long", &body), &[]).await;

    let calls = model.calls();
    let input = &calls[0].0;
    assert!(input.starts_with("summarize: Subject: Long"));
    assert!(input.ends_with("..."));
    assert_eq!(input.chars().count(), "summarize: ".len() + 900 + 3);
    assert!(calls[0].1.max_length >= 150);
}

#[tokio::test]
async fn test_empty_model_output_falls_back_to_heuristic() {
    let model = Arc::new(MockModel::new(MockBehavior::Empty));
    let record = mock_engine(model)
        .summarize(&email("Status", "All berths occupied. Next slot Monday."), &[])
        .await;

    assert_eq!(
        record.email_summary,
        "Subject: Status\n\nBody: All berths occupied. Next slot Monday."
    );
}

#[tokio::test]
async fn test_model_error_falls_back_to_heuristic() {
    let model = Arc::new(MockModel::new(MockBehavior::Fail));
    let docs = [document("memo.txt", "Memo about the crane repair. Done by Friday.")];
    let record = mock_engine(model.clone())
        .summarize(&email("Crane", "See memo attached."), &docs)
        .await;

    assert_eq!(record.email_summary, "Subject: Crane\n\nBody: See memo attached.");
    assert_eq!(
        record.document_summaries[0].summary,
        "Memo about the crane repair. Done by Friday."
    );
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_tokenizer_error_falls_back_to_heuristic() {
    let model = Arc::new(MockModel::fixed("unused"));
    let engine = SummaryEngine::new(
        ModelHandles::new(Arc::new(BrokenTokenizer), model.clone()),
        LimitsConfig::default(),
    );

    let record = engine
        .summarize(&email("Tokens", "The tokenizer cannot load."), &[])
        .await;

    assert_eq!(record.email_summary, "Subject: Tokens\n\nBody: The tokenizer cannot load.");
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_model_timeout_falls_back_to_heuristic() {
    let model = Arc::new(MockModel::new(MockBehavior::Hang));
    let engine = mock_engine(model).with_model_timeout(Duration::from_millis(50));

    let record = engine
        .summarize(&email("Slow", "The model never answers this one."), &[])
        .await;

    assert_eq!(record.email_summary, "Subject: Slow\n\nBody: The model never answers this one.");
}

#[tokio::test]
async fn test_model_panic_falls_back_to_heuristic() {
    let model = Arc::new(MockModel::new(MockBehavior::Panic));
    let docs = [document("manifest.txt", "Forty containers listed on the manifest")];
    let mut message = email("Manifest", "Manifest attached for tomorrow.");
    message.attachments = vec![
        AttachmentRecord::new("manifest.txt", b"x".to_vec(), "text/plain"),
        AttachmentRecord::new("empty.pdf", b"%PDF".to_vec(), "application/pdf"),
    ];

    let record = mock_engine(model.clone()).summarize(&message, &docs).await;

    assert_eq!(
        record.email_summary,
        "Subject: Manifest\n\nBody: Manifest attached for tomorrow."
    );
    assert_eq!(
        record.document_summaries[0].summary,
        "Forty containers listed on the manifest."
    );
    assert_eq!(record.key_entities[0], "manifest");
    assert_eq!(record.total_attachments, 2);
    assert_eq!(record.processed_documents, 1);
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_tokenizer_panic_falls_back_to_heuristic() {
    let engine = SummaryEngine::new(
        ModelHandles::new(Arc::new(PanickingTokenizer), Arc::new(MockModel::fixed("unused"))),
        LimitsConfig::default(),
    );

    let record = engine
        .summarize(&email("Tokens", "The vocabulary file is corrupt."), &[])
        .await;

    assert_eq!(
        record.email_summary,
        "Subject: Tokens\n\nBody: The vocabulary file is corrupt."
    );
}

// ============================================================================
// Catastrophic failure
// ============================================================================

#[test]
fn test_fallback_record_shape() {
    let docs = [document("a.txt", "one two three")];
    let record = fallback_record(&email("S", "B"), &docs);

    let json = serde_json::to_value(&record).unwrap();
    for key in [
        "email_metadata",
        "email_summary",
        "document_summaries",
        "key_entities",
        "total_attachments",
        "processed_documents",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["document_summaries"][0]["word_count"], 3);
    assert_eq!(json["email_metadata"]["filename"], "test.eml");

    assert_eq!(record.email_summary, FALLBACK_EMAIL_SUMMARY);
    assert_eq!(record.document_summaries[0].summary, FALLBACK_DOCUMENT_SUMMARY);
    assert_eq!(record.key_entities, [FALLBACK_ENTITIES]);
    assert_eq!(record.processed_documents, 1);
}

// ============================================================================
// Model construction
// ============================================================================

#[test]
fn test_unconfigured_provider_is_heuristic_only() {
    let handles = ModelHandles::from_config(&ModelConfig::default());
    let engine = SummaryEngine::new(handles, LimitsConfig::default());
    assert!(!engine.is_generative());
    assert!(!engine.has_embeddings());
}

#[test]
fn test_unknown_provider_is_heuristic_only() {
    let config = ModelConfig {
        provider: "carrier-pigeon".to_string(),
        ..Default::default()
    };
    let handles = ModelHandles::from_config(&config);
    assert!(handles.generator.is_none());
    assert!(handles.tokenizer.is_none());
    assert!(handles.embedder.is_none());
}

#[tokio::test]
async fn test_embedder_does_not_enable_generation() {
    let embedder = Arc::new(MockEmbedder { dimensions: 8 });
    let handles = ModelHandles::none().with_embedder(embedder.clone());
    let engine = SummaryEngine::new(handles, LimitsConfig::default());

    assert!(engine.has_embeddings());
    assert!(!engine.is_generative());
    assert_eq!(embedder.embed("berth").await.unwrap().len(), embedder.dimensions());

    let record = engine
        .summarize(&email("Status", "The crane was repaired on Friday."), &[])
        .await;
    assert_eq!(
        record.email_summary,
        "Subject: Status\n\nBody: The crane was repaired on Friday."
    );
}
