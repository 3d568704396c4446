use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use maildigest::config::{resolve_config, Config};
use maildigest::MailDigest;

/// How long exit waits for extraction threads that outlived their timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    name = "maildigest",
    version,
    about = "Summarize a folder of emails and their attachments"
)]
struct Cli {
    /// Folder containing .eml/.msg files
    #[arg(short, long, value_name = "DIR")]
    emails: Option<PathBuf>,

    /// Folder the JSON summaries are written to
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Model provider: none, openai, openrouter
    #[arg(long)]
    provider: Option<String>,

    /// Completion model identifier at the provider
    #[arg(long)]
    model: Option<String>,
}

/// Set up tracing with stderr output. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    let (mut config, source) = resolve_config(cli.config.as_deref());
    if let Some(level) = cli.log_level.take() {
        config.general.log_level = level;
    }
    init_tracing(&config.general.log_level);
    source.log();
    apply_overrides(&mut config, cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(run(&config));
    // Do not wait on decoders that were abandoned after a timeout
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}

fn apply_overrides(config: &mut Config, cli: Cli) {
    if let Some(emails) = cli.emails {
        config.ingest.email_dir = emails;
    }
    if let Some(output) = cli.output {
        config.output.dir = output;
    }
    if let Some(provider) = cli.provider {
        config.model.provider = provider;
    }
    if let Some(model) = cli.model {
        config.model.model = model;
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let digest = MailDigest::new(config);
    let results = digest
        .process_folder(&config.ingest.email_dir, &config.output.dir)
        .await
        .map_err(|e| format!("Processing failed: {}", e))?;

    let documents: usize = results.iter().map(|r| r.summary.processed_documents).sum();
    eprintln!(
        "Processed {} email(s), {} document(s). Results in {}",
        results.len(),
        documents,
        config.output.dir.display()
    );
    Ok(())
}
