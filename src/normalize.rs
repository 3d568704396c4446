//! Coercion of header values of unknown shape into display strings.
//!
//! Mail parsers disagree on how they hand back headers: a bare string,
//! a list of strings (repeated headers), a list of `(name, address)` pairs,
//! or something else entirely. [`FieldValue`] captures those shapes and
//! [`FieldValue::normalize`] folds any of them into one string.

use std::fmt;

use mail_parser::Address;

/// Placeholder used for an address pair that carries neither name nor address.
pub const UNKNOWN_EMAIL: &str = "unknown_email";

/// One element of a sequence-shaped header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldItem {
    Text(String),
    /// A `(display name, address)` tuple, of any arity
    Pair(Vec<String>),
}

impl fmt::Display for FieldItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldItem::Text(text) => f.write_str(text),
            FieldItem::Pair(parts) => write!(f, "({})", parts.join(", ")),
        }
    }
}

/// A header value as produced by a wire-format parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Absent,
    Text(String),
    Sequence(Vec<FieldItem>),
    /// Anything else, already stringified
    Other(String),
}

impl FieldValue {
    /// Wrap any displayable value in the generic-conversion branch.
    pub fn other(value: impl fmt::Display) -> Self {
        FieldValue::Other(value.to_string())
    }

    /// Build a sequence of plain strings, e.g. the values of a repeated header.
    pub fn texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::Sequence(
            values
                .into_iter()
                .map(|v| FieldItem::Text(v.into()))
                .collect(),
        )
    }

    /// Fold the value into a single display string. Never fails.
    ///
    /// A plain sequence yields its first element only; later values are
    /// discarded. A sequence containing address pairs yields the address
    /// component of every pair, joined with `", "`.
    pub fn normalize(&self) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Sequence(items) if items.is_empty() => String::new(),
            FieldValue::Sequence(items) => {
                if items.iter().any(|item| matches!(item, FieldItem::Pair(_))) {
                    items
                        .iter()
                        .map(address_of)
                        .collect::<Vec<_>>()
                        .join(", ")
                } else {
                    items[0].to_string()
                }
            }
            FieldValue::Other(text) => text.clone(),
        }
    }
}

fn address_of(item: &FieldItem) -> String {
    match item {
        FieldItem::Text(text) => text.clone(),
        FieldItem::Pair(parts) => match parts.as_slice() {
            [] => UNKNOWN_EMAIL.to_string(),
            [only] => only.clone(),
            [_, address, ..] => address.clone(),
        },
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Absent)
    }
}

impl From<&Address<'_>> for FieldValue {
    fn from(address: &Address<'_>) -> Self {
        let pairs = address
            .iter()
            .map(|addr| {
                let parts = match (addr.name(), addr.address()) {
                    (name, Some(email)) => {
                        vec![name.unwrap_or_default().to_string(), email.to_string()]
                    }
                    (Some(name), None) => vec![name.to_string()],
                    (None, None) => Vec::new(),
                };
                FieldItem::Pair(parts)
            })
            .collect();
        FieldValue::Sequence(pairs)
    }
}
