//! Message envelopes with correlation IDs for tracking delegation chains.
#![allow(dead_code)]

use std::collections::BTreeMap;

/// Payload format carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Natural-language text; subformat names the language (e.g. "english").
    Text,
    /// Machine-readable payload; subformat names the encoding (only "json").
    Structured,
    /// Opaque bytes; subformat names the transfer encoding (only "base64").
    Binary,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Structured => "structured",
            Format::Binary => "binary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Format::Text),
            "structured" => Some(Format::Structured),
            "binary" => Some(Format::Binary),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The protocol's unit of exchange.
///
/// The correlation ID is minted once at the client edge and preserved across
/// every hop of a delegation chain, so replies can always be matched to the
/// originating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub format: Format,
    pub subformat: String,
    pub content: String,
    pub correlation_id: String,
    pub metadata: BTreeMap<String, String>,
}

impl Envelope {
    /// Create a text envelope with a fresh correlation ID.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            format: Format::Text,
            subformat: "english".to_string(),
            content: content.into(),
            correlation_id: new_correlation_id(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a structured (JSON) envelope with a fresh correlation ID.
    pub fn structured(content: impl Into<String>) -> Self {
        Self {
            format: Format::Structured,
            subformat: "json".to_string(),
            content: content.into(),
            correlation_id: new_correlation_id(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a binary (base64) envelope with a fresh correlation ID.
    pub fn binary(content: impl Into<String>) -> Self {
        Self {
            format: Format::Binary,
            subformat: "base64".to_string(),
            content: content.into(),
            correlation_id: new_correlation_id(),
            metadata: BTreeMap::new(),
        }
    }

    /// Override the language subformat of a text envelope.
    pub fn with_subformat(mut self, subformat: impl Into<String>) -> Self {
        self.subformat = subformat.into();
        self
    }

    /// Carry an existing correlation ID instead of the minted one.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Create a text reply preserving this envelope's correlation ID.
    pub fn reply_text(&self, content: impl Into<String>) -> Self {
        Envelope::text(content).with_correlation_id(self.correlation_id.clone())
    }

    /// Create a structured reply preserving this envelope's correlation ID.
    pub fn reply_structured(&self, content: impl Into<String>) -> Self {
        Envelope::structured(content).with_correlation_id(self.correlation_id.clone())
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

pub(crate) fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
