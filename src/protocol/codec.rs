//! Wire codec for envelopes.
//!
//! The wire shape is a flat JSON object:
//! `{format, subformat, content, content_length, correlation_id, metadata}`.
//! `content_length` is written on encode and checked on decode so a truncated
//! body is caught before the payload is handed to anyone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::envelope::{Envelope, Format};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed format: {0}")]
    MalformedFormat(String),

    #[error("truncated payload: declared {declared} bytes, got {actual}")]
    TruncatedPayload { declared: u64, actual: u64 },
}

impl DecodeError {
    /// Stable kind string used in wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedFormat(_) => "malformed_format",
            DecodeError::TruncatedPayload { .. } => "truncated_payload",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    format: String,
    subformat: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Serialize an envelope to wire bytes.
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    let wire = WireEnvelope {
        format: envelope.format.as_str().to_string(),
        subformat: envelope.subformat.clone(),
        content: envelope.content.clone(),
        content_length: Some(envelope.content.len() as u64),
        correlation_id: Some(envelope.correlation_id.clone()),
        metadata: envelope.metadata.clone(),
    };
    // A flat struct of strings and string maps cannot fail to serialize.
    serde_json::to_vec(&wire).unwrap_or_default()
}

/// Parse wire bytes back into an envelope, validating the declared
/// format/subformat pair and, when declared, the content length.
///
/// A bare `{format, subformat, content}` body is accepted: the length check
/// is skipped and a correlation ID is minted at the boundary, so every
/// envelope past this point carries one.
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let wire: WireEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| DecodeError::MalformedFormat(format!("invalid envelope body: {}", e)))?;

    let format = Format::parse(&wire.format)
        .ok_or_else(|| DecodeError::MalformedFormat(format!("unknown format '{}'", wire.format)))?;

    validate_subformat(format, &wire.subformat)?;

    let actual = wire.content.len() as u64;
    if let Some(declared) = wire.content_length {
        if declared != actual {
            return Err(DecodeError::TruncatedPayload { declared, actual });
        }
    }

    let correlation_id = match wire.correlation_id {
        Some(id) if !id.is_empty() => id,
        _ => super::envelope::new_correlation_id(),
    };

    Ok(Envelope {
        format,
        subformat: wire.subformat,
        content: wire.content,
        correlation_id,
        metadata: wire.metadata,
    })
}

fn validate_subformat(format: Format, subformat: &str) -> Result<(), DecodeError> {
    let recognized = match format {
        Format::Text => !subformat.is_empty(),
        Format::Structured => subformat == "json",
        Format::Binary => subformat == "base64",
    };

    if recognized {
        Ok(())
    } else {
        Err(DecodeError::MalformedFormat(format!(
            "unrecognized subformat '{}' for format '{}'",
            subformat, format
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_text() {
        let envelope = Envelope::text("Predict NVDA's stock outlook")
            .with_correlation_id("corr-123")
            .with_metadata("capability", "stock");
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_round_trip_structured() {
        let envelope = Envelope::structured(r#"{"results":[]}"#).with_correlation_id("corr-9");
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_round_trip_binary() {
        let envelope = Envelope::binary("aGVsbG8=");
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_round_trip_multibyte_content() {
        let envelope = Envelope::text("prévisions météo: 3°C ❄");
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let body = br#"{"format":"xml","subformat":"english","content":"x","content_length":1,"correlation_id":"c"}"#;
        match decode(body) {
            Err(DecodeError::MalformedFormat(msg)) => assert!(msg.contains("xml")),
            other => panic!("expected MalformedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_subformat_rejected() {
        let body = br#"{"format":"structured","subformat":"yaml","content":"x","content_length":1,"correlation_id":"c"}"#;
        assert!(matches!(decode(body), Err(DecodeError::MalformedFormat(_))));

        let body = br#"{"format":"binary","subformat":"hex","content":"ff","content_length":2,"correlation_id":"c"}"#;
        assert!(matches!(decode(body), Err(DecodeError::MalformedFormat(_))));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let body = br#"{"format":"text","subformat":"english","content":"hi","content_length":50,"correlation_id":"c"}"#;
        match decode(body) {
            Err(DecodeError::TruncatedPayload { declared, actual }) => {
                assert_eq!(declared, 50);
                assert_eq!(actual, 2);
            }
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_body_rejected() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(DecodeError::MalformedFormat(_))
        ));
    }

    #[test]
    fn test_bare_client_body_accepted() {
        // The minimal shape an external client may post: no declared length,
        // no correlation ID, no metadata.
        let body = br#"{"format":"text","subformat":"english","content":"hello"}"#;
        let envelope = decode(body).unwrap();
        assert_eq!(envelope.content, "hello");
        assert!(!envelope.correlation_id.is_empty());
        assert!(envelope.metadata.is_empty());
    }

    #[test]
    fn test_missing_metadata_defaults_empty() {
        let body = br#"{"format":"text","subformat":"english","content":"hi","content_length":2,"correlation_id":"c"}"#;
        let envelope = decode(body).unwrap();
        assert!(envelope.metadata.is_empty());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DecodeError::MalformedFormat(String::new()).kind(), "malformed_format");
        assert_eq!(
            DecodeError::TruncatedPayload { declared: 1, actual: 0 }.kind(),
            "truncated_payload"
        );
    }
}
