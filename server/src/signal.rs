//! Signaling wire messages.
//!
//! Inbound frames are JSON objects discriminated by a `type` field.
//! Session descriptions are kept as raw JSON text and written back out
//! unchanged, so the relay never reorders or re-encodes an SDP payload.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::fmt;

use crate::error::RelayError;
use crate::registry::ClientId;

/// Opaque session description (string or structured SDP), passed through as-is.
pub type SessionDescription = Box<RawValue>;

/// The two forwardable signal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Offer => f.write_str("offer"),
            SignalKind::Answer => f.write_str("answer"),
        }
    }
}

/// `{"type":"register","id":...}`
#[derive(Debug, Deserialize)]
pub struct Register {
    pub id: ClientId,
}

/// `{"type":"offer","answererId":...,"MyId":...,"sdp":...}`
#[derive(Debug, Deserialize)]
pub struct Offer {
    #[serde(rename = "answererId")]
    pub answerer_id: ClientId,
    #[serde(rename = "MyId")]
    pub sender_id: ClientId,
    pub sdp: SessionDescription,
}

/// `{"type":"answer","offererId":...,"MyId":...,"sdp":...}`
#[derive(Debug, Deserialize)]
pub struct Answer {
    #[serde(rename = "offererId")]
    pub offerer_id: ClientId,
    #[serde(rename = "MyId")]
    pub sender_id: ClientId,
    pub sdp: SessionDescription,
}

/// A decoded inbound signaling message.
#[derive(Debug)]
pub enum SignalMessage {
    Register(Register),
    Offer(Offer),
    Answer(Answer),
    /// Well-formed JSON object with a type we don't route.
    Unknown { kind: String },
}

/// Top-level fields, values left unparsed. Only a JSON object decodes into
/// a map, so arrays and scalars are rejected here before any variant is tried.
type Fields = HashMap<String, Box<RawValue>>;

impl SignalMessage {
    /// Decode one text frame.
    ///
    /// Fails on invalid JSON, a top-level value that is not an object, a
    /// missing or non-string `type`, or a known type with missing/mistyped
    /// fields. Unrecognised types decode to [`SignalMessage::Unknown`].
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let fields: Fields = serde_json::from_str(raw)?;
        let kind: String = match fields.get("type") {
            Some(kind) => serde_json::from_str(kind.get())?,
            None => return Err(RelayError::MissingType),
        };

        let message = match kind.as_str() {
            "register" => SignalMessage::Register(serde_json::from_str(raw)?),
            "offer" => SignalMessage::Offer(serde_json::from_str(raw)?),
            "answer" => SignalMessage::Answer(serde_json::from_str(raw)?),
            _ => SignalMessage::Unknown { kind },
        };
        Ok(message)
    }

    /// Value of the `type` field, for logging.
    pub fn kind(&self) -> &str {
        match self {
            SignalMessage::Register(_) => "register",
            SignalMessage::Offer(_) => "offer",
            SignalMessage::Answer(_) => "answer",
            SignalMessage::Unknown { kind } => kind,
        }
    }
}

/// Message delivered to the target peer: `{"type":..,"MyId":..,"sdp":..}`.
#[derive(Debug, Serialize)]
pub struct ForwardedSignal<'a> {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    #[serde(rename = "MyId")]
    pub sender_id: &'a ClientId,
    pub sdp: &'a RawValue,
}

impl ForwardedSignal<'_> {
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        match SignalMessage::parse(r#"{"type":"register","id":"A"}"#).unwrap() {
            SignalMessage::Register(reg) => assert_eq!(reg.id, ClientId::from("A")),
            other => panic!("expected register, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_offer_keeps_sdp_bytes_verbatim() {
        let raw = r#"{"type":"offer","answererId":"A","MyId":"B","sdp":{"type":"offer", "sdp":"v=0\r\n"}}"#;
        match SignalMessage::parse(raw).unwrap() {
            SignalMessage::Offer(offer) => {
                assert_eq!(offer.answerer_id, ClientId::from("A"));
                assert_eq!(offer.sender_id, ClientId::from("B"));
                assert_eq!(offer.sdp.get(), r#"{"type":"offer", "sdp":"v=0\r\n"}"#);
            }
            other => panic!("expected offer, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_answer_ignores_extra_fields() {
        let raw = r#"{"type":"answer","offererId":"B","MyId":"A","sdp":"blob","extra":42}"#;
        match SignalMessage::parse(raw).unwrap() {
            SignalMessage::Answer(answer) => {
                assert_eq!(answer.offerer_id, ClientId::from("B"));
                assert_eq!(answer.sdp.get(), r#""blob""#);
            }
            other => panic!("expected answer, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = SignalMessage::parse(r#"{"type":"candidate","candidate":"x"}"#).unwrap();
        assert_eq!(msg.kind(), "candidate");
        assert!(matches!(msg, SignalMessage::Unknown { .. }));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            SignalMessage::parse("not json at all"),
            Err(RelayError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        assert!(matches!(
            SignalMessage::parse(r#"{"id":"A"}"#),
            Err(RelayError::MissingType)
        ));
    }

    #[test]
    fn test_parse_rejects_offer_without_target() {
        assert!(matches!(
            SignalMessage::parse(r#"{"type":"offer","MyId":"B","sdp":"x"}"#),
            Err(RelayError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_object_frames() {
        for raw in [r#"["register"]"#, r#"["offer","A","B","x"]"#, r#""register""#, "42", "null"] {
            assert!(
                matches!(SignalMessage::parse(raw), Err(RelayError::Malformed(_))),
                "{} should be malformed",
                raw
            );
        }
    }

    #[test]
    fn test_parse_rejects_non_string_type() {
        assert!(matches!(
            SignalMessage::parse(r#"{"type":["register"],"id":"A"}"#),
            Err(RelayError::Malformed(_))
        ));
    }

    #[test]
    fn test_forwarded_signal_shape() {
        let sdp = RawValue::from_string(r#""sdp-blob-1""#.to_string()).unwrap();
        let sender = ClientId::from("B");
        let json = ForwardedSignal {
            kind: SignalKind::Offer,
            sender_id: &sender,
            sdp: &sdp,
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"offer","MyId":"B","sdp":"sdp-blob-1"}"#);
    }
}
