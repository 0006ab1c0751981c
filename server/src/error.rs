//! Error types for signaling dispatch.

use thiserror::Error;

use crate::registry::ClientId;

/// Why an inbound signaling message was dropped.
///
/// None of these are ever reported back to the sending client; the
/// connection task logs them and moves on to the next frame.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Frame was not JSON, or a known type was missing required fields
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// JSON object without a string `type` field
    #[error("message has no type field")]
    MissingType,

    /// `type` field present but not one we route
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Offer/answer addressed to an id with no live registration
    #[error("no client registered as {0}")]
    TargetNotFound(ClientId),

    /// Target's outbound channel is closed
    #[error("failed to deliver message to {0}")]
    SendFailed(ClientId),
}

impl RelayError {
    /// Lookup misses are routine (peer not online yet) and only worth a debug line.
    pub fn is_routine(&self) -> bool {
        matches!(self, RelayError::TargetNotFound(_))
    }
}
