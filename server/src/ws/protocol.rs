//! Per-message dispatch for signaling connections.
//!
//! Stateless with respect to ordering: any message type is accepted at any
//! point in a connection's life. Nothing is ever written back to the sender.

use crate::error::RelayError;
use crate::registry::{ClientId, Registry};
use crate::signal::{ForwardedSignal, SignalKind, SignalMessage};
use crate::ws::ClientHandle;

/// What a successfully handled message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Sender is now reachable as `id`.
    Registered { id: ClientId },
    /// Signal queued on the target's outbound channel.
    Forwarded { kind: SignalKind, target: ClientId },
}

/// Handle one inbound text frame from `sender`.
///
/// The caller logs the outcome; errors are never surfaced to the client.
pub fn handle_text_message(
    raw: &str,
    sender: &ClientHandle,
    registry: &Registry,
) -> Result<Routed, RelayError> {
    match SignalMessage::parse(raw)? {
        SignalMessage::Register(register) => {
            if let Some(replaced) = registry.register(register.id.clone(), sender) {
                tracing::debug!(
                    client_id = %register.id,
                    replaced_connection = %replaced,
                    "Registration replaced an earlier connection"
                );
            }
            Ok(Routed::Registered { id: register.id })
        }
        SignalMessage::Offer(offer) => forward(
            registry,
            offer.answerer_id,
            ForwardedSignal {
                kind: SignalKind::Offer,
                sender_id: &offer.sender_id,
                sdp: &offer.sdp,
            },
        ),
        SignalMessage::Answer(answer) => forward(
            registry,
            answer.offerer_id,
            ForwardedSignal {
                kind: SignalKind::Answer,
                sender_id: &answer.sender_id,
                sdp: &answer.sdp,
            },
        ),
        SignalMessage::Unknown { kind } => Err(RelayError::UnknownType(kind)),
    }
}

/// Look up `target` and queue the forwarded signal on its channel.
fn forward(
    registry: &Registry,
    target: ClientId,
    signal: ForwardedSignal<'_>,
) -> Result<Routed, RelayError> {
    let Some(handle) = registry.lookup(&target.0) else {
        return Err(RelayError::TargetNotFound(target));
    };

    let json = signal.to_json()?;
    if handle.send_text(json).is_err() {
        // Writer is gone; treat the target as disconnected.
        let removed = registry.remove_by_handle(handle.connection_id());
        tracing::debug!(
            connection = %handle.connection_id(),
            removed = removed.len(),
            "Dropped registrations of unreachable connection"
        );
        return Err(RelayError::SendFailed(target));
    }

    Ok(Routed::Forwarded {
        kind: signal.kind,
        target,
    })
}
