use crate::config::Config;
use crate::registry::Registry;
use crate::ws::actor::Keepalive;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Client id -> connection mapping shared by every connection task
    pub registry: Registry,
    /// Server ping / pong timing applied to each connection
    pub keepalive: Keepalive,
    /// WebSocket message and frame size limit
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(registry: Registry, config: &Config) -> Self {
        Self {
            registry,
            keepalive: config.keepalive(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}
