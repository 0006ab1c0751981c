pub mod actor;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sender half of a WebSocket connection's outbound channel.
/// The connection's writer task owns the receiver and the socket sink.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Non-owning form of [`ConnectionSender`], held by the registry so that a
/// registration never keeps a closed connection's channel alive.
pub type WeakConnectionSender = mpsc::WeakUnboundedSender<Message>;

/// Unique identifier for one accepted WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle used to address outbound messages to one open connection.
///
/// Two handles are equal when they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    connection: ConnectionId,
    sender: ConnectionSender,
}

impl ClientHandle {
    /// Wrap a connection's outbound channel under a fresh connection id.
    pub fn new(sender: ConnectionSender) -> Self {
        Self::with_id(ConnectionId::new(), sender)
    }

    pub fn with_id(connection: ConnectionId, sender: ConnectionSender) -> Self {
        Self { connection, sender }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Queue a text frame for the connection's writer task.
    /// Fails only when the writer has gone away.
    pub fn send_text(&self, text: String) -> Result<(), mpsc::error::SendError<Message>> {
        self.sender.send(Message::Text(text.into()))
    }

    pub(crate) fn downgrade(&self) -> WeakConnectionSender {
        self.sender.downgrade()
    }

    pub(crate) fn sender(&self) -> &ConnectionSender {
        &self.sender
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.connection == other.connection
    }
}

impl Eq for ClientHandle {}
