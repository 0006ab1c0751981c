use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::{ClientHandle, ConnectionSender};

/// Keepalive timing for one connection. `ping_interval` of `None` disables server pings.
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    pub ping_interval: Option<Duration>,
    pub pong_timeout: Duration,
}

/// Run the actor-per-connection pattern for a signaling WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: parses incoming text frames and routes them
///
/// The registry only sees a weak copy of the channel sender, so once this
/// function returns nothing else can keep the connection's channel open.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let handle = ClientHandle::new(tx);
    let connection = handle.connection_id();

    tracing::info!(connection = %connection, "Client connected");

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let keepalive = state.keepalive;
    let ping_handle = keepalive.ping_interval.map(|every| {
        spawn_ping_task(
            handle.sender().clone(),
            pong_rx,
            every,
            keepalive.pong_timeout,
        )
    });

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    route_text(text.as_str(), &handle, &state);
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(
                        connection = %connection,
                        bytes = data.len(),
                        "Ignoring binary frame (signaling is text-only)"
                    );
                }
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = handle.sender().send(Message::Pong(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(
                        connection = %connection,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        connection = %connection,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::debug!(connection = %connection, "WebSocket stream ended");
                    break;
                }
            },
            _ = &mut writer_handle => {
                // Sink failed or the ping task asked for a close.
                tracing::debug!(connection = %connection, "Writer task finished");
                break;
            }
        }
    }

    writer_handle.abort();
    if let Some(ping_handle) = ping_handle {
        ping_handle.abort();
    }

    let removed = state.registry.remove_by_handle(connection);
    for client_id in &removed {
        tracing::info!(
            connection = %connection,
            client_id = %client_id,
            "Client removed from registry"
        );
    }

    tracing::info!(
        connection = %connection,
        registered = state.registry.len(),
        "Client disconnected"
    );
}

/// Dispatch one text frame and log the outcome. Nothing goes back to the client.
fn route_text(raw: &str, handle: &ClientHandle, state: &AppState) {
    let connection = handle.connection_id();
    match protocol::handle_text_message(raw, handle, &state.registry) {
        Ok(protocol::Routed::Registered { id }) => {
            tracing::info!(connection = %connection, client_id = %id, "Client registered");
        }
        Ok(protocol::Routed::Forwarded { kind, target }) => {
            tracing::debug!(
                connection = %connection,
                kind = %kind,
                target = %target,
                "Signal forwarded"
            );
        }
        Err(e) if e.is_routine() => {
            tracing::debug!(connection = %connection, error = %e, "Signal dropped");
        }
        Err(e) => {
            tracing::warn!(
                connection = %connection,
                error = %e,
                "Dropping signaling message: {}",
                raw.chars().take(100).collect::<String>()
            );
        }
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
/// Ends after sending a close frame or on the first failed write.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Send periodic pings and close the connection if a pong doesn't arrive in time.
fn spawn_ping_task(
    ping_tx: ConnectionSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    every: Duration,
    pong_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping_timer = interval(every);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                break;
            }

            match timeout(pong_timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    })
}
