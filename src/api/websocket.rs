use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::api::handler::AppState;
use crate::api::notifications::Notification;

/// GET /events
///
/// Streams every notification as a JSON text frame until the client closes.
pub async fn stream_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let notifications = state.notifier.subscribe();
    ws.on_upgrade(move |socket| forward_notifications(socket, notifications))
}

async fn forward_notifications(socket: WebSocket, mut notifications: broadcast::Receiver<Notification>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("📡 Event stream client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients have nothing to say; pings are answered by axum
                Some(Ok(_)) => {}
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => {
                    let json = match serde_json::to_string(&notification) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize notification: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream client lagged, {} notifications skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("📡 Event stream client disconnected");
}
