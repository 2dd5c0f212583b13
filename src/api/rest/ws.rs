use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

/// Pushes every order event to the client as JSON text frames.
pub async fn order_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.order_events_tx.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx, "order-events"))
}

/// Pushes landing-page statistics whenever the publisher recomputes them.
pub async fn landing_stats_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.landing_stats_tx.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx, "landing-stats"))
}

async fn forward<T>(socket: WebSocket, rx: broadcast::Receiver<T>, channel: &'static str)
where
    T: Serialize + Clone + Send + 'static,
{
    let (mut sender, mut receiver) = socket.split();
    let mut updates = BroadcastStream::new(rx);

    info!(channel, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            let update = match update {
                Ok(update) => update,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(channel, skipped, "websocket client lagging; skipped updates");
                    continue;
                }
            };

            let json = match serde_json::to_string(&update) {
                Ok(json) => json,
                Err(err) => {
                    warn!(channel, error = %err, "failed to serialize update for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(channel, "websocket client disconnected");
}
