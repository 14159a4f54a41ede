//! Websocket endpoint of the broadcast server.
//!
//! Consumers connect to `/` and receive `CLASS_REGISTRY_UPDATE` frames:
//! the baseline on connect, then one frame per rebuild. Inbound frames
//! other than close are ignored.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tracing::Instrument;

use super::hub::BroadcastHub;
use super::observability::spans;

/// Create the websocket router.
pub fn create_ws_router(hub: Arc<BroadcastHub>) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(hub)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<BroadcastHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (id, mut frames) = hub.connect();
    let span = spans::connection_span(&id.to_string());

    async move {
        tracing::info!("Client connected");

        let closed = hub.closed();
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                () = closed.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(e) = sink.send(Message::Text(frame.as_ref().into())).await {
                        tracing::debug!(error = %e, "Send failed");
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        hub.disconnect(id);
        tracing::info!("Client disconnected");
    }
    .instrument(span)
    .await;
}
