//! `WS /v1/ws` — bidirectional chat, bearer-authed via the `token` query
//! parameter (the `Authorization` header can't be set from browser JS
//! during the upgrade handshake).
//!
//! One text frame in, two frames out: a single `chat_chunk` carrying the
//! full reply (the engine doesn't expose token-level deltas — providers
//! are called non-streaming and the fallback chain discards partial
//! output on failure) followed by a terminal `chat_done` carrying meta.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use clawlite_core::bus::types::InboundMessage;

use crate::auth::extract_token_from;
use crate::routes::chat::to_response;
use crate::state::AppState;

#[derive(Deserialize)]
struct WsChatRequest {
    session_id: String,
    text: String,
}

#[derive(Serialize)]
struct ChatChunkFrame<'a> {
    r#type: &'a str,
    delta: &'a str,
}

#[derive(Serialize)]
struct ChatDoneFrame {
    r#type: &'static str,
    meta: crate::routes::chat::ChatResponseMeta,
}

#[derive(Serialize)]
struct ErrorFrame<'a> {
    r#type: &'a str,
    error: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> impl IntoResponse {
    match extract_token_from(&headers, &uri) {
        Some(token) if token == state.bearer_token => {
            ws.on_upgrade(move |socket| handle_socket(socket, state))
        }
        _ => axum::http::StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let count = state.ws_connected();
    info!(conn_id = %conn_id, connections = count, "ws connected");

    let (mut tx, mut rx) = socket.split();

    while let Some(Ok(msg)) = rx.next().await {
        match msg {
            Message::Text(text) => {
                let req: WsChatRequest = match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(e) => {
                        let frame = ErrorFrame { r#type: "error", error: e.to_string() };
                        let _ = send_json(&mut tx, &frame).await;
                        continue;
                    }
                };

                let inbound = InboundMessage::new("ws", &req.session_id, &req.session_id, &req.text);
                match state.agent.respond(&inbound).await {
                    Ok(result) => {
                        let resp = to_response(result);
                        let chunk = ChatChunkFrame { r#type: "chat_chunk", delta: &resp.text };
                        if send_json(&mut tx, &chunk).await.is_err() {
                            break;
                        }
                        let done = ChatDoneFrame { r#type: "chat_done", meta: resp.meta };
                        if send_json(&mut tx, &done).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "ws chat turn failed");
                        let frame = ErrorFrame { r#type: "error", error: e.to_string() };
                        if send_json(&mut tx, &frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(data) => {
                let _ = tx.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    state.ws_disconnected();
    info!(conn_id = %conn_id, "ws disconnected");
}

async fn send_json<T: Serialize>(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| json!({"type": "error"}).to_string());
    tx.send(Message::Text(json)).await
}
