use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{CloseFrame, Message, WebSocket}},
    response::Response,
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

use super::dispatcher;
use super::messages::{ClientMessage, ServerEvent};
use super::registry::{ClientSocket, CLOSE_POLICY_VIOLATION};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<String>) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    // Identity comes from the connection URL; without it the socket is
    // rejected before registration.
    let user_id = match user_id.as_deref().map(ObjectId::parse_str) {
        Some(Ok(id)) => id,
        _ => {
            let mut guard = sender.lock().await;
            let _ = guard
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: "missing or invalid user identity".into(),
                })))
                .await;
            return;
        }
    };

    let connection_id = Uuid::new_v4().to_string();
    info!(%user_id, %connection_id, "WebSocket connected");

    let socket_handle = ClientSocket::new(connection_id.clone(), sender.clone());
    state
        .coordinator
        .register_connection(user_id, socket_handle.clone())
        .await;

    dispatcher::send_to(
        &socket_handle,
        &ServerEvent::Connected {
            user_id: user_id.to_hex(),
        },
    )
    .await;

    // Message loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    state
                        .coordinator
                        .handle_message(user_id, &socket_handle, message)
                        .await;
                }
                Err(e) => {
                    // Malformed control frames are reported; the connection
                    // stays open.
                    dispatcher::send_to(
                        &socket_handle,
                        &ServerEvent::Error {
                            message: "invalid message".to_string(),
                            details: Some(e.to_string()),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Binary(frame)) => {
                state
                    .coordinator
                    .handle_audio(user_id, frame.to_vec())
                    .await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(%user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    socket_handle.mark_closed();
    state
        .coordinator
        .handle_disconnect(user_id, &socket_handle)
        .await;

    info!(%user_id, %connection_id, "WebSocket disconnected");
}
