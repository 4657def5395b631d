use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use bson::oid::ObjectId;
use dashmap::DashMap;
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::sync::Mutex;
use tracing::debug;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// WebSocket close code for policy violations (missing identity).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Normal closure, used when a reconnect replaces a live socket.
pub const CLOSE_NORMAL: u16 = 1000;

/// One live client connection: the send half plus an open flag the reader
/// loop flips on exit. A closed-but-not-yet-cleaned-up socket is treated as
/// absent everywhere.
#[derive(Clone)]
pub struct ClientSocket {
    pub connection_id: String,
    sender: WsSender,
    open: Arc<AtomicBool>,
}

impl ClientSocket {
    pub fn new(connection_id: String, sender: WsSender) -> Self {
        Self {
            connection_id,
            sender,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Identity of the underlying connection, not of the participant.
    pub fn same_as(&self, other: &ClientSocket) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }

    /// Sends one serialized text frame. A failed send marks the socket
    /// closed; the caller never retries (fire-and-forget delivery).
    pub async fn send_text(&self, text: String) -> bool {
        let mut guard = self.sender.lock().await;
        match guard.send(Message::Text(text.into())).await {
            Ok(()) => true,
            Err(_) => {
                self.mark_closed();
                false
            }
        }
    }

    pub async fn send_close(&self, code: u16, reason: &str) {
        let mut guard = self.sender.lock().await;
        let _ = guard
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.to_string().into(),
            })))
            .await;
        self.mark_closed();
    }
}

/// Tracks unassigned (not-yet-paired) live sockets by participant id.
/// One live socket per id; a reconnect replaces the previous socket.
pub struct ConnectionRegistry {
    connections: DashMap<ObjectId, ClientSocket>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Registers a socket for an id. An existing live socket for the same id
    /// is closed first, so the old connection observes its replacement before
    /// the new socket becomes visible.
    pub async fn register(&self, user_id: ObjectId, socket: ClientSocket) {
        if let Some((_, previous)) = self.connections.remove(&user_id) {
            if previous.is_open() && !previous.same_as(&socket) {
                debug!(%user_id, "Replacing live socket");
                previous
                    .send_close(CLOSE_NORMAL, "replaced by new connection")
                    .await;
            }
        }
        self.connections.insert(user_id, socket);
    }

    /// The registered socket for an id, if it is still open.
    pub fn get(&self, user_id: &ObjectId) -> Option<ClientSocket> {
        self.connections
            .get(user_id)
            .filter(|entry| entry.is_open())
            .map(|entry| entry.clone())
    }

    /// Removes the mapping unconditionally. Idempotent.
    pub fn remove(&self, user_id: &ObjectId) -> Option<ClientSocket> {
        self.connections.remove(user_id).map(|(_, socket)| socket)
    }

    /// Removes the mapping only if it still points at this exact connection,
    /// so a replaced socket's cleanup cannot evict its replacement.
    pub fn remove_socket(&self, user_id: &ObjectId, socket: &ClientSocket) -> bool {
        self.connections
            .remove_if(user_id, |_, existing| existing.same_as(socket))
            .is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
