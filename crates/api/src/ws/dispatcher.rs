use tracing::debug;

use super::messages::ServerEvent;
use super::registry::ClientSocket;

/// Fans one event out to every open socket in the slice. Serialization
/// happens once; sockets that are closed or fail to send are skipped
/// silently, since a missed interim update is superseded by the next one.
pub async fn broadcast(sockets: &[ClientSocket], event: &ServerEvent) {
    let text = match serde_json::to_string(event) {
        Ok(t) => t,
        Err(e) => {
            debug!(%e, "Failed to serialize server event");
            return;
        }
    };

    for socket in sockets {
        if !socket.is_open() {
            continue;
        }
        socket.send_text(text.clone()).await;
    }
}

/// Sends one event to a single socket, same fire-and-forget semantics.
pub async fn send_to(socket: &ClientSocket, event: &ServerEvent) {
    broadcast(std::slice::from_ref(socket), event).await;
}
