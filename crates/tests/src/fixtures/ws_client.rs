//! Thin WebSocket client wrapper for driving the wire protocol in tests.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _) = connect_async(url).await.expect("WebSocket connect failed");
        Self { stream }
    }

    pub async fn send_json(&mut self, value: serde_json::Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("send failed");
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) {
        self.stream
            .send(Message::Binary(bytes.into()))
            .await
            .expect("send failed");
    }

    /// Next raw frame, if the connection is still up.
    pub async fn next_message(&mut self) -> Option<Message> {
        match tokio::time::timeout(RECV_TIMEOUT, self.stream.next()).await {
            Ok(Some(Ok(message))) => Some(message),
            Ok(_) => None,
            Err(_) => panic!("timed out waiting for a frame"),
        }
    }

    /// Next JSON text frame; skips pings/pongs, fails on close.
    pub async fn next_json(&mut self) -> serde_json::Value {
        loop {
            match self.next_message().await {
                Some(Message::Text(text)) => {
                    return serde_json::from_str(&text).expect("non-JSON text frame");
                }
                Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    /// Reads frames until one matches the predicate. Intervening events
    /// are discarded; event interleaving across tasks is not deterministic.
    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&serde_json::Value) -> bool,
    ) -> serde_json::Value {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for a matching event"
            );
            let event = self.next_json().await;
            if predicate(&event) {
                return event;
            }
        }
    }

    pub async fn expect_event(&mut self, event_type: &str) -> serde_json::Value {
        self.wait_for(|v| v["type"] == event_type).await
    }

    /// Asserts that no text frame arrives within the window.
    pub async fn expect_silence(&mut self, window: Duration) {
        match tokio::time::timeout(window, self.stream.next()).await {
            Err(_) => {}
            Ok(None) => {}
            Ok(Some(Ok(Message::Text(text)))) => {
                panic!("expected silence, got frame: {}", text)
            }
            Ok(Some(_)) => {}
        }
    }

    /// Waits for the server to close this connection, returning the close
    /// code if one was sent.
    pub async fn expect_close(&mut self) -> Option<u16> {
        loop {
            match self.next_message().await {
                Some(Message::Close(frame)) => return frame.map(|f| u16::from(f.code)),
                Some(_) => continue,
                None => return None,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
