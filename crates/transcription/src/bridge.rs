//! The live connection to the streaming speech provider.
//!
//! One bridge per session. The owner gets a [`BridgeHandle`] to push audio
//! through and a channel of [`BridgeEvent`]s to consume; the two socket
//! halves run as independent tasks. The bridge never reconnects on its own:
//! an upstream close surfaces as `BridgeEvent::Closed` and the session goes
//! on without transcription until a new `start` arrives.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::wire;
use crate::{BridgeError, BridgeEvent, StreamParams};

const KEEPALIVE_FRAME: &str = r#"{"type":"KeepAlive"}"#;
const CLOSE_STREAM_FRAME: &str = r#"{"type":"CloseStream"}"#;

/// Commands accepted by the bridge's send half.
#[derive(Debug)]
pub enum BridgeCommand {
    Audio(Vec<u8>),
    Close,
}

/// Cheap clonable handle to a live bridge.
#[derive(Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn new(cmd_tx: mpsc::Sender<BridgeCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Forwards one audio frame upstream, in submission order per caller.
    /// Errors after the bridge closed are swallowed.
    pub async fn forward(&self, audio: Vec<u8>) {
        if self.cmd_tx.send(BridgeCommand::Audio(audio)).await.is_err() {
            debug!("audio frame dropped, bridge already closed");
        }
    }

    /// Closes the upstream connection. Safe to call any number of times.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(BridgeCommand::Close).await;
    }
}

/// A freshly opened upstream connection: the audio handle plus the event
/// stream, finite until a `Closed` event.
pub struct LiveConnection {
    pub handle: BridgeHandle,
    pub events: mpsc::Receiver<BridgeEvent>,
}

/// Seam between the session core and the concrete speech vendor.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Opens one upstream streaming connection with session-fixed parameters.
    async fn open(&self, params: StreamParams) -> Result<LiveConnection, BridgeError>;
}

pub struct DeepgramProvider {
    config: ProviderConfig,
}

impl DeepgramProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn listen_url(&self, params: &StreamParams) -> String {
        let mut url = format!(
            "{}?model={}&encoding={}&sample_rate={}&channels={}&diarize=true&interim_results=true&utterance_end_ms={}",
            self.config.url,
            self.config.model,
            params.encoding,
            params.sample_rate,
            params.channels,
            self.config.utterance_end_ms,
        );
        if let Some(language) = &self.config.language {
            url.push_str("&language=");
            url.push_str(language);
        }
        url
    }
}

#[async_trait]
impl SpeechProvider for DeepgramProvider {
    fn name(&self) -> &str {
        "deepgram"
    }

    async fn open(&self, params: StreamParams) -> Result<LiveConnection, BridgeError> {
        let url = self.listen_url(&params);
        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| BridgeError::Endpoint(e.to_string()))?;

        if let Some(api_key) = &self.config.api_key {
            let value = format!("Token {}", api_key)
                .parse()
                .map_err(|_| BridgeError::Endpoint("API key is not a valid header value".into()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!(%url, "Opening transcription bridge");
        let (ws_stream, _) = connect_async(request).await?;
        let (ws_sink, ws_source) = ws_stream.split();

        let (cmd_tx, cmd_rx) = mpsc::channel::<BridgeCommand>(64);
        let (event_tx, event_rx) = mpsc::channel::<BridgeEvent>(256);

        let keepalive = self.config.keepalive_interval.max(Duration::from_secs(1));
        tokio::spawn(send_loop(ws_sink, cmd_rx, keepalive));
        tokio::spawn(recv_loop(ws_source, event_tx));

        Ok(LiveConnection {
            handle: BridgeHandle::new(cmd_tx),
            events: event_rx,
        })
    }
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsSource = futures::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Audio forwarding plus the fixed-cadence KeepAlive. Ends on `Close`, on a
/// dropped handle, or on a send failure; the final CloseStream/ws-close
/// errors are swallowed, they are not actionable.
async fn send_loop(mut sink: WsSink, mut cmd_rx: mpsc::Receiver<BridgeCommand>, keepalive: Duration) {
    let mut keepalive_tick = tokio::time::interval(keepalive);
    keepalive_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the immediate first tick.
    keepalive_tick.tick().await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(BridgeCommand::Audio(audio)) => {
                    if sink.send(Message::Binary(audio.into())).await.is_err() {
                        break;
                    }
                }
                Some(BridgeCommand::Close) | None => break,
            },
            _ = keepalive_tick.tick() => {
                if sink.send(Message::Text(KEEPALIVE_FRAME.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.send(Message::Text(CLOSE_STREAM_FRAME.into())).await;
    let _ = sink.close().await;
    debug!("Bridge send loop finished");
}

/// Translates provider frames into events until the upstream goes away.
/// Exactly one `Closed` event terminates the stream.
async fn recv_loop(mut source: WsSource, event_tx: mpsc::Sender<BridgeEvent>) {
    let mut closed_sent = false;

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let arrival_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
                if let Some(event) = wire::translate_frame(&text, arrival_ms) {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(frame) => (
                        Some(u16::from(frame.code)),
                        Some(frame.reason.to_string()),
                    ),
                    None => (None, None),
                };
                let _ = event_tx.send(BridgeEvent::Closed { code, reason }).await;
                closed_sent = true;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%e, "Transcription bridge socket error");
                let _ = event_tx
                    .send(BridgeEvent::Closed {
                        code: None,
                        reason: Some(e.to_string()),
                    })
                    .await;
                closed_sent = true;
                break;
            }
        }
    }

    if !closed_sent {
        let _ = event_tx
            .send(BridgeEvent::Closed {
                code: None,
                reason: None,
            })
            .await;
    }
    debug!("Bridge receive loop finished");
}
