pub mod bridge;
pub mod config;
pub mod wire;

pub use bridge::{BridgeCommand, BridgeHandle, DeepgramProvider, LiveConnection, SpeechProvider};
pub use config::ProviderConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single word with provider timing and diarization attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordInfo {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<u32>,
}

/// One transcript hypothesis from the upstream provider.
///
/// Interim segments (`is_final == false`) are superseded by the next result
/// for the same audio window; only finalized segments are durable. The
/// `speaker_label` is the raw diarization id; human-role resolution happens
/// at broadcast time, never here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_label: Option<String>,
    pub text: String,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordInfo>>,
}

/// Internal taxonomy of upstream events, decoupled from the provider's wire
/// format. The bridge owner consumes these from a channel; it never sees raw
/// provider frames.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Result(TranscriptSegment),
    UtteranceEnd { last_word_end_ms: Option<u64> },
    Metadata { request_id: Option<String> },
    Warning { message: String },
    Error { message: String, raw: Option<String> },
    Closed { code: Option<u16>, reason: Option<String> },
}

/// Session-fixed audio parameters for one upstream connection.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub encoding: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamParams {
    pub fn linear16(sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding: "linear16",
            sample_rate,
            channels,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid provider endpoint: {0}")]
    Endpoint(String),
    #[error("provider connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}
