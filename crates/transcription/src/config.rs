use std::time::Duration;

/// Connection settings for the upstream streaming speech provider.
///
/// Built by the API layer from application settings; the bridge itself has no
/// knowledge of the config file layout.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Streaming endpoint, e.g. `wss://api.deepgram.com/v1/listen`.
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub language: Option<String>,
    /// Silence window after which the provider emits an utterance boundary.
    pub utterance_end_ms: u32,
    /// Fixed KeepAlive cadence, independent of audio flow.
    pub keepalive_interval: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.deepgram.com/v1/listen".to_string(),
            api_key: None,
            model: "nova-2".to_string(),
            language: Some("en-US".to_string()),
            utterance_end_ms: 1000,
            keepalive_interval: Duration::from_secs(5),
        }
    }
}
