use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub transcription: TranscriptionSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Root directory for persisted recordings and transcripts.
    pub recordings_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionSettings {
    /// Streaming endpoint of the speech provider.
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub language: Option<String>,
    /// Defaults applied when a `start` frame omits audio parameters.
    pub sample_rate: u32,
    pub channels: u16,
    /// Silence window (ms) after which the provider emits an utterance boundary.
    pub utterance_end_ms: u32,
    /// Fixed KeepAlive cadence on the upstream connection.
    pub keepalive_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    /// Hard cap on session duration; the runtime timer force-ends at this point.
    pub max_duration_secs: u64,
    /// Cadence of the background sweep that reclaims lapsed sessions.
    pub sweep_interval_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("TELEVISIT"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "televisit")?
            .set_default("storage.recordings_dir", "data/recordings")?
            .set_default("transcription.url", "wss://api.deepgram.com/v1/listen")?
            .set_default("transcription.api_key", None::<String>)?
            .set_default("transcription.model", "nova-2")?
            .set_default("transcription.language", "en-US")?
            .set_default("transcription.sample_rate", 16000)?
            .set_default("transcription.channels", 1)?
            .set_default("transcription.utterance_end_ms", 1000)?
            .set_default("transcription.keepalive_interval_secs", 5)?
            .set_default("session.max_duration_secs", 1800)?
            .set_default("session.sweep_interval_secs", 30)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
