use std::sync::Arc;
use std::time::Duration;

use televisit_api::{build_router, state::AppState};
use televisit_config::Settings;
use televisit_db::{connect, indexes::ensure_indexes};
use televisit_services::{LocalRecordingStore, MongoMetadataStore};
use televisit_transcription::{DeepgramProvider, ProviderConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "televisit_api=debug,televisit_services=debug,televisit_db=debug,televisit_transcription=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting Televisit API on {}:{}", settings.app.host, settings.app.port);

    // Connect to MongoDB
    let db = connect(&settings).await?;

    // Ensure indexes
    ensure_indexes(&db).await?;

    // External collaborators
    let store = Arc::new(MongoMetadataStore::new(&db));
    let recordings = Arc::new(LocalRecordingStore::new(&settings.storage.recordings_dir));
    let provider = Arc::new(DeepgramProvider::new(ProviderConfig {
        url: settings.transcription.url.clone(),
        api_key: settings.transcription.api_key.clone(),
        model: settings.transcription.model.clone(),
        language: settings.transcription.language.clone(),
        utterance_end_ms: settings.transcription.utterance_end_ms,
        keepalive_interval: Duration::from_secs(settings.transcription.keepalive_interval_secs),
    }));

    // Build app state (spawns the session expiry sweep)
    let app_state = AppState::new(settings.clone(), store, recordings, provider);

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
