use std::sync::Arc;

use televisit_config::Settings;
use televisit_services::{MetadataStore, RecordingStore};
use televisit_transcription::SpeechProvider;

use crate::session::{sweep, SessionCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn MetadataStore>,
    pub coordinator: Arc<SessionCoordinator>,
}

impl AppState {
    /// Wires the coordination core to its external collaborators and starts
    /// the session expiry sweep.
    pub fn new(
        settings: Settings,
        store: Arc<dyn MetadataStore>,
        recordings: Arc<dyn RecordingStore>,
        provider: Arc<dyn SpeechProvider>,
    ) -> Self {
        let coordinator = Arc::new(SessionCoordinator::new(
            settings.clone(),
            store.clone(),
            recordings,
            provider,
        ));
        sweep::spawn_expiry_sweep(coordinator.clone());

        Self {
            settings,
            store,
            coordinator,
        }
    }
}
