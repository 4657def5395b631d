pub mod wav;

mod local;

pub use local::LocalRecordingStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
}

/// A blob written to durable storage.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub path: String,
    pub bytes_written: u64,
}

/// Durable blob storage for session artifacts (recording, transcript),
/// keyed by room + session.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    async fn put(
        &self,
        room_id: &str,
        session_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<StoredBlob, StorageError>;
}
