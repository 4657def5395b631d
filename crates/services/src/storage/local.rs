use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::{RecordingStore, StorageError, StoredBlob};

/// Filesystem-backed blob store: `<root>/<room_id>/<session_id>/<name>`.
pub struct LocalRecordingStore {
    root: PathBuf,
}

impl LocalRecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RecordingStore for LocalRecordingStore {
    async fn put(
        &self,
        room_id: &str,
        session_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<StoredBlob, StorageError> {
        let dir = self.root.join(room_id).join(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;

        info!(path = %path.display(), size = bytes.len(), "Blob stored");
        Ok(StoredBlob {
            path: path.display().to_string(),
            bytes_written: bytes.len() as u64,
        })
    }
}
