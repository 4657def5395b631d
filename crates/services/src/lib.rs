pub mod dao;
pub mod storage;
pub mod store;

pub use storage::{LocalRecordingStore, RecordingStore, StorageError, StoredBlob};
pub use store::{MetadataStore, MongoMetadataStore, StoreError, StoreResult};
