mod mongo;

pub use mongo::MongoMetadataStore;

use async_trait::async_trait;
use bson::oid::ObjectId;
use televisit_db::models::{Room, Session, User, UserRole};
use thiserror::Error;

use crate::dao::DaoError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Dao(#[from] DaoError),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The room/session/user metadata interface the coordination core consumes.
///
/// Production wires [`MongoMetadataStore`]; tests substitute an in-memory
/// implementation. Same seam as the ASR/cloud-storage provider traits.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create_user(&self, name: String, role: UserRole) -> StoreResult<User>;
    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>>;

    /// Creates (or returns, for an existing pair) the room for a
    /// clinician/patient pair.
    async fn create_room(
        &self,
        clinician_id: ObjectId,
        patient_id: ObjectId,
    ) -> StoreResult<Room>;
    async fn find_room(&self, id: ObjectId) -> StoreResult<Option<Room>>;

    /// Creates a new active session for a room, deactivating any prior
    /// active session on that room (last-writer-wins, no merge).
    async fn create_session(
        &self,
        room_id: ObjectId,
        sample_rate: u32,
        channels: u16,
    ) -> StoreResult<Session>;
    async fn find_session(&self, id: ObjectId) -> StoreResult<Option<Session>>;

    /// Flips the persisted session's active flag. Returns whether anything
    /// changed (false when already inactive, the idempotent no-op path).
    async fn mark_session_inactive(&self, id: ObjectId) -> StoreResult<bool>;

    /// Active sessions that started more than `max_age_secs` ago, for the
    /// expiry sweep.
    async fn expired_active_sessions(&self, max_age_secs: u64) -> StoreResult<Vec<Session>>;
}
