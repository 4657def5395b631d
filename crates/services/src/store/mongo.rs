use async_trait::async_trait;
use bson::oid::ObjectId;
use mongodb::Database;
use televisit_db::models::{Room, Session, User, UserRole};

use super::{MetadataStore, StoreResult};
use crate::dao::{RoomDao, SessionDao, UserDao};

/// MongoDB-backed metadata store, delegating to the per-collection DAOs.
pub struct MongoMetadataStore {
    users: UserDao,
    rooms: RoomDao,
    sessions: SessionDao,
}

impl MongoMetadataStore {
    pub fn new(db: &Database) -> Self {
        Self {
            users: UserDao::new(db),
            rooms: RoomDao::new(db),
            sessions: SessionDao::new(db),
        }
    }
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn create_user(&self, name: String, role: UserRole) -> StoreResult<User> {
        Ok(self.users.create(name, role).await?)
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users.find_by_id(id).await?)
    }

    async fn create_room(
        &self,
        clinician_id: ObjectId,
        patient_id: ObjectId,
    ) -> StoreResult<Room> {
        Ok(self.rooms.create(clinician_id, patient_id).await?)
    }

    async fn find_room(&self, id: ObjectId) -> StoreResult<Option<Room>> {
        Ok(self.rooms.find_by_id(id).await?)
    }

    async fn create_session(
        &self,
        room_id: ObjectId,
        sample_rate: u32,
        channels: u16,
    ) -> StoreResult<Session> {
        Ok(self
            .sessions
            .create_for_room(room_id, sample_rate, channels)
            .await?)
    }

    async fn find_session(&self, id: ObjectId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.find_by_id(id).await?)
    }

    async fn mark_session_inactive(&self, id: ObjectId) -> StoreResult<bool> {
        Ok(self.sessions.mark_inactive(id).await?)
    }

    async fn expired_active_sessions(&self, max_age_secs: u64) -> StoreResult<Vec<Session>> {
        Ok(self.sessions.find_expired(max_age_secs).await?)
    }
}
