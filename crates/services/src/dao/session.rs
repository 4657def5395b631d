use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use televisit_db::models::Session;
use tracing::debug;

use super::base::{BaseDao, DaoResult};

pub struct SessionDao {
    pub base: BaseDao<Session>,
}

impl SessionDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Session::COLLECTION),
        }
    }

    /// Creates a new active session for a room. Any prior active session for
    /// the same room is forcibly deactivated first (last-writer-wins).
    pub async fn create_for_room(
        &self,
        room_id: ObjectId,
        sample_rate: u32,
        channels: u16,
    ) -> DaoResult<Session> {
        let displaced = self
            .base
            .update_many(
                doc! { "room_id": room_id, "active": true },
                doc! { "$set": { "active": false, "ended_at": DateTime::now() } },
            )
            .await?;
        if displaced > 0 {
            debug!(%room_id, displaced, "Deactivated prior active sessions");
        }

        let now = DateTime::now();
        let session = Session {
            id: None,
            room_id,
            active: true,
            sample_rate,
            channels,
            started_at: now,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&session).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<Session>> {
        self.base.find_one(doc! { "_id": id }).await
    }

    pub async fn mark_inactive(&self, id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": id, "active": true },
                doc! { "$set": { "active": false, "ended_at": DateTime::now() } },
            )
            .await
    }

    /// Active sessions whose `started_at` lies further back than `max_age_secs`.
    pub async fn find_expired(&self, max_age_secs: u64) -> DaoResult<Vec<Session>> {
        let cutoff =
            DateTime::from_millis(DateTime::now().timestamp_millis() - (max_age_secs as i64) * 1000);
        self.base
            .find_many(
                doc! { "active": true, "started_at": { "$lt": cutoff } },
                Some(doc! { "started_at": 1 }),
            )
            .await
    }
}
