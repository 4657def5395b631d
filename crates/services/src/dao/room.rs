use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use televisit_db::models::Room;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct RoomDao {
    pub base: BaseDao<Room>,
}

impl RoomDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Room::COLLECTION),
        }
    }

    /// Creates the room for a clinician/patient pair. The pair is unique; a
    /// concurrent create for the same pair resolves to the existing room.
    pub async fn create(&self, clinician_id: ObjectId, patient_id: ObjectId) -> DaoResult<Room> {
        let now = DateTime::now();
        let room = Room {
            id: None,
            clinician_id,
            patient_id,
            created_at: now,
            updated_at: now,
        };

        match self.base.insert_one(&room).await {
            Ok(id) => self.base.find_by_id(id).await,
            Err(DaoError::DuplicateKey(_)) => self
                .find_by_pair(clinician_id, patient_id)
                .await?
                .ok_or(DaoError::NotFound),
            Err(e) => Err(e),
        }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<Room>> {
        self.base.find_one(doc! { "_id": id }).await
    }

    pub async fn find_by_pair(
        &self,
        clinician_id: ObjectId,
        patient_id: ObjectId,
    ) -> DaoResult<Option<Room>> {
        self.base
            .find_one(doc! { "clinician_id": clinician_id, "patient_id": patient_id })
            .await
    }
}
