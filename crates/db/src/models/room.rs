use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A durable pairing of one clinician and one patient. Sessions are always
/// created against a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub clinician_id: ObjectId,
    pub patient_id: ObjectId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Room {
    pub const COLLECTION: &'static str = "rooms";

    /// The peer of `user_id` in this room, if the user belongs to it at all.
    pub fn peer_of(&self, user_id: ObjectId) -> Option<ObjectId> {
        if user_id == self.clinician_id {
            Some(self.patient_id)
        } else if user_id == self.patient_id {
            Some(self.clinician_id)
        } else {
            None
        }
    }
}
