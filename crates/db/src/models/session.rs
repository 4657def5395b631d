use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One continuous recorded conversation between a paired clinician and
/// patient. At most one active session exists per room; creating a new one
/// deactivates any prior active session for that room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub room_id: ObjectId,
    pub active: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub started_at: DateTime,
    pub ended_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Session {
    pub const COLLECTION: &'static str = "sessions";
}
