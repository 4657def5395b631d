use axum::{Json, extract::{Path, State}};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use televisit_db::models::{Room, UserRole};

use crate::ws::{dispatcher, messages::ServerEvent};
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub clinician_id: String,
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub clinician_id: String,
    pub patient_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub creator_id: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let clinician_id = parse_id(&body.clinician_id, "clinician_id")?;
    let patient_id = parse_id(&body.patient_id, "patient_id")?;

    for (id, expected) in [
        (clinician_id, UserRole::Clinician),
        (patient_id, UserRole::Patient),
    ] {
        let user = state
            .store
            .find_user(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id.to_hex())))?;
        if user.role != expected {
            return Err(ApiError::BadRequest(format!(
                "User {} does not have the {:?} role",
                id.to_hex(),
                expected
            )));
        }
    }

    let room = state.store.create_room(clinician_id, patient_id).await?;

    // Nudge both participants' unassigned sockets, if connected.
    if let Some(room_id) = room.id {
        let event = ServerEvent::RoomCreated {
            room_id: room_id.to_hex(),
            clinician_id: clinician_id.to_hex(),
            patient_id: patient_id.to_hex(),
        };
        for user_id in [clinician_id, patient_id] {
            if let Some(socket) = state.coordinator.registry().get(&user_id) {
                dispatcher::send_to(&socket, &event).await;
            }
        }
    }

    Ok(Json(to_response(room)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let id = parse_id(&room_id, "room_id")?;

    let room = state
        .store
        .find_room(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;
    Ok(Json(to_response(room)))
}

/// Proposes a session to the creator's peer in this room.
pub async fn invite(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<InviteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room_id = parse_id(&room_id, "room_id")?;
    let creator_id = parse_id(&body.creator_id, "creator_id")?;

    state.coordinator.propose(room_id, creator_id).await?;

    Ok(Json(serde_json::json!({ "status": "invited" })))
}

fn parse_id(raw: &str, field: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {}", field)))
}

fn to_response(room: Room) -> RoomResponse {
    RoomResponse {
        id: room.id.map(|id| id.to_hex()).unwrap_or_default(),
        clinician_id: room.clinician_id.to_hex(),
        patient_id: room.patient_id.to_hex(),
    }
}
