//! The closed wire protocol: every inbound and outbound frame kind is a
//! variant here and matched exhaustively, so adding an event is a
//! compile-time-checked change. Text frames carry these as JSON; binary
//! frames are raw PCM and never reach this module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use televisit_transcription::TranscriptSegment;

use crate::session::roles::SpeakerRole;

/// Control frames accepted from participants.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SessionInviteResponse {
        accept: bool,
    },
    #[serde(rename_all = "camelCase")]
    Start {
        session_id: String,
        sample_rate: Option<u32>,
        channels: Option<u16>,
        format: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Stop {
        session_id: String,
    },
    /// Explicit diarization-label assignments, or auto-map when absent.
    MapSpeakers {
        assignments: Option<HashMap<String, SpeakerRole>>,
    },
}

/// Events pushed to participants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { user_id: String },
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: String,
        clinician_id: String,
        patient_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SessionInvite { room_id: String, creator_id: String },
    #[serde(rename_all = "camelCase")]
    SessionDeclined { room_id: String },
    #[serde(rename_all = "camelCase")]
    SessionStarted { session_id: String, room_id: String },
    #[serde(rename_all = "camelCase")]
    RecordingStarted { session_id: String },
    #[serde(rename_all = "camelCase")]
    RecordingStopped { session_id: String },
    Transcript { payload: TranscriptPayload },
    Utterance { payload: TranscriptPayload },
    Ready,
    #[serde(rename_all = "camelCase")]
    Stopped {
        final_transcript_summary: TranscriptSummary,
    },
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    SpeakersMapped {
        assignments: HashMap<String, SpeakerRole>,
    },
}

/// A transcript segment as delivered to clients: the stored segment plus the
/// human role resolved from the current speaker map at broadcast time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPayload {
    #[serde(flatten)]
    pub segment: TranscriptSegment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<SpeakerRole>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummary {
    pub session_id: String,
    pub segment_count: usize,
}
