//! Per-session mutable state.
//!
//! A runtime exists only while a session is live; a process restart loses it
//! (session metadata survives in the store, live buffers do not). Locks here
//! are short parking_lot mutexes, held only for the map/buffer operation and
//! never across an await point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bson::oid::ObjectId;
use parking_lot::Mutex;
use televisit_transcription::{BridgeHandle, TranscriptSegment};
use tokio::task::AbortHandle;
use tracing::debug;

use super::roles::SpeakerMap;
use crate::ws::messages::TranscriptPayload;
use crate::ws::registry::ClientSocket;

#[derive(Debug, Clone, Copy)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct SessionRuntime {
    pub session_id: ObjectId,
    pub room_id: ObjectId,
    format: Mutex<AudioFormat>,
    sockets: Mutex<Vec<(ObjectId, ClientSocket)>>,
    speaker_map: Mutex<SpeakerMap>,
    /// Finalized segments only; interims are broadcast and forgotten.
    transcript: Mutex<Vec<TranscriptSegment>>,
    first_speaker_seen: Mutex<Option<String>>,
    audio_chunks: Mutex<Vec<Vec<u8>>>,
    recording: AtomicBool,
    bridge: Mutex<Option<BridgeHandle>>,
    expiry_timer: Mutex<Option<AbortHandle>>,
}

impl SessionRuntime {
    pub fn new(session_id: ObjectId, room_id: ObjectId, format: AudioFormat) -> Self {
        Self {
            session_id,
            room_id,
            format: Mutex::new(format),
            sockets: Mutex::new(Vec::new()),
            speaker_map: Mutex::new(SpeakerMap::default()),
            transcript: Mutex::new(Vec::new()),
            first_speaker_seen: Mutex::new(None),
            audio_chunks: Mutex::new(Vec::new()),
            recording: AtomicBool::new(false),
            bridge: Mutex::new(None),
            expiry_timer: Mutex::new(None),
        }
    }

    // --- sockets ---

    /// Idempotent attach; returns the resulting client count.
    pub fn attach(&self, user_id: ObjectId, socket: ClientSocket) -> usize {
        let mut sockets = self.sockets.lock();
        if !sockets.iter().any(|(_, s)| s.same_as(&socket)) {
            sockets.push((user_id, socket));
        }
        let count = sockets.len();
        debug!(session_id = %self.session_id, count, "Client attached");
        count
    }

    /// Idempotent detach by connection identity; returns the remaining count.
    pub fn detach(&self, socket: &ClientSocket) -> usize {
        let mut sockets = self.sockets.lock();
        sockets.retain(|(_, s)| !s.same_as(socket));
        let count = sockets.len();
        debug!(session_id = %self.session_id, count, "Client detached");
        count
    }

    pub fn participants(&self) -> Vec<(ObjectId, ClientSocket)> {
        self.sockets.lock().clone()
    }

    pub fn sockets(&self) -> Vec<ClientSocket> {
        self.sockets.lock().iter().map(|(_, s)| s.clone()).collect()
    }

    // --- audio ---

    pub fn format(&self) -> AudioFormat {
        *self.format.lock()
    }

    pub fn set_format(&self, format: AudioFormat) {
        *self.format.lock() = format;
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }

    /// Appends one audio frame while recording; frames arriving after the
    /// recording stopped are dropped.
    pub fn append_audio(&self, frame: &[u8]) {
        if self.is_recording() {
            self.audio_chunks.lock().push(frame.to_vec());
        }
    }

    pub fn take_audio(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.audio_chunks.lock())
    }

    // --- transcript ---

    /// Stores a finalized segment and remembers the first diarization label
    /// ever observed (the anchor for the auto-map heuristic).
    pub fn push_final(&self, segment: TranscriptSegment) {
        if let Some(label) = &segment.speaker_label {
            let mut first = self.first_speaker_seen.lock();
            if first.is_none() {
                *first = Some(label.clone());
            }
        }
        self.transcript.lock().push(segment);
    }

    pub fn transcript_snapshot(&self) -> Vec<TranscriptSegment> {
        self.transcript.lock().clone()
    }

    pub fn segment_count(&self) -> usize {
        self.transcript.lock().len()
    }

    pub fn last_final(&self) -> Option<TranscriptSegment> {
        self.transcript.lock().last().cloned()
    }

    pub fn first_speaker(&self) -> Option<String> {
        self.first_speaker_seen.lock().clone()
    }

    // --- speaker map ---

    pub fn set_speaker_map(&self, map: SpeakerMap) {
        *self.speaker_map.lock() = map;
    }

    pub fn speaker_map(&self) -> SpeakerMap {
        self.speaker_map.lock().clone()
    }

    /// A segment as delivered to clients: role resolved from the current map.
    pub fn annotate(&self, segment: &TranscriptSegment) -> TranscriptPayload {
        let role = self
            .speaker_map
            .lock()
            .resolve(segment.speaker_label.as_deref());
        TranscriptPayload {
            segment: segment.clone(),
            role,
        }
    }

    // --- bridge ---

    pub fn set_bridge(&self, handle: BridgeHandle) {
        *self.bridge.lock() = Some(handle);
    }

    pub fn bridge_handle(&self) -> Option<BridgeHandle> {
        self.bridge.lock().clone()
    }

    pub fn take_bridge(&self) -> Option<BridgeHandle> {
        self.bridge.lock().take()
    }

    pub fn clear_bridge(&self) {
        *self.bridge.lock() = None;
    }

    // --- expiry timer ---

    pub fn set_expiry_timer(&self, handle: AbortHandle) {
        if let Some(previous) = self.expiry_timer.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn abort_expiry_timer(&self) {
        if let Some(handle) = self.expiry_timer.lock().take() {
            handle.abort();
        }
    }
}

pub type SharedRuntime = Arc<SessionRuntime>;
