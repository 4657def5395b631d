//! The coordination core: socket registry, invite handshake, live session
//! runtimes, transcription fan-out, and idempotent teardown.
//!
//! All shared maps live privately inside [`SessionCoordinator`]; everything
//! outside interacts through its methods. A socket belongs to either the
//! unassigned registry or exactly one runtime, never both. Moves between
//! the two happen inside a single handler invocation with no await in
//! between.

pub mod invite;
pub mod roles;
pub mod runtime;
pub mod sweep;
pub mod teardown;

use std::collections::HashMap;
use std::sync::Arc;

use bson::oid::ObjectId;
use dashmap::DashMap;
use televisit_config::Settings;
use televisit_services::{MetadataStore, RecordingStore, StoreError};
use televisit_transcription::{BridgeEvent, SpeechProvider, StreamParams};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ws::dispatcher;
use crate::ws::messages::{ClientMessage, ServerEvent, TranscriptSummary};
use crate::ws::registry::{ClientSocket, ConnectionRegistry};
use self::invite::PendingInvite;
use self::roles::{SpeakerMap, SpeakerRole};
use self::runtime::{AudioFormat, SessionRuntime, SharedRuntime};

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("room not found")]
    RoomNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("user is not a participant of this room")]
    NotInRoom,
    #[error("both participants must be connected")]
    PeersUnavailable,
    #[error("no speaker observed yet")]
    NoSpeakerDetected,
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SessionCoordinator {
    pub(crate) settings: Settings,
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) recordings: Arc<dyn RecordingStore>,
    pub(crate) provider: Arc<dyn SpeechProvider>,
    pub(crate) registry: ConnectionRegistry,
    /// Pending invites keyed by invitee id; at most one per invitee.
    pub(crate) invites: DashMap<ObjectId, PendingInvite>,
    /// Live runtimes keyed by session id.
    pub(crate) runtimes: DashMap<ObjectId, SharedRuntime>,
    /// Which session an assigned participant currently belongs to.
    pub(crate) assignments: DashMap<ObjectId, ObjectId>,
}

impl SessionCoordinator {
    pub fn new(
        settings: Settings,
        store: Arc<dyn MetadataStore>,
        recordings: Arc<dyn RecordingStore>,
        provider: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            settings,
            store,
            recordings,
            provider,
            registry: ConnectionRegistry::new(),
            invites: DashMap::new(),
            runtimes: DashMap::new(),
            assignments: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub(crate) fn runtime(&self, session_id: &ObjectId) -> Option<SharedRuntime> {
        self.runtimes.get(session_id).map(|r| r.clone())
    }

    /// Registers an unassigned socket. A pending invite involving this id is
    /// consumed by the re-registration before the replacement goes live.
    pub async fn register_connection(&self, user_id: ObjectId, socket: ClientSocket) {
        self.discard_invites_involving(&user_id);
        self.registry.register(user_id, socket).await;
        info!(%user_id, "Participant connected");
    }

    /// Reader-loop cleanup. An assigned participant disconnecting ends the
    /// session through the usual teardown path; an unassigned one simply
    /// leaves the registry (and consumes any invite involving them).
    pub async fn handle_disconnect(&self, user_id: ObjectId, socket: &ClientSocket) {
        let assigned_session = self.assignments.get(&user_id).map(|entry| *entry.value());
        if let Some(session_id) = assigned_session {
            if let Some(runtime) = self.runtime(&session_id) {
                if runtime
                    .participants()
                    .iter()
                    .any(|(_, s)| s.same_as(socket))
                {
                    info!(%user_id, %session_id, "Assigned participant disconnected");
                    runtime.detach(socket);
                    self.assignments
                        .remove_if(&user_id, |_, assigned| *assigned == session_id);
                    self.end_and_persist(session_id).await;
                    return;
                }
            }
            // Stale assignment without a matching runtime socket: fall through
            // to the unassigned cleanup.
        }

        if self.registry.remove_socket(&user_id, socket) {
            self.discard_invites_involving(&user_id);
            info!(%user_id, "Participant disconnected");
        }
    }

    pub(crate) fn discard_invites_involving(&self, user_id: &ObjectId) {
        self.invites
            .retain(|_, invite| invite.creator_id != *user_id && invite.invitee_id != *user_id);
    }

    /// Exhaustive dispatch of the closed client-message union. Failures come
    /// back to the sender as `error` events; the connection stays open.
    pub async fn handle_message(
        self: &Arc<Self>,
        user_id: ObjectId,
        socket: &ClientSocket,
        message: ClientMessage,
    ) {
        let result = match message {
            ClientMessage::SessionInviteResponse { accept } => {
                self.respond(user_id, accept).await
            }
            ClientMessage::Start {
                session_id,
                sample_rate,
                channels,
                format: _,
            } => {
                self.start(user_id, socket, &session_id, sample_rate, channels)
                    .await
            }
            ClientMessage::Stop { session_id } => self.stop(user_id, &session_id).await,
            ClientMessage::MapSpeakers { assignments } => {
                self.map_speakers(user_id, assignments).await
            }
        };

        if let Err(e) = result {
            debug!(%user_id, %e, "Client message failed");
            dispatcher::send_to(
                socket,
                &ServerEvent::Error {
                    message: e.to_string(),
                    details: None,
                },
            )
            .await;
        }
    }

    /// Binary frames: append to the recording buffer and forward upstream in
    /// arrival order. Frames from a participant without a live session are
    /// dropped.
    pub async fn handle_audio(&self, user_id: ObjectId, frame: Vec<u8>) {
        let session_id = match self.assignments.get(&user_id) {
            Some(entry) => *entry.value(),
            None => {
                debug!(%user_id, "Audio frame from unassigned participant dropped");
                return;
            }
        };
        let Some(runtime) = self.runtime(&session_id) else {
            return;
        };

        runtime.append_audio(&frame);
        if let Some(bridge) = runtime.bridge_handle() {
            bridge.forward(frame).await;
        }
    }

    /// Begins (or resumes) recording and transcription for a session.
    pub(crate) async fn start(
        self: &Arc<Self>,
        user_id: ObjectId,
        socket: &ClientSocket,
        session_id: &str,
        sample_rate: Option<u32>,
        channels: Option<u16>,
    ) -> Result<(), CoordinationError> {
        let session_id = parse_id(session_id)?;

        let runtime = match self.runtime(&session_id) {
            Some(runtime) => runtime,
            // The runtime is rebuilt lazily when the process restarted while
            // the persisted session stayed active.
            None => self.restore_runtime(session_id).await?,
        };

        if let Some(sample_rate) = sample_rate {
            let mut format = runtime.format();
            format.sample_rate = sample_rate;
            format.channels = channels.unwrap_or(format.channels);
            runtime.set_format(format);
        }

        // The caller may be re-joining after a restart: make sure their
        // socket is attached and accounted as assigned.
        runtime.attach(user_id, socket.clone());
        self.registry.remove_socket(&user_id, socket);
        self.assignments.insert(user_id, session_id);

        runtime.set_recording(true);
        dispatcher::broadcast(
            &runtime.sockets(),
            &ServerEvent::RecordingStarted {
                session_id: session_id.to_hex(),
            },
        )
        .await;

        if runtime.bridge_handle().is_none() {
            let format = runtime.format();
            let params = StreamParams::linear16(format.sample_rate, format.channels);
            match self.provider.open(params).await {
                Ok(connection) => {
                    // The session may have ended while we were connecting.
                    if self.runtime(&session_id).is_none() {
                        connection.handle.close().await;
                        return Ok(());
                    }
                    runtime.set_bridge(connection.handle);
                    self.spawn_event_pump(session_id, connection.events);
                    dispatcher::broadcast(&runtime.sockets(), &ServerEvent::Ready).await;
                    info!(%session_id, "Transcription bridge opened");
                }
                Err(e) => {
                    warn!(%session_id, %e, "Failed to open transcription bridge");
                    dispatcher::broadcast(
                        &runtime.sockets(),
                        &ServerEvent::Error {
                            message: "transcription unavailable".to_string(),
                            details: Some(e.to_string()),
                        },
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    async fn restore_runtime(
        self: &Arc<Self>,
        session_id: ObjectId,
    ) -> Result<SharedRuntime, CoordinationError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|s| s.active)
            .ok_or(CoordinationError::SessionNotFound)?;

        let runtime = Arc::new(SessionRuntime::new(
            session_id,
            session.room_id,
            AudioFormat {
                sample_rate: session.sample_rate,
                channels: session.channels,
            },
        ));
        let runtime = self
            .runtimes
            .entry(session_id)
            .or_insert(runtime)
            .clone();
        self.arm_expiry_timer(&runtime);
        Ok(runtime)
    }

    /// Explicit stop: summary to both sides, then the one-shot teardown.
    pub(crate) async fn stop(
        &self,
        user_id: ObjectId,
        session_id: &str,
    ) -> Result<(), CoordinationError> {
        let session_id = parse_id(session_id)?;
        let runtime = self
            .runtime(&session_id)
            .ok_or(CoordinationError::SessionNotFound)?;

        info!(%user_id, %session_id, "Stop requested");
        runtime.set_recording(false);

        let sockets = runtime.sockets();
        dispatcher::broadcast(
            &sockets,
            &ServerEvent::RecordingStopped {
                session_id: session_id.to_hex(),
            },
        )
        .await;
        dispatcher::broadcast(
            &sockets,
            &ServerEvent::Stopped {
                final_transcript_summary: TranscriptSummary {
                    session_id: session_id.to_hex(),
                    segment_count: runtime.segment_count(),
                },
            },
        )
        .await;

        self.end_and_persist(session_id).await;
        Ok(())
    }

    /// Speaker-role mapping: explicit assignments, or the auto heuristic
    /// anchored at the first observed speaker.
    pub(crate) async fn map_speakers(
        &self,
        user_id: ObjectId,
        assignments: Option<HashMap<String, SpeakerRole>>,
    ) -> Result<(), CoordinationError> {
        let session_id = self
            .assignments
            .get(&user_id)
            .map(|entry| *entry.value())
            .ok_or(CoordinationError::SessionNotFound)?;
        let runtime = self
            .runtime(&session_id)
            .ok_or(CoordinationError::SessionNotFound)?;

        let map = match assignments {
            Some(assignments) => SpeakerMap::from_assignments(assignments),
            None => {
                let first = runtime
                    .first_speaker()
                    .ok_or(CoordinationError::NoSpeakerDetected)?;
                SpeakerMap::auto_from_first(&first)
            }
        };

        runtime.set_speaker_map(map.clone());
        dispatcher::broadcast(
            &runtime.sockets(),
            &ServerEvent::SpeakersMapped {
                assignments: map.assignments().clone(),
            },
        )
        .await;
        Ok(())
    }

    /// Consumes bridge events for one session until the channel closes.
    /// Every event re-checks that the runtime still exists; the session can
    /// end between any two events.
    pub(crate) fn spawn_event_pump(
        self: &Arc<Self>,
        session_id: ObjectId,
        mut events: mpsc::Receiver<BridgeEvent>,
    ) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(runtime) = coordinator.runtime(&session_id) else {
                    break;
                };

                match event {
                    BridgeEvent::Result(segment) => {
                        if segment.is_final {
                            runtime.push_final(segment.clone());
                        }
                        let payload = runtime.annotate(&segment);
                        dispatcher::broadcast(
                            &runtime.sockets(),
                            &ServerEvent::Transcript { payload },
                        )
                        .await;
                    }
                    BridgeEvent::UtteranceEnd { last_word_end_ms } => {
                        debug!(%session_id, ?last_word_end_ms, "Utterance boundary");
                        if let Some(last) = runtime.last_final() {
                            let payload = runtime.annotate(&last);
                            dispatcher::broadcast(
                                &runtime.sockets(),
                                &ServerEvent::Utterance { payload },
                            )
                            .await;
                        }
                    }
                    BridgeEvent::Metadata { request_id } => {
                        debug!(%session_id, ?request_id, "Provider metadata");
                    }
                    BridgeEvent::Warning { message } => {
                        warn!(%session_id, %message, "Provider warning");
                    }
                    BridgeEvent::Error { message, raw } => {
                        warn!(%session_id, %message, "Provider error");
                        dispatcher::broadcast(
                            &runtime.sockets(),
                            &ServerEvent::Error {
                                message,
                                details: raw,
                            },
                        )
                        .await;
                    }
                    BridgeEvent::Closed { code, reason } => {
                        warn!(%session_id, ?code, ?reason, "Upstream transcription closed");
                        // No auto-reconnect: transcription stays down until a
                        // participant issues a new start.
                        runtime.clear_bridge();
                        break;
                    }
                }
            }
            debug!(%session_id, "Event pump finished");
        });
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<ObjectId, CoordinationError> {
    ObjectId::parse_str(raw).map_err(|_| CoordinationError::InvalidId(raw.to_string()))
}
