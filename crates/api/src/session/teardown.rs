//! Idempotent session-end logic.
//!
//! `end_and_persist` may be invoked concurrently from an explicit stop, a
//! peer disconnect, the max-duration timer, and the expiry sweep. The single
//! atomic removal of the runtime decides the winner; everyone else observes
//! the runtime already gone and no-ops. Steps are independently best-effort:
//! a failed blob write still flips the session flag and still notifies the
//! surviving peer.

use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use televisit_services::storage::wav;
use tracing::{debug, error, info};

use super::runtime::SharedRuntime;
use super::SessionCoordinator;
use crate::ws::dispatcher;
use crate::ws::messages::ServerEvent;
use crate::ws::registry::CLOSE_NORMAL;

const RECORDING_BLOB: &str = "recording.wav";
const TRANSCRIPT_BLOB: &str = "transcript.json";

impl SessionCoordinator {
    /// Ends a session exactly once: stop recording, close the bridge,
    /// persist artifacts, flip the persisted flag, notify the surviving
    /// peer, and return still-open sockets to the unassigned registry.
    pub async fn end_and_persist(&self, session_id: ObjectId) {
        let Some((_, runtime)) = self.runtimes.remove(&session_id) else {
            debug!(%session_id, "Teardown skipped, session already gone");
            return;
        };

        info!(%session_id, "Ending session");

        // 1. Stop further audio accumulation immediately.
        runtime.set_recording(false);
        runtime.abort_expiry_timer();

        // 2. Close the transcription bridge if present.
        if let Some(bridge) = runtime.take_bridge() {
            bridge.close().await;
        }

        // 3. Persist the recording and the transcript.
        let room_hex = runtime.room_id.to_hex();
        let session_hex = session_id.to_hex();

        let chunks = runtime.take_audio();
        if !chunks.is_empty() {
            let format = runtime.format();
            match wav::encode_wav(&chunks, format.sample_rate, format.channels) {
                Ok(bytes) => {
                    if let Err(e) = self
                        .recordings
                        .put(&room_hex, &session_hex, RECORDING_BLOB, &bytes)
                        .await
                    {
                        error!(%session_id, %e, "Failed to persist recording");
                    }
                }
                Err(e) => error!(%session_id, %e, "Failed to encode recording"),
            }
        }

        let transcript = runtime.transcript_snapshot();
        if !transcript.is_empty() {
            match serde_json::to_vec_pretty(&transcript) {
                Ok(bytes) => {
                    if let Err(e) = self
                        .recordings
                        .put(&room_hex, &session_hex, TRANSCRIPT_BLOB, &bytes)
                        .await
                    {
                        error!(%session_id, %e, "Failed to persist transcript");
                    }
                }
                Err(e) => error!(%session_id, %e, "Failed to serialize transcript"),
            }
        }

        // 4. Flip the persisted session inactive.
        if let Err(e) = self.store.mark_session_inactive(session_id).await {
            error!(%session_id, %e, "Failed to deactivate session");
        }

        // 5. Notify surviving peers and hand their sockets back to the
        // unassigned registry so a new invite round can begin.
        let ended = ServerEvent::SessionEnded {
            session_id: session_hex,
        };
        for (user_id, socket) in runtime.participants() {
            self.assignments
                .remove_if(&user_id, |_, assigned| *assigned == session_id);
            if socket.is_open() {
                dispatcher::send_to(&socket, &ended).await;
                // Hand the socket back unless the participant already opened
                // a fresh unassigned connection in the meantime.
                if self.registry.get(&user_id).is_none() {
                    self.registry.register(user_id, socket).await;
                }
            }
        }

        info!(%session_id, "Session ended");
    }

    /// Arms the per-session maximum-duration timer. On expiry: error notice,
    /// the same teardown path, then a forced close of both sockets.
    pub(crate) fn arm_expiry_timer(self: &Arc<Self>, runtime: &SharedRuntime) {
        let coordinator = Arc::clone(self);
        let session_id = runtime.session_id;
        let max_duration = Duration::from_secs(self.settings.session.max_duration_secs);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;

            let Some(runtime) = coordinator.runtime(&session_id) else {
                return;
            };
            info!(%session_id, "Session reached maximum duration");

            let sockets = runtime.sockets();
            dispatcher::broadcast(
                &sockets,
                &ServerEvent::Error {
                    message: "session time limit reached".to_string(),
                    details: None,
                },
            )
            .await;

            coordinator.end_and_persist(session_id).await;

            for socket in sockets {
                if socket.is_open() {
                    socket.send_close(CLOSE_NORMAL, "session time limit reached").await;
                }
            }
        });

        runtime.set_expiry_timer(handle.abort_handle());
    }
}
