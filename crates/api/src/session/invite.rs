//! The proposal/accept/decline handshake that turns two unassigned sockets
//! into a session.
//!
//! Invites are keyed by invitee: proposing to someone who already has a
//! pending invite silently supersedes it, and the earlier proposer gets no
//! response (carried over from observed behavior; flagged for product
//! review in DESIGN.md). An invite is consumed exactly once, by accept,
//! decline, or either participant disconnecting or re-registering.

use std::sync::Arc;

use bson::oid::ObjectId;
use tracing::{debug, info};

use super::runtime::{AudioFormat, SessionRuntime};
use super::{CoordinationError, SessionCoordinator};
use crate::ws::dispatcher;
use crate::ws::messages::ServerEvent;
use crate::ws::registry::ClientSocket;

/// Snapshot taken at proposal time. Socket handles are captured here so the
/// accept path pairs exactly the two connections that were live when the
/// invite went out.
pub struct PendingInvite {
    pub room_id: ObjectId,
    pub creator_id: ObjectId,
    pub invitee_id: ObjectId,
    pub creator_socket: ClientSocket,
    pub invitee_socket: ClientSocket,
}

impl SessionCoordinator {
    /// Proposes a session for a room. Both participants must have a live
    /// unassigned socket; the invitee is whichever of the pair is not the
    /// creator.
    pub async fn propose(
        &self,
        room_id: ObjectId,
        creator_id: ObjectId,
    ) -> Result<(), CoordinationError> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or(CoordinationError::RoomNotFound)?;
        let invitee_id = room
            .peer_of(creator_id)
            .ok_or(CoordinationError::NotInRoom)?;

        let creator_socket = self
            .registry
            .get(&creator_id)
            .ok_or(CoordinationError::PeersUnavailable)?;
        let invitee_socket = self
            .registry
            .get(&invitee_id)
            .ok_or(CoordinationError::PeersUnavailable)?;

        let invite = PendingInvite {
            room_id,
            creator_id,
            invitee_id,
            creator_socket,
            invitee_socket: invitee_socket.clone(),
        };
        if self.invites.insert(invitee_id, invite).is_some() {
            // The earlier proposer silently loses.
            debug!(%invitee_id, "Superseded a pending invite");
        }

        info!(%room_id, %creator_id, %invitee_id, "Session proposed");
        dispatcher::send_to(
            &invitee_socket,
            &ServerEvent::SessionInvite {
                room_id: room_id.to_hex(),
                creator_id: creator_id.to_hex(),
            },
        )
        .await;
        Ok(())
    }

    /// Resolves the invitee's answer. The invite is removed before anything
    /// else so concurrent responses and disconnects race for at most one
    /// consumption; responding without a pending invite is a no-op.
    pub async fn respond(
        self: &Arc<Self>,
        invitee_id: ObjectId,
        accept: bool,
    ) -> Result<(), CoordinationError> {
        let Some((_, invite)) = self.invites.remove(&invitee_id) else {
            debug!(%invitee_id, "Invite response without a pending invite");
            return Ok(());
        };

        if !accept {
            info!(room_id = %invite.room_id, %invitee_id, "Session declined");
            dispatcher::send_to(
                &invite.creator_socket,
                &ServerEvent::SessionDeclined {
                    room_id: invite.room_id.to_hex(),
                },
            )
            .await;
            return Ok(());
        }

        // Durable session first; this also deactivates any other active
        // session on the room.
        let session = self
            .store
            .create_session(
                invite.room_id,
                self.settings.transcription.sample_rate,
                self.settings.transcription.channels,
            )
            .await?;
        let session_id = session
            .id
            .ok_or_else(|| CoordinationError::InvalidId("session without id".to_string()))?;

        let runtime = Arc::new(SessionRuntime::new(
            session_id,
            invite.room_id,
            AudioFormat {
                sample_rate: session.sample_rate,
                channels: session.channels,
            },
        ));
        runtime.attach(invite.creator_id, invite.creator_socket.clone());
        runtime.attach(invite.invitee_id, invite.invitee_socket.clone());
        self.runtimes.insert(session_id, runtime.clone());

        // Move both sockets from unassigned to assigned in one step, no
        // suspension in between.
        self.registry.remove(&invite.creator_id);
        self.registry.remove(&invite.invitee_id);
        self.assignments.insert(invite.creator_id, session_id);
        self.assignments.insert(invite.invitee_id, session_id);

        self.arm_expiry_timer(&runtime);

        info!(%session_id, room_id = %invite.room_id, "Session started");
        let started = ServerEvent::SessionStarted {
            session_id: session_id.to_hex(),
            room_id: invite.room_id.to_hex(),
        };
        dispatcher::broadcast(&runtime.sockets(), &started).await;

        // Both participants may have vanished while the store call was in
        // flight; their reader loops already ran cleanup against the old
        // maps, so finish the job here.
        if !invite.creator_socket.is_open() && !invite.invitee_socket.is_open() {
            self.end_and_persist(session_id).await;
        }

        Ok(())
    }
}
