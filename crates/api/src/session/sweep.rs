//! Background reclamation of lapsed sessions.
//!
//! Runs on a fixed interval over persisted session metadata. Sessions with a
//! live runtime go through the normal teardown; store-only orphans (active
//! rows left behind by a process restart) just get their flag flipped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::SessionCoordinator;

pub fn spawn_expiry_sweep(coordinator: Arc<SessionCoordinator>) {
    let interval = Duration::from_secs(coordinator.settings.session.sweep_interval_secs.max(1));
    let max_age_secs = coordinator.settings.session.max_duration_secs;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let expired = match coordinator.store.expired_active_sessions(max_age_secs).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    warn!(%e, "Expiry sweep store query failed");
                    continue;
                }
            };

            if expired.is_empty() {
                continue;
            }
            debug!(count = expired.len(), "Expiry sweep reclaiming sessions");

            for session in expired {
                let Some(session_id) = session.id else { continue };

                if coordinator.runtime(&session_id).is_some() {
                    coordinator.end_and_persist(session_id).await;
                } else if let Err(e) = coordinator.store.mark_session_inactive(session_id).await {
                    warn!(%session_id, %e, "Failed to deactivate orphaned session");
                } else {
                    info!(%session_id, "Orphaned session deactivated");
                }
            }
        }
    });
}
