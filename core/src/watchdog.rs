//! Timeout Watchdog.
//!
//! One deferred check per connection of an unverified entity. The check takes
//! the gate lock, so a verification that completed before expiry is always
//! observed. It also re-checks liveness and the connection id because
//! scheduled checks are never cancelled.
//!
//! The decision to punish is recorded under the same lock that decides it,
//! so a submission racing the expiry either verifies first or finds the
//! session already condemned, and a connection is punished at most once.

use std::sync::Arc;
use std::time::Duration;

use invitegate_types::{ConnectionId, PunishmentPolicy};

use crate::gate::AdmissionGate;
use crate::host::EntitySession;

/// What an expired watchdog did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// Verified in time.
    Verified,
    /// The session was no longer live.
    SessionGone,
    /// The identity reconnected; the newer connection has its own watchdog.
    Superseded,
    /// Attempts ran out first and that punishment already applied.
    AlreadyPunished,
    Punished(PunishmentPolicy),
}

impl AdmissionGate {
    /// Schedule the deadline check for `connection`.
    ///
    /// The window is fixed here; a later config reload does not change it.
    pub fn arm_watchdog(
        self: &Arc<Self>,
        session: Arc<dyn EntitySession>,
        connection: ConnectionId,
        window: Duration,
    ) {
        tracing::debug!(
            identity = %session.identity(),
            %connection,
            window_secs = window.as_secs(),
            "Watchdog armed"
        );
        let gate = Arc::downgrade(self);
        self.scheduler.after(
            window,
            Box::new(move || {
                if let Some(gate) = gate.upgrade() {
                    gate.fire_if_still_unverified(session.as_ref(), connection);
                }
            }),
        );
    }

    /// Deadline check. Punishes with the configured default policy unless
    /// the entity verified, left, or reconnected in the meantime.
    pub fn fire_if_still_unverified(
        &self,
        session: &dyn EntitySession,
        connection: ConnectionId,
    ) -> WatchdogOutcome {
        let identity = session.identity();

        let config = {
            let mut state = self.lock();
            if state.store.is_verified(&identity) {
                tracing::debug!(identity = %identity, %connection, "Watchdog expired after verification");
                return WatchdogOutcome::Verified;
            }
            if !state.is_current(&identity, connection) {
                tracing::debug!(identity = %identity, %connection, "Watchdog expired for a stale connection");
                return WatchdogOutcome::Superseded;
            }
            if state.is_punished(&identity) {
                tracing::debug!(identity = %identity, %connection, "Watchdog expired after punishment");
                return WatchdogOutcome::AlreadyPunished;
            }
            state.mark_punished(identity);
            Arc::clone(&state.config)
        };

        if !session.is_live() {
            self.lock().unmark_punished(&identity, connection);
            tracing::debug!(identity = %identity, %connection, "Watchdog expired after disconnect");
            return WatchdogOutcome::SessionGone;
        }

        tracing::info!(
            identity = %identity,
            name = session.display_name(),
            "Verification window expired"
        );
        WatchdogOutcome::Punished(self.punisher.punish(session, config.punishment(), &config))
    }
}
