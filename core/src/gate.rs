//! Admission Gate.
//!
//! Per identity there are two states, `Unverified` (initial) and `Verified`.
//! The only transition is a successful [`AdmissionGate::attempt_verify`].
//!
//! All shared state (records, configuration snapshot, live connection ids)
//! sits behind one mutex. Host hooks may be called from any thread; the
//! watchdog runs on whatever thread the [`Scheduler`] uses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use invitegate_config::{ConfigError, ConfigSource, FileConfigSource, GateConfig, STATE_FILE_NAME};
use invitegate_types::{
    ActionKind, ConnectionId, Identity, MoveDecision, Position, VerificationRecord, VerifyOutcome,
};

use crate::host::{EntitySession, ExclusionList};
use crate::messages;
use crate::punish::Punisher;
use crate::scheduler::Scheduler;
use crate::store::{StoreError, VerificationStore};

pub(crate) struct GateState {
    pub(crate) store: VerificationStore,
    pub(crate) config: Arc<GateConfig>,
    connections: HashMap<Identity, ConnectionId>,
    next_connection: ConnectionId,
    /// Identities whose punishment has been decided, with the connection
    /// that was current at the time. Cleared by the next `on_connect`.
    punished: HashMap<Identity, Option<ConnectionId>>,
}

impl GateState {
    pub(crate) fn is_current(&self, identity: &Identity, connection: ConnectionId) -> bool {
        self.connections.get(identity) == Some(&connection)
    }

    pub(crate) fn is_punished(&self, identity: &Identity) -> bool {
        self.punished.contains_key(identity)
    }

    /// Claim the punishment of `identity`'s current connection. Whoever
    /// claims first is the only one that punishes.
    pub(crate) fn mark_punished(&mut self, identity: Identity) {
        let connection = self.connections.get(&identity).copied();
        self.punished.insert(identity, connection);
    }

    /// Give a claim back, unless a newer connection replaced it already.
    pub(crate) fn unmark_punished(&mut self, identity: &Identity, connection: ConnectionId) {
        if self.punished.get(identity) == Some(&Some(connection)) {
            self.punished.remove(identity);
        }
    }
}

enum Attempt {
    Closed,
    AlreadyVerified,
    Verified,
    Wrong { attempts: u32, max_attempts: u32 },
    Exhausted {
        attempts: u32,
        config: Arc<GateConfig>,
    },
}

pub struct AdmissionGate {
    state: Mutex<GateState>,
    pub(crate) punisher: Punisher,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) config_source: Arc<dyn ConfigSource>,
}

impl AdmissionGate {
    pub fn new(
        store: VerificationStore,
        config: GateConfig,
        config_source: Arc<dyn ConfigSource>,
        exclusions: Arc<dyn ExclusionList>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GateState {
                store,
                config: Arc::new(config),
                connections: HashMap::new(),
                next_connection: ConnectionId::new(1),
                punished: HashMap::new(),
            }),
            punisher: Punisher::new(exclusions),
            scheduler,
            config_source,
        })
    }

    /// Gate backed by `config.yml` and `verified.yml` in `data_dir`.
    ///
    /// Persisted state is loaded before configuration. A default config is
    /// written when none exists.
    pub fn open(
        data_dir: &Path,
        exclusions: Arc<dyn ExclusionList>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Arc<Self>, ConfigError> {
        let store = VerificationStore::open(data_dir.join(STATE_FILE_NAME));

        let source = FileConfigSource::in_dir(data_dir);
        source.ensure_default()?;
        let config = source.load()?;
        tracing::info!(
            path = %source.path().display(),
            codes = config.invite_code_count(),
            time_limit = config.time_limit_secs(),
            max_attempts = config.max_attempts(),
            punishment = %config.punishment(),
            "Configuration loaded"
        );

        Ok(Self::new(
            store,
            config,
            Arc::new(source),
            exclusions,
            scheduler,
        ))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GateState> {
        // Every critical section leaves the state coherent, so a panic while
        // holding the lock cannot leave a half-applied transition behind.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_verified(&self, identity: &Identity) -> bool {
        self.lock().store.is_verified(identity)
    }

    #[must_use]
    pub fn record(&self, identity: &Identity) -> VerificationRecord {
        self.lock().store.record(identity)
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<GateConfig> {
        Arc::clone(&self.lock().config)
    }

    /// Whether `identity` may perform `action`.
    #[must_use]
    pub fn gate_action(&self, identity: &Identity, action: ActionKind) -> bool {
        match action {
            ActionKind::Chat | ActionKind::Move => self.is_verified(identity),
        }
    }

    /// Flush the state file, e.g. on shutdown.
    pub fn save(&self) -> Result<(), StoreError> {
        self.lock().store.save_all()
    }

    // ------------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------------

    /// A session was established.
    ///
    /// Unverified identities are told how long they have and a watchdog is
    /// armed for this connection with the window configured right now.
    pub fn on_connect(self: &Arc<Self>, session: Arc<dyn EntitySession>) -> ConnectionId {
        let identity = session.identity();
        let (connection, verified, config) = {
            let mut state = self.lock();
            let connection = state.next_connection;
            state.next_connection = connection.next();
            state.connections.insert(identity, connection);
            state.punished.remove(&identity);
            (
                connection,
                state.store.is_verified(&identity),
                Arc::clone(&state.config),
            )
        };

        if verified {
            tracing::debug!(identity = %identity, %connection, "Verified entity connected");
        } else {
            session.send_message(&messages::verify_prompt(config.time_limit_secs()));
            self.arm_watchdog(session, connection, config.time_limit());
        }
        connection
    }

    /// A session ended. Later watchdogs for it become no-ops.
    pub fn on_disconnect(&self, identity: &Identity, connection: ConnectionId) {
        let mut state = self.lock();
        if state.is_current(identity, connection) {
            state.connections.remove(identity);
        }
    }

    /// Chat from `session`. Returns whether the message may go through.
    pub fn on_chat(&self, session: &dyn EntitySession) -> bool {
        let allowed = self.gate_action(&session.identity(), ActionKind::Chat);
        if !allowed {
            session.send_message(messages::CHAT_DENIED);
        }
        allowed
    }

    /// Movement of `identity` from `from` to `to`.
    ///
    /// Unverified entities may look around but not change position.
    #[must_use]
    pub fn on_move(&self, identity: &Identity, from: &Position, to: &Position) -> MoveDecision {
        if !to.is_displaced_from(from) || self.gate_action(identity, ActionKind::Move) {
            return MoveDecision::Allow;
        }
        MoveDecision::Redirect(from.with_orientation_of(to))
    }

    // ------------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------------

    /// Check `code` for `session`'s identity.
    ///
    /// Already-verified identities are left untouched. A wrong code bumps
    /// the persisted counter; reaching `max-attempts` punishes the session
    /// with the configured policy before this returns. Once a punishment
    /// has been decided for the current connection, further submissions
    /// change nothing.
    pub fn attempt_verify(&self, session: &dyn EntitySession, code: &str) -> VerifyOutcome {
        let identity = session.identity();

        let attempt = {
            let mut state = self.lock();
            if state.is_punished(&identity) {
                Attempt::Closed
            } else if state.store.is_verified(&identity) {
                Attempt::AlreadyVerified
            } else if state.config.accepts(code) {
                state.store.mark_verified(identity);
                Attempt::Verified
            } else {
                let attempts = state.store.record_failure(identity);
                let max_attempts = state.config.max_attempts();
                if attempts >= max_attempts {
                    state.mark_punished(identity);
                    Attempt::Exhausted {
                        attempts,
                        config: Arc::clone(&state.config),
                    }
                } else {
                    Attempt::Wrong {
                        attempts,
                        max_attempts,
                    }
                }
            }
        };

        match attempt {
            Attempt::Closed => {
                tracing::debug!(identity = %identity, "Submission from a session already being punished");
                VerifyOutcome::SessionClosed
            }
            Attempt::AlreadyVerified => VerifyOutcome::Success {
                already_verified: true,
            },
            Attempt::Verified => {
                tracing::info!(identity = %identity, name = session.display_name(), "Entity verified");
                VerifyOutcome::Success {
                    already_verified: false,
                }
            }
            Attempt::Wrong {
                attempts,
                max_attempts,
            } => {
                tracing::info!(identity = %identity, attempts, max_attempts, "Wrong invite code");
                VerifyOutcome::Failure {
                    attempts,
                    max_attempts,
                }
            }
            Attempt::Exhausted { attempts, config } => {
                tracing::info!(identity = %identity, attempts, "Attempts exhausted");
                let policy = self
                    .punisher
                    .punish(session, config.punishment(), &config);
                VerifyOutcome::Punished { policy, attempts }
            }
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AdmissionGate")
            .field("records", &state.store.len())
            .field("connections", &state.connections.len())
            .field("config", &state.config)
            .finish_non_exhaustive()
    }
}
