//! Punishment Executor.

use std::sync::Arc;

use invitegate_config::GateConfig;
use invitegate_types::PunishmentPolicy;

use crate::host::{EntitySession, ExclusionList};

/// Applies a [`PunishmentPolicy`] to a session.
///
/// The session is always terminated, whatever happens to the exclusion-list
/// write: a punished entity must not stay connected.
#[derive(Clone)]
pub struct Punisher {
    exclusions: Arc<dyn ExclusionList>,
}

impl Punisher {
    #[must_use]
    pub fn new(exclusions: Arc<dyn ExclusionList>) -> Self {
        Self { exclusions }
    }

    /// Returns the policy actually applied, which is [`PunishmentPolicy::Kick`]
    /// when an address ban was requested but the session has no address.
    pub fn punish(
        &self,
        session: &dyn EntitySession,
        policy: PunishmentPolicy,
        config: &GateConfig,
    ) -> PunishmentPolicy {
        let identity = session.identity();
        let name = session.display_name();

        let applied = match policy {
            PunishmentPolicy::Kick => {
                session.terminate(config.kick_message());
                PunishmentPolicy::Kick
            }
            PunishmentPolicy::Ban => {
                if let Err(e) = self.exclusions.ban_name(name, config.ban_message()) {
                    tracing::error!(identity = %identity, name, "{e}");
                }
                session.terminate(config.ban_message());
                PunishmentPolicy::Ban
            }
            PunishmentPolicy::BanByAddress => match session.address() {
                Some(address) => {
                    if let Err(e) = self.exclusions.ban_address(address, config.ban_message()) {
                        tracing::error!(identity = %identity, %address, "{e}");
                    }
                    session.terminate(config.ban_message());
                    PunishmentPolicy::BanByAddress
                }
                None => {
                    tracing::warn!(
                        identity = %identity,
                        name,
                        "No network address for ban-ip; kicking instead"
                    );
                    session.terminate(config.kick_message());
                    PunishmentPolicy::Kick
                }
            },
        };

        tracing::info!(identity = %identity, name, policy = %applied, "Punished unverified entity");
        applied
    }
}

impl std::fmt::Debug for Punisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Punisher").finish_non_exhaustive()
    }
}
