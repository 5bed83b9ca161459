//! Admission control for InviteGate.
//!
//! New entities are untrusted until they submit a configured invite code.
//! Until then they may not chat or move, and they are punished if the
//! verification window runs out or they use up their attempts.
//!
//! ```text
//! on_connect -> AdmissionGate --unverified--> prompt + arm_watchdog
//!                    |                              |
//!       /join <code> v                              v (after time-limit)
//!             attempt_verify              fire_if_still_unverified
//!               |        \                          |
//!     VerificationStore   Punisher <----------------+
//!     (verified.yml)      (kick / ban / ban-ip)
//! ```
//!
//! The host supplies sessions, exclusion lists and a scheduler through the
//! traits in [`host`] and [`scheduler`].

mod admin;
pub mod commands;
mod gate;
pub mod host;
pub mod messages;
mod punish;
pub mod scheduler;
pub mod store;
mod watchdog;

#[cfg(test)]
mod test_support;

pub use commands::{AdminCommand, COMMAND_LABEL, Command, complete};
pub use gate::AdmissionGate;
pub use host::{CommandSender, ConsoleOutput, EntitySession, ExclusionError, ExclusionList};
pub use punish::Punisher;
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
pub use store::{StoreError, VerificationStore};
pub use watchdog::WatchdogOutcome;

pub use invitegate_config::{ConfigError, ConfigSource, FileConfigSource, GateConfig};
pub use invitegate_types::{
    ActionKind, ConnectionId, Identity, MoveDecision, Position, PunishmentPolicy,
    VerificationRecord, VerifyOutcome,
};
