//! Capabilities the hosting runtime provides to the gate.
//!
//! The gate never talks to a network layer or a ban database directly; it is
//! handed these narrow interfaces so it can run against fakes in tests.

use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;

use invitegate_types::Identity;

/// One live connection of an entity, as seen by the host.
pub trait EntitySession: Send + Sync {
    fn identity(&self) -> Identity;

    /// Name used for name-based exclusion.
    fn display_name(&self) -> &str;

    /// Remote address, if the transport exposes one.
    fn address(&self) -> Option<IpAddr>;

    /// False once the host has dropped the connection.
    fn is_live(&self) -> bool;

    fn send_message(&self, message: &str);

    /// Remove the entity from the environment with `reason` shown to it.
    fn terminate(&self, reason: &str);
}

#[derive(Debug, Error)]
#[error("failed to exclude {target}: {reason}")]
pub struct ExclusionError {
    target: String,
    reason: String,
}

impl ExclusionError {
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Host-owned persistent exclusion (ban) lists.
pub trait ExclusionList: Send + Sync {
    fn ban_name(&self, name: &str, reason: &str) -> Result<(), ExclusionError>;

    fn ban_address(&self, address: IpAddr, reason: &str) -> Result<(), ExclusionError>;
}

/// Console-side message output.
pub trait ConsoleOutput: Send + Sync {
    fn send_message(&self, message: &str);
}

/// Who issued a command.
#[derive(Clone)]
pub enum CommandSender {
    /// The trusted server console.
    Console(Arc<dyn ConsoleOutput>),
    Entity {
        session: Arc<dyn EntitySession>,
        operator: bool,
    },
}

impl CommandSender {
    #[must_use]
    pub fn entity(session: Arc<dyn EntitySession>) -> Self {
        Self::Entity {
            session,
            operator: false,
        }
    }

    #[must_use]
    pub fn operator(session: Arc<dyn EntitySession>) -> Self {
        Self::Entity {
            session,
            operator: true,
        }
    }

    /// Console and operators may run admin sub-commands.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        match self {
            Self::Console(_) => true,
            Self::Entity { operator, .. } => *operator,
        }
    }

    pub fn send_message(&self, message: &str) {
        match self {
            Self::Console(out) => out.send_message(message),
            Self::Entity { session, .. } => session.send_message(message),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Console(_) => "console".to_string(),
            Self::Entity { session, .. } => session.display_name().to_string(),
        }
    }
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console(_) => f.write_str("Console"),
            Self::Entity { session, operator } => f
                .debug_struct("Entity")
                .field("identity", &session.identity())
                .field("name", &session.display_name())
                .field("operator", operator)
                .finish(),
        }
    }
}
