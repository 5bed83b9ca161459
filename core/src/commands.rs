//! The `/join` command.
//!
//! `/join <code>` is open to every entity. The admin sub-verbs need the
//! console or an operator.

use invitegate_types::VerifyOutcome;

use crate::gate::AdmissionGate;
use crate::host::CommandSender;
use crate::messages;

pub const COMMAND_LABEL: &str = "join";

#[derive(Debug, Clone, Copy)]
struct AdminSpec {
    name: &'static str,
    command: AdminCommand,
}

const ADMIN_SPECS: &[AdminSpec] = &[
    AdminSpec {
        name: "reload",
        command: AdminCommand::Reload,
    },
    AdminSpec {
        name: "reloadverified",
        command: AdminCommand::ReloadVerified,
    },
    AdminSpec {
        name: "resetattempts",
        command: AdminCommand::ResetAttempts,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Reload,
    ResetAttempts,
    ReloadVerified,
}

/// Parsed `/join` arguments.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// No arguments.
    Empty,
    Admin(AdminCommand),
    Verify(&'a str),
    /// More than one argument that is not an admin sub-verb.
    BadArity,
}

impl<'a> Command<'a> {
    pub fn parse(args: &[&'a str]) -> Self {
        let Some(first) = args.first().copied() else {
            return Command::Empty;
        };

        // Sub-verbs win regardless of trailing arguments.
        if let Some(spec) = ADMIN_SPECS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(first))
        {
            return Command::Admin(spec.command);
        }

        match args {
            &[code] => Command::Verify(code),
            _ => Command::BadArity,
        }
    }
}

/// Suggestions for the argument being typed.
///
/// Only admin sub-verbs are ever suggested, and only to privileged senders;
/// invite codes stay secret.
#[must_use]
pub fn complete(sender: &CommandSender, args: &[&str]) -> Vec<&'static str> {
    let [current] = args else {
        return Vec::new();
    };
    if !sender.is_privileged() {
        return Vec::new();
    }
    let current = current.to_ascii_lowercase();
    ADMIN_SPECS
        .iter()
        .map(|spec| spec.name)
        .filter(|name| name.starts_with(&current))
        .collect()
}

impl AdmissionGate {
    /// Handle `/join <args>` from `sender`. Always returns `true` (handled).
    pub fn handle_command(&self, sender: &CommandSender, args: &[&str]) -> bool {
        match Command::parse(args) {
            Command::Empty => sender.send_message(messages::USAGE),
            Command::Admin(admin) => {
                if sender.is_privileged() {
                    self.run_admin(sender, admin);
                } else {
                    tracing::warn!(sender = %sender.describe(), ?admin, "Admin command denied");
                    sender.send_message(messages::NO_PERMISSION);
                }
            }
            Command::Verify(code) => match sender {
                CommandSender::Console(_) => sender.send_message(messages::CONSOLE_USAGE),
                CommandSender::Entity { session, .. } => {
                    match self.attempt_verify(session.as_ref(), code) {
                        VerifyOutcome::Success {
                            already_verified: false,
                        } => session.send_message(messages::VERIFIED),
                        VerifyOutcome::Success {
                            already_verified: true,
                        } => session.send_message(messages::ALREADY_VERIFIED),
                        VerifyOutcome::Failure {
                            attempts,
                            max_attempts,
                        } => session.send_message(&messages::invalid_code(attempts, max_attempts)),
                        // The session is gone; the termination reason said it all.
                        VerifyOutcome::Punished { .. } | VerifyOutcome::SessionClosed => {}
                    }
                }
            },
            Command::BadArity => match sender {
                CommandSender::Console(_) => sender.send_message(messages::CONSOLE_USAGE),
                CommandSender::Entity { .. } => sender.send_message(messages::VERIFY_USAGE),
            },
        }
        true
    }

    fn run_admin(&self, sender: &CommandSender, admin: AdminCommand) {
        tracing::info!(sender = %sender.describe(), ?admin, "Admin command");
        match admin {
            AdminCommand::Reload => match self.reload_config() {
                Ok(_) => sender.send_message(messages::CONFIG_RELOADED),
                Err(e) => sender.send_message(&messages::reload_failed("config", &e)),
            },
            AdminCommand::ResetAttempts => {
                let cleared = self.reset_attempts();
                sender.send_message(&messages::attempts_reset(cleared));
            }
            AdminCommand::ReloadVerified => match self.reload_verified_state() {
                Ok(_) => sender.send_message(messages::VERIFIED_RELOADED),
                Err(e) => {
                    tracing::error!("{e}");
                    sender.send_message(&messages::reload_failed("verified state", &e));
                }
            },
        }
    }
}
