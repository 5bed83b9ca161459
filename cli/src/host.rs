//! In-process host that drives the gate from protocol events.
//!
//! Players exist only as entries in a map; their "screen" is the console
//! output, prefixed with their name.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use invitegate_core::{
    AdmissionGate, COMMAND_LABEL, CommandSender, ConnectionId, ConsoleOutput, EntitySession,
    ExclusionError, ExclusionList, Identity, MoveDecision, Position, complete,
};
use invitegate_utils::strip_color_codes;

use crate::protocol::{Event, HELP};

const SPAWN: Position = Position::new(0.5, 64.0, 0.5, 0.0, 0.0);

/// Console output on stdout with color codes removed.
pub(crate) struct StdoutConsole;

impl ConsoleOutput for StdoutConsole {
    fn send_message(&self, message: &str) {
        println!("{}", strip_color_codes(message));
    }
}

pub(crate) struct ConsoleSession {
    identity: Identity,
    name: String,
    address: Option<IpAddr>,
    live: AtomicBool,
    out: Arc<dyn ConsoleOutput>,
}

impl ConsoleSession {
    fn new(
        identity: Identity,
        name: &str,
        address: Option<IpAddr>,
        out: Arc<dyn ConsoleOutput>,
    ) -> Self {
        Self {
            identity,
            name: name.to_string(),
            address,
            live: AtomicBool::new(true),
            out,
        }
    }

    fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl EntitySession for ConsoleSession {
    fn identity(&self) -> Identity {
        self.identity
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Option<IpAddr> {
        self.address
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: &str) {
        if self.is_live() {
            self.out.send_message(&format!("[to {}] {message}", self.name));
        }
    }

    fn terminate(&self, reason: &str) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.out
                .send_message(&format!("{} was disconnected: {reason}", self.name));
        }
    }
}

/// Ban lists kept in memory for the lifetime of the process.
#[derive(Default)]
pub(crate) struct MemoryExclusions {
    names: Mutex<HashSet<String>>,
    addresses: Mutex<HashSet<IpAddr>>,
}

impl MemoryExclusions {
    fn is_excluded(&self, name: &str, address: Option<IpAddr>) -> bool {
        let by_name = self
            .names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&name.to_ascii_lowercase());
        let by_address = address.is_some_and(|ip| {
            self.addresses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&ip)
        });
        by_name || by_address
    }
}

impl ExclusionList for MemoryExclusions {
    fn ban_name(&self, name: &str, reason: &str) -> Result<(), ExclusionError> {
        tracing::info!(name, reason, "Name banned");
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_ascii_lowercase());
        Ok(())
    }

    fn ban_address(&self, address: IpAddr, reason: &str) -> Result<(), ExclusionError> {
        tracing::info!(%address, reason, "Address banned");
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address);
        Ok(())
    }
}

struct Player {
    session: Arc<ConsoleSession>,
    connection: ConnectionId,
    position: Position,
    operator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct ConsoleHost {
    gate: Arc<AdmissionGate>,
    exclusions: Arc<MemoryExclusions>,
    console: Arc<dyn ConsoleOutput>,
    /// Keyed by lowercased name.
    players: HashMap<String, Player>,
}

impl ConsoleHost {
    pub(crate) fn new(
        gate: Arc<AdmissionGate>,
        exclusions: Arc<MemoryExclusions>,
        console: Arc<dyn ConsoleOutput>,
    ) -> Self {
        Self {
            gate,
            exclusions,
            console,
            players: HashMap::new(),
        }
    }

    fn say(&self, message: &str) {
        self.console.send_message(message);
    }

    /// Apply one protocol line.
    pub(crate) fn handle_line(&mut self, line: &str) -> Flow {
        // Watchdogs terminate sessions in the background.
        self.prune_closed();

        match Event::parse(line) {
            Event::Empty => {}
            Event::Connect {
                identity,
                name,
                address,
            } => self.connect(identity, name, address),
            Event::Disconnect(name) => {
                if !self.disconnect(name) {
                    self.say(&format!("{name} is not online"));
                }
            }
            Event::Chat { name, text } => self.chat(name, &text),
            Event::Move { name, to } => self.move_player(name, to),
            Event::Command { name, args } => self.player_command(name, &args),
            Event::Op(name) => match self.players.get_mut(&name.to_ascii_lowercase()) {
                Some(player) => {
                    player.operator = true;
                    self.say(&format!("{name} is now an operator"));
                }
                None => self.say(&format!("{name} is not online")),
            },
            Event::Console(args) => {
                let sender = CommandSender::Console(Arc::clone(&self.console));
                self.gate.handle_command(&sender, &args);
            }
            Event::Tab { who, prefix } => self.tab(who, prefix),
            Event::Save => match self.gate.save() {
                Ok(()) => self.say("Saved verification state"),
                Err(e) => self.say(&format!("Save failed: {e}")),
            },
            Event::Help => self.say(HELP),
            Event::Quit => return Flow::Quit,
            Event::Invalid(message) => self.say(&message),
        }

        self.prune_closed();
        Flow::Continue
    }

    fn connect(&mut self, identity: Identity, name: &str, address: Option<IpAddr>) {
        if self.exclusions.is_excluded(name, address) {
            tracing::info!(name, "Refused banned connection");
            self.say(&format!("{name} was refused: banned"));
            return;
        }
        // A second login under the same name replaces the first.
        self.disconnect(name);

        let session = Arc::new(ConsoleSession::new(
            identity,
            name,
            address,
            Arc::clone(&self.console),
        ));
        self.say(&format!("{name} joined"));
        let connection = self
            .gate
            .on_connect(Arc::clone(&session) as Arc<dyn EntitySession>);
        self.players.insert(
            name.to_ascii_lowercase(),
            Player {
                session,
                connection,
                position: SPAWN,
                operator: false,
            },
        );
    }

    fn disconnect(&mut self, name: &str) -> bool {
        let Some(player) = self.players.remove(&name.to_ascii_lowercase()) else {
            return false;
        };
        player.session.close();
        self.gate
            .on_disconnect(&player.session.identity(), player.connection);
        self.say(&format!("{} left", player.session.display_name()));
        true
    }

    fn chat(&self, name: &str, text: &str) {
        let Some(player) = self.player(name) else {
            return;
        };
        if self.gate.on_chat(player.session.as_ref()) {
            self.say(&format!("<{}> {text}", player.session.display_name()));
        }
    }

    fn move_player(&mut self, name: &str, to: Position) {
        let Some(player) = self.players.get_mut(&name.to_ascii_lowercase()) else {
            self.say(&format!("{name} is not online"));
            return;
        };
        match self
            .gate
            .on_move(&player.session.identity(), &player.position, &to)
        {
            MoveDecision::Allow => player.position = to,
            MoveDecision::Redirect(held) => {
                player.position = held;
                self.console.send_message(&format!(
                    "{} held at {:.1} {:.1} {:.1}",
                    player.session.display_name(),
                    held.x,
                    held.y,
                    held.z
                ));
            }
        }
    }

    fn player_command(&self, name: &str, args: &[&str]) {
        let Some(player) = self.player(name) else {
            return;
        };
        let sender = self.sender_for(player);
        tracing::debug!(name, label = COMMAND_LABEL, ?args, "Player command");
        self.gate.handle_command(&sender, args);
    }

    fn tab(&self, who: &str, prefix: &str) {
        let sender = if who.eq_ignore_ascii_case("console") {
            CommandSender::Console(Arc::clone(&self.console))
        } else {
            let Some(player) = self.player(who) else {
                return;
            };
            self.sender_for(player)
        };
        let suggestions = complete(&sender, &[prefix]);
        self.say(&format!("/{COMMAND_LABEL} {}", suggestions.join(" | ")));
    }

    fn sender_for(&self, player: &Player) -> CommandSender {
        let session = Arc::clone(&player.session) as Arc<dyn EntitySession>;
        if player.operator {
            CommandSender::operator(session)
        } else {
            CommandSender::entity(session)
        }
    }

    fn player(&self, name: &str) -> Option<&Player> {
        let player = self.players.get(&name.to_ascii_lowercase());
        if player.is_none() {
            self.say(&format!("{name} is not online"));
        }
        player
    }

    fn prune_closed(&mut self) {
        let closed: Vec<String> = self
            .players
            .iter()
            .filter(|(_, player)| !player.session.is_live())
            .map(|(key, _)| key.clone())
            .collect();
        for key in closed {
            if let Some(player) = self.players.remove(&key) {
                self.gate
                    .on_disconnect(&player.session.identity(), player.connection);
            }
        }
    }

    pub(crate) fn online(&self) -> usize {
        self.players.len()
    }
}
