//! Shared test utilities and fixtures
//!
//! Gates here are opened from a real data directory, so configuration and
//! state go through the same files the console host uses.

#![allow(dead_code)]

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use invitegate_core::{
    AdmissionGate, ConsoleOutput, EntitySession, ExclusionError, ExclusionList, Identity,
    ManualScheduler,
};
use tempfile::TempDir;

pub const STANDARD_CONFIG: &str = r#"
invite-codes: ["ABC", "WELCOME"]
time-limit: 60
max-attempts: 3
punishment: kick
kick-message: "&cYou must use /join <code> to play!"
ban-message: "&cBanned."
"#;

/// A connected player whose outgoing messages are recorded.
pub struct Player {
    identity: Identity,
    name: String,
    address: Option<IpAddr>,
    live: AtomicBool,
    messages: Mutex<Vec<String>>,
    terminated: Mutex<Option<String>>,
    terminations: AtomicUsize,
}

impl Player {
    pub fn new(name: &str) -> Arc<Self> {
        Self::build(Identity::random(), name, None)
    }

    pub fn with_address(name: &str, address: &str) -> Arc<Self> {
        Self::build(
            Identity::random(),
            name,
            Some(address.parse().expect("valid address")),
        )
    }

    /// New connection for the same identity.
    pub fn rejoin(&self) -> Arc<Self> {
        Self::build(self.identity, &self.name, self.address)
    }

    fn build(identity: Identity, name: &str, address: Option<IpAddr>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            name: name.to_string(),
            address,
            live: AtomicBool::new(true),
            messages: Mutex::new(Vec::new()),
            terminated: Mutex::new(None),
            terminations: AtomicUsize::new(0),
        })
    }

    pub fn leave(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }

    pub fn terminated_with(&self) -> Option<String> {
        self.terminated.lock().unwrap().clone()
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl EntitySession for Player {
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
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn terminate(&self, reason: &str) {
        self.live.store(false, Ordering::SeqCst);
        self.terminations.fetch_add(1, Ordering::SeqCst);
        *self.terminated.lock().unwrap() = Some(reason.to_string());
    }
}

#[derive(Default)]
pub struct BanList {
    pub names: Mutex<Vec<String>>,
    pub addresses: Mutex<Vec<IpAddr>>,
}

impl ExclusionList for BanList {
    fn ban_name(&self, name: &str, _reason: &str) -> Result<(), ExclusionError> {
        self.names.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn ban_address(&self, address: IpAddr, _reason: &str) -> Result<(), ExclusionError> {
        self.addresses.lock().unwrap().push(address);
        Ok(())
    }
}

#[derive(Default)]
pub struct Console {
    messages: Mutex<Vec<String>>,
}

impl Console {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ConsoleOutput for Console {
    fn send_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// A gate opened on a temp data directory.
pub struct Server {
    pub dir: TempDir,
    pub gate: Arc<AdmissionGate>,
    pub clock: Arc<ManualScheduler>,
    pub bans: Arc<BanList>,
}

impl Server {
    pub fn start(config_yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.yml"), config_yaml).expect("write config");
        Self::start_in(dir)
    }

    /// Open a gate on an existing directory, as after a restart.
    pub fn start_in(dir: TempDir) -> Self {
        let clock = Arc::new(ManualScheduler::new());
        let bans = Arc::new(BanList::default());
        let gate = AdmissionGate::open(dir.path(), bans.clone(), clock.clone()).expect("open gate");
        Self {
            dir,
            gate,
            clock,
            bans,
        }
    }

    /// Drop this gate and open a fresh one on the same directory.
    pub fn restart(self) -> Self {
        let Self { dir, gate, .. } = self;
        gate.save().expect("save on shutdown");
        drop(gate);
        Self::start_in(dir)
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    pub fn state_file(&self) -> String {
        read(&self.path("verified.yml"))
    }

    pub fn rewrite_config(&self, config_yaml: &str) {
        std::fs::write(self.path("config.yml"), config_yaml).expect("write config");
    }
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}
