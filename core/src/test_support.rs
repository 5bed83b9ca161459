//! Fakes for unit tests.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use invitegate_config::{ConfigError, ConfigSource, GateConfig};
use invitegate_types::{Identity, PunishmentPolicy};

use crate::gate::AdmissionGate;
use crate::host::{ConsoleOutput, EntitySession, ExclusionError, ExclusionList};
use crate::scheduler::ManualScheduler;
use crate::store::VerificationStore;

type LivenessHook = Box<dyn FnOnce(&FakeSession) + Send>;

pub(crate) struct FakeSession {
    identity: Identity,
    name: String,
    address: Option<IpAddr>,
    live: AtomicBool,
    messages: Mutex<Vec<String>>,
    terminated: Mutex<Option<String>>,
    terminations: AtomicUsize,
    liveness_hook: Mutex<Option<LivenessHook>>,
}

impl FakeSession {
    pub(crate) fn new(name: &str) -> Self {
        Self::with_identity(Identity::random(), name)
    }

    fn with_identity(identity: Identity, name: &str) -> Self {
        Self {
            identity,
            name: name.to_string(),
            address: None,
            live: AtomicBool::new(true),
            messages: Mutex::new(Vec::new()),
            terminated: Mutex::new(None),
            terminations: AtomicUsize::new(0),
            liveness_hook: Mutex::new(None),
        }
    }

    pub(crate) fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// A fresh live session for the same identity.
    pub(crate) fn reconnect(&self) -> Self {
        let mut next = Self::with_identity(self.identity, &self.name);
        next.address = self.address;
        next
    }

    /// Run `hook` inside the next `is_live` call, i.e. between a decision
    /// taken under the gate lock and the action that follows it.
    pub(crate) fn on_next_liveness_check(&self, hook: impl FnOnce(&FakeSession) + Send + 'static) {
        *self.liveness_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn disconnect(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn terminated_with(&self) -> Option<String> {
        self.terminated.lock().unwrap().clone()
    }

    pub(crate) fn terminate_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl EntitySession for FakeSession {
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
        let hook = self.liveness_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(self);
        }
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
pub(crate) struct RecordingExclusions {
    names: Mutex<Vec<String>>,
    addresses: Mutex<Vec<IpAddr>>,
    fail: bool,
}

impl RecordingExclusions {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    pub(crate) fn addresses(&self) -> Vec<IpAddr> {
        self.addresses.lock().unwrap().clone()
    }
}

impl ExclusionList for RecordingExclusions {
    fn ban_name(&self, name: &str, _reason: &str) -> Result<(), ExclusionError> {
        if self.fail {
            return Err(ExclusionError::new(name, "ban list unavailable"));
        }
        self.names.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn ban_address(&self, address: IpAddr, _reason: &str) -> Result<(), ExclusionError> {
        if self.fail {
            return Err(ExclusionError::new(address.to_string(), "ban list unavailable"));
        }
        self.addresses.lock().unwrap().push(address);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingConsole {
    messages: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ConsoleOutput for RecordingConsole {
    fn send_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Config source whose next result the test controls.
pub(crate) struct StaticConfigSource {
    config: Mutex<GateConfig>,
    fail_next: AtomicBool,
}

impl StaticConfigSource {
    pub(crate) fn new(config: GateConfig) -> Self {
        Self {
            config: Mutex::new(config),
            fail_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn set(&self, config: GateConfig) {
        *self.config.lock().unwrap() = config;
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<GateConfig, ConfigError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ConfigError::Read {
                path: PathBuf::from("config.yml"),
                source: std::io::Error::other("simulated read failure"),
            });
        }
        Ok(self.config.lock().unwrap().clone())
    }
}

/// Gate with codes `["ABC"]`, defaults otherwise, a manual clock and a
/// state file in a temp dir.
pub(crate) struct Harness {
    pub(crate) gate: Arc<AdmissionGate>,
    pub(crate) scheduler: Arc<ManualScheduler>,
    pub(crate) source: Arc<StaticConfigSource>,
    pub(crate) exclusions: Arc<RecordingExclusions>,
    pub(crate) dir: tempfile::TempDir,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(GateConfig::default().with_invite_codes(["ABC"]))
    }

    pub(crate) fn with_punishment(policy: PunishmentPolicy) -> Self {
        Self::with_config(
            GateConfig::default()
                .with_invite_codes(["ABC"])
                .with_punishment(policy),
        )
    }

    pub(crate) fn with_max_attempts(max: u32) -> Self {
        let max = std::num::NonZeroU32::new(max).expect("positive");
        Self::with_config(
            GateConfig::default()
                .with_invite_codes(["ABC"])
                .with_max_attempts(max),
        )
    }

    pub(crate) fn with_config(config: GateConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = VerificationStore::open(dir.path().join("verified.yml"));
        let scheduler = Arc::new(ManualScheduler::new());
        let source = Arc::new(StaticConfigSource::new(config.clone()));
        let exclusions = Arc::new(RecordingExclusions::default());
        let gate = AdmissionGate::new(
            store,
            config,
            source.clone(),
            exclusions.clone(),
            scheduler.clone(),
        );
        Self {
            gate,
            scheduler,
            source,
            exclusions,
            dir,
        }
    }

    pub(crate) fn state_path(&self) -> PathBuf {
        self.dir.path().join("verified.yml")
    }
}
