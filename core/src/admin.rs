//! Admin Control Surface: live reloads and counter resets.

use std::sync::Arc;

use invitegate_config::{ConfigError, GateConfig};

use crate::gate::AdmissionGate;
use crate::store::StoreError;

impl AdmissionGate {
    /// Re-read configuration from the configured source.
    ///
    /// Applies to every later verification and newly armed watchdog. On
    /// failure the previous snapshot stays in effect.
    pub fn reload_config(&self) -> Result<Arc<GateConfig>, ConfigError> {
        // Read outside the lock; only the swap is serialised.
        let config = Arc::new(self.config_source.load()?);
        self.lock().config = Arc::clone(&config);
        tracing::info!(
            codes = config.invite_code_count(),
            time_limit = config.time_limit_secs(),
            max_attempts = config.max_attempts(),
            punishment = %config.punishment(),
            "Configuration reloaded"
        );
        Ok(config)
    }

    /// Zero every failed-attempt counter. Returns how many were non-zero.
    pub fn reset_attempts(&self) -> usize {
        let cleared = self.lock().store.clear_attempts();
        tracing::info!(cleared, "Failed attempts reset");
        cleared
    }

    /// Replace in-memory verification state with the state file's contents.
    ///
    /// Returns the number of records loaded. On failure nothing changes.
    pub fn reload_verified_state(&self) -> Result<usize, StoreError> {
        let loaded = self.lock().store.reload()?;
        tracing::info!(records = loaded, "Verification state reloaded");
        Ok(loaded)
    }
}
