//! Core domain types for InviteGate.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the gate.

#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
mod policy;

pub use ids::{ConnectionId, Identity, InvalidIdentity};
pub use policy::{PunishmentPolicy, UnknownPunishment};

// ============================================================================
// Verification records
// ============================================================================

/// Persisted verification state of one identity.
///
/// A verified record never carries failed attempts; [`VerificationRecord::normalized`]
/// enforces that for records read back from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationRecord {
    verified: bool,
    failed_attempts: u32,
}

impl VerificationRecord {
    #[must_use]
    pub const fn unverified(failed_attempts: u32) -> Self {
        Self {
            verified: false,
            failed_attempts,
        }
    }

    #[must_use]
    pub const fn verified() -> Self {
        Self {
            verified: true,
            failed_attempts: 0,
        }
    }

    /// Build from possibly stale persisted fields.
    #[must_use]
    pub const fn normalized(verified: bool, failed_attempts: u32) -> Self {
        if verified {
            Self::verified()
        } else {
            Self::unverified(failed_attempts)
        }
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verified
    }

    #[must_use]
    pub const fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Transition to verified. Clears the attempt counter in the same step.
    pub fn mark_verified(&mut self) {
        *self = Self::verified();
    }

    /// Count one more incorrect submission and return the new total.
    ///
    /// Verified records are left untouched.
    pub fn record_failure(&mut self) -> u32 {
        if !self.verified {
            self.failed_attempts = self.failed_attempts.saturating_add(1);
        }
        self.failed_attempts
    }

    pub fn clear_attempts(&mut self) {
        self.failed_attempts = 0;
    }

    /// Nothing worth persisting.
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        !self.verified && self.failed_attempts == 0
    }
}

// ============================================================================
// Gate decisions
// ============================================================================

/// Capability an unverified entity is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Chat,
    Move,
}

/// Result of one code submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The identity is verified. `already_verified` is set when it was
    /// verified before this submission and nothing changed.
    Success { already_verified: bool },
    /// Wrong code, threshold not reached yet.
    Failure { attempts: u32, max_attempts: u32 },
    /// Wrong code, threshold reached; the punishment has been applied.
    Punished {
        policy: PunishmentPolicy,
        attempts: u32,
    },
    /// The current connection is already being punished; nothing changed.
    SessionClosed,
}

impl VerifyOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Location and orientation reported by a movement event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    /// True when the coordinates differ; orientation is ignored.
    #[must_use]
    #[allow(clippy::float_cmp)] // exact comparison: any displacement counts
    pub fn is_displaced_from(&self, other: &Self) -> bool {
        self.x != other.x || self.y != other.y || self.z != other.z
    }

    /// `self`'s coordinates with `other`'s orientation.
    #[must_use]
    pub const fn with_orientation_of(&self, other: &Self) -> Self {
        Self {
            x: self.x,
            y: self.y,
            z: self.z,
            yaw: other.yaw,
            pitch: other.pitch,
        }
    }
}

/// What the host should do with a movement event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveDecision {
    Allow,
    /// Replace the destination; the translation is suppressed but the
    /// requested orientation is kept.
    Redirect(Position),
}
