//! # Policy Step Resolution
//!
//! Maps a `(ProvisionState, DeviceState)` pair to the single lifecycle
//! callback every policy capability receives. Evaluated in order:
//!
//! 1. `DeviceState::Cleared` → [`PolicyStep::Cleared`], whatever the
//!    provision state.
//! 2. `ProvisionState::ProvisionSucceeded` → the device-axis callback;
//!    `Undefined` sends nothing ([`PolicyStep::Idle`]).
//! 3. Otherwise the provision-axis callback.
//!
//! Clearing during enrollment applies `Cleared` but never moves the
//! provision axis back to `UNPROVISIONED`.

use devlock_core::{DeviceState, ProvisionState};
use serde::{Deserialize, Serialize};

/// The callback fanned out to every capability for a state pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStep {
    Unprovisioned,
    ProvisionInProgress,
    ProvisionPaused,
    ProvisionFailed,
    /// `KIOSK_PROVISIONED`.
    Provisioned,
    Locked,
    Unlocked,
    Cleared,
    /// No capability is called.
    Idle,
}

impl PolicyStep {
    /// Name of the capability callback, for logs and aggregate errors.
    pub fn callback_name(&self) -> &'static str {
        match self {
            Self::Unprovisioned => "on_unprovisioned",
            Self::ProvisionInProgress => "on_provision_in_progress",
            Self::ProvisionPaused => "on_provision_paused",
            Self::ProvisionFailed => "on_provision_failed",
            Self::Provisioned => "on_provisioned",
            Self::Locked => "on_locked",
            Self::Unlocked => "on_unlocked",
            Self::Cleared => "on_cleared",
            Self::Idle => "none",
        }
    }
}

impl std::fmt::Display for PolicyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.callback_name())
    }
}

/// Resolve the policy step for a state pair.
pub fn resolve_policy_step(provision: ProvisionState, device: DeviceState) -> PolicyStep {
    if device == DeviceState::Cleared {
        return PolicyStep::Cleared;
    }
    match provision {
        ProvisionState::ProvisionSucceeded => match device {
            DeviceState::Locked => PolicyStep::Locked,
            DeviceState::Unlocked => PolicyStep::Unlocked,
            DeviceState::Undefined => PolicyStep::Idle,
            // Handled above.
            DeviceState::Cleared => PolicyStep::Cleared,
        },
        ProvisionState::Unprovisioned => PolicyStep::Unprovisioned,
        ProvisionState::ProvisionInProgress => PolicyStep::ProvisionInProgress,
        ProvisionState::ProvisionPaused => PolicyStep::ProvisionPaused,
        ProvisionState::ProvisionFailed => PolicyStep::ProvisionFailed,
        ProvisionState::KioskProvisioned => PolicyStep::Provisioned,
    }
}
