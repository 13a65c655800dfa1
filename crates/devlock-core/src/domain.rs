//! # Domain Enums: Provisioning, Device, and Lock Task Vocabulary
//!
//! ## Provisioning lifecycle
//!
//! ```text
//! UNPROVISIONED ──READY──▶ PROVISION_IN_PROGRESS ──PAUSE──▶ PROVISION_PAUSED
//!                              │   ▲      ▲                      │
//!                       FAILURE│   │RETRY └───────RESUME─────────┘
//!                              ▼   │
//!                        PROVISION_FAILED
//!
//! PROVISION_IN_PROGRESS ──KIOSK──▶ KIOSK_PROVISIONED ──SUCCESS──▶ PROVISION_SUCCEEDED
//! ```
//!
//! ## Device axis
//!
//! `UNDEFINED`, `UNLOCKED`, `LOCKED`, `CLEARED`. `CLEARED` is terminal.
//!
//! ## Lock task type
//!
//! Derived and never persisted. At most one is active at a time.

use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

/// Generates the wire-name helpers shared by every domain enum:
/// `ALL`, `as_str()`, `Display`, and `FromStr`.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The canonical wire name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
                match normalized.as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

// ─── Provision State ─────────────────────────────────────────────────

/// Persisted stage of the enrollment program.
///
/// Mutated only through the provision state controller's transition
/// function; survives process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionState {
    /// The device has not been enrolled into the program.
    #[default]
    Unprovisioned,
    /// Enrollment has started; the kiosk application is being installed.
    ProvisionInProgress,
    /// The user deferred enrollment.
    ProvisionPaused,
    /// Enrollment failed and may be retried.
    ProvisionFailed,
    /// The kiosk application is installed but not yet finalized.
    KioskProvisioned,
    /// Enrollment completed; the device axis now drives policy.
    ProvisionSucceeded,
}

wire_enum!(ProvisionState, "provision state", {
    Unprovisioned => "UNPROVISIONED",
    ProvisionInProgress => "PROVISION_IN_PROGRESS",
    ProvisionPaused => "PROVISION_PAUSED",
    ProvisionFailed => "PROVISION_FAILED",
    KioskProvisioned => "KIOSK_PROVISIONED",
    ProvisionSucceeded => "PROVISION_SUCCEEDED",
});

impl ProvisionState {
    /// Whether a kiosk identity exists to enforce device restrictions against.
    pub fn has_kiosk(&self) -> bool {
        matches!(self, Self::KioskProvisioned | Self::ProvisionSucceeded)
    }

    /// Whether enrollment is underway but has not yet installed the kiosk.
    pub fn is_enrolling(&self) -> bool {
        matches!(
            self,
            Self::ProvisionInProgress | Self::ProvisionPaused | Self::ProvisionFailed
        )
    }
}

// ─── Provision Event ─────────────────────────────────────────────────

/// Named triggers that drive provision state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionEvent {
    /// Setup parameters arrived and out-of-box setup is complete.
    Ready,
    /// The user deferred enrollment.
    Pause,
    /// A deferred enrollment resumes.
    Resume,
    /// The kiosk application finished installing.
    Kiosk,
    /// Enrollment failed.
    Failure,
    /// A failed enrollment is retried.
    Retry,
    /// The first lock or unlock after kiosk setup succeeded.
    Success,
}

wire_enum!(ProvisionEvent, "provision event", {
    Ready => "READY",
    Pause => "PAUSE",
    Resume => "RESUME",
    Kiosk => "KIOSK",
    Failure => "FAILURE",
    Retry => "RETRY",
    Success => "SUCCESS",
});

// ─── Device State ────────────────────────────────────────────────────

/// Persisted lock/unlock/clear axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    /// No lock decision has been made yet.
    #[default]
    Undefined,
    /// The device is usable without restriction.
    Unlocked,
    /// The device is restricted to the lock screen.
    Locked,
    /// Restrictions have been permanently removed (terminal).
    Cleared,
}

wire_enum!(DeviceState, "device state", {
    Undefined => "UNDEFINED",
    Unlocked => "UNLOCKED",
    Locked => "LOCKED",
    Cleared => "CLEARED",
});

impl DeviceState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cleared)
    }
}

// ─── Lock Task Type ──────────────────────────────────────────────────

/// The exclusive operating mode derived from a (ProvisionState, DeviceState)
/// pair. The "unresolved" sentinel is modelled as `Option::None` by holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockTaskType {
    /// No restricted mode is active.
    NotActive,
    /// The enrollment screen is pinned.
    EnrollmentUi,
    /// The kiosk setup screen is pinned.
    SetupUi,
    /// The kiosk lock screen is pinned.
    LockUi,
    /// The critical-failure screen is pinned.
    CriticalError,
}

wire_enum!(LockTaskType, "lock task type", {
    NotActive => "NOT_ACTIVE",
    EnrollmentUi => "ENROLLMENT_UI",
    SetupUi => "SETUP_UI",
    LockUi => "LOCK_UI",
    CriticalError => "CRITICAL_ERROR",
});

impl LockTaskType {
    /// Whether entering this mode requires pinning a screen.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::NotActive)
    }
}

// ─── Finalization ────────────────────────────────────────────────────

/// Persisted state of program finalization after restrictions are cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizationState {
    /// Restrictions are still in force.
    #[default]
    Unfinalized,
    /// Restrictions are cleared locally but the check-in service has not
    /// acknowledged it.
    FinalizedUnreported,
    /// The check-in service acknowledged finalization (terminal).
    Finalized,
}

wire_enum!(FinalizationState, "finalization state", {
    Unfinalized => "UNFINALIZED",
    FinalizedUnreported => "FINALIZED_UNREPORTED",
    Finalized => "FINALIZED",
});

/// Triggers for the finalization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizationEvent {
    /// The device state reached `CLEARED`.
    RestrictionsCleared,
    /// The check-in service acknowledged the finalization report.
    ReportAcknowledged,
}

wire_enum!(FinalizationEvent, "finalization event", {
    RestrictionsCleared => "RESTRICTIONS_CLEARED",
    ReportAcknowledged => "REPORT_ACKNOWLEDGED",
});
