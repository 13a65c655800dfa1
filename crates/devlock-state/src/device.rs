//! # Device Request Gating
//!
//! Lock, unlock, and clear requests are gated by the provision axis:
//!
//! - `UNPROVISIONED`: only the in-memory pseudo state changes. No kiosk
//!   identity exists yet to enforce restrictions against.
//! - `PROVISION_IN_PROGRESS`, `PROVISION_PAUSED`, `PROVISION_FAILED`:
//!   rejected with `NotYetProvisioned`.
//! - `KIOSK_PROVISIONED`, `PROVISION_SUCCEEDED`: the persisted state
//!   changes and policy is enforced.
//!
//! A device whose effective state is already `CLEARED` rejects every
//! request with `DeviceCleared`, except that the lenient flag lets `clear`
//! be repeated while unprovisioned.

use devlock_core::{DeviceState, ProvisionState, StateError};
use serde::{Deserialize, Serialize};

/// A request against the device axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRequest {
    Lock,
    Unlock,
    Clear,
}

impl DeviceRequest {
    /// The device state the request moves to.
    pub fn target(&self) -> DeviceState {
        match self {
            Self::Lock => DeviceState::Locked,
            Self::Unlock => DeviceState::Unlocked,
            Self::Clear => DeviceState::Cleared,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Clear => "clear",
        }
    }
}

impl std::fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the device controller must do for an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePlan {
    /// Record the target in the in-memory pseudo state only.
    Pseudo(DeviceState),
    /// Persist the target and enforce policy for the new pair.
    Persist(DeviceState),
}

/// Decide how to handle `request`.
///
/// `effective` is the pseudo state while unprovisioned and the persisted
/// state otherwise.
pub fn plan_device_request(
    provision: ProvisionState,
    effective: DeviceState,
    request: DeviceRequest,
    allow_clear_when_unprovisioned: bool,
) -> Result<DevicePlan, StateError> {
    let lenient_clear = allow_clear_when_unprovisioned
        && provision == ProvisionState::Unprovisioned
        && request == DeviceRequest::Clear;

    if effective == DeviceState::Cleared && !lenient_clear {
        return Err(StateError::DeviceCleared);
    }

    match provision {
        ProvisionState::Unprovisioned => Ok(DevicePlan::Pseudo(request.target())),
        ProvisionState::ProvisionInProgress
        | ProvisionState::ProvisionPaused
        | ProvisionState::ProvisionFailed => Err(StateError::NotYetProvisioned { state: provision }),
        ProvisionState::KioskProvisioned | ProvisionState::ProvisionSucceeded => {
            Ok(DevicePlan::Persist(request.target()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUESTS: [DeviceRequest; 3] =
        [DeviceRequest::Lock, DeviceRequest::Unlock, DeviceRequest::Clear];

    // ── Provision gating ─────────────────────────────────────────────

    #[test]
    fn test_unprovisioned_only_touches_pseudo_state() {
        for request in REQUESTS {
            let plan = plan_device_request(
                ProvisionState::Unprovisioned,
                DeviceState::Undefined,
                request,
                false,
            )
            .unwrap();
            assert_eq!(plan, DevicePlan::Pseudo(request.target()));
        }
    }

    #[test]
    fn test_enrolling_states_reject() {
        for provision in [
            ProvisionState::ProvisionInProgress,
            ProvisionState::ProvisionPaused,
            ProvisionState::ProvisionFailed,
        ] {
            for request in REQUESTS {
                let err =
                    plan_device_request(provision, DeviceState::Undefined, request, true).unwrap_err();
                assert_eq!(err, StateError::NotYetProvisioned { state: provision });
            }
        }
    }

    #[test]
    fn test_kiosk_states_persist() {
        for provision in [
            ProvisionState::KioskProvisioned,
            ProvisionState::ProvisionSucceeded,
        ] {
            for request in REQUESTS {
                let plan =
                    plan_device_request(provision, DeviceState::Unlocked, request, false).unwrap();
                assert_eq!(plan, DevicePlan::Persist(request.target()));
            }
        }
    }

    // ── Cleared handling ─────────────────────────────────────────────

    #[test]
    fn test_cleared_rejects_everything_in_strict_mode() {
        for provision in ProvisionState::ALL {
            for request in REQUESTS {
                let err = plan_device_request(*provision, DeviceState::Cleared, request, false)
                    .unwrap_err();
                assert_eq!(err, StateError::DeviceCleared);
            }
        }
    }

    #[test]
    fn test_lenient_mode_allows_repeat_clear_while_unprovisioned() {
        let plan = plan_device_request(
            ProvisionState::Unprovisioned,
            DeviceState::Cleared,
            DeviceRequest::Clear,
            true,
        )
        .unwrap();
        assert_eq!(plan, DevicePlan::Pseudo(DeviceState::Cleared));
    }

    #[test]
    fn test_lenient_mode_still_rejects_lock_and_unlock() {
        for request in [DeviceRequest::Lock, DeviceRequest::Unlock] {
            let err = plan_device_request(
                ProvisionState::Unprovisioned,
                DeviceState::Cleared,
                request,
                true,
            )
            .unwrap_err();
            assert_eq!(err, StateError::DeviceCleared);
        }
    }

    #[test]
    fn test_lenient_mode_does_not_apply_after_provisioning() {
        let err = plan_device_request(
            ProvisionState::ProvisionSucceeded,
            DeviceState::Cleared,
            DeviceRequest::Clear,
            true,
        )
        .unwrap_err();
        assert_eq!(err, StateError::DeviceCleared);
    }
}
