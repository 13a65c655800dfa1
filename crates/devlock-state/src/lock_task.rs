//! # Lock Task Resolution
//!
//! ```text
//! | ProvisionState        | DeviceState          | LockTaskType  |
//! |-----------------------|----------------------|---------------|
//! | UNPROVISIONED         | any                  | NOT_ACTIVE    |
//! | any                   | CLEARED              | NOT_ACTIVE    |
//! | PROVISION_IN_PROGRESS | -                    | ENROLLMENT_UI |
//! | KIOSK_PROVISIONED     | -                    | SETUP_UI      |
//! | PROVISION_SUCCEEDED   | LOCKED               | LOCK_UI       |
//! | PROVISION_SUCCEEDED   | UNLOCKED / UNDEFINED | NOT_ACTIVE    |
//! | PROVISION_PAUSED      | -                    | NOT_ACTIVE    |
//! | PROVISION_FAILED      | -                    | NOT_ACTIVE    |
//! ```
//!
//! `CRITICAL_ERROR` is never produced here; only the critical-failure
//! enforcement path selects it.

use devlock_core::{DeviceState, LockTaskType, ProvisionState};

/// Resolve the operating mode for a state pair.
pub fn resolve_lock_task_type(provision: ProvisionState, device: DeviceState) -> LockTaskType {
    if provision == ProvisionState::Unprovisioned || device == DeviceState::Cleared {
        return LockTaskType::NotActive;
    }
    match provision {
        ProvisionState::ProvisionInProgress => LockTaskType::EnrollmentUi,
        ProvisionState::KioskProvisioned => LockTaskType::SetupUi,
        ProvisionState::ProvisionSucceeded if device == DeviceState::Locked => {
            LockTaskType::LockUi
        }
        _ => LockTaskType::NotActive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unprovisioned_is_never_active() {
        for device in DeviceState::ALL {
            assert_eq!(
                resolve_lock_task_type(ProvisionState::Unprovisioned, *device),
                LockTaskType::NotActive
            );
        }
    }

    #[test]
    fn test_cleared_is_never_active() {
        for provision in ProvisionState::ALL {
            assert_eq!(
                resolve_lock_task_type(*provision, DeviceState::Cleared),
                LockTaskType::NotActive
            );
        }
    }

    #[test]
    fn test_enrollment_and_setup_ignore_device_axis() {
        for device in [DeviceState::Undefined, DeviceState::Locked, DeviceState::Unlocked] {
            assert_eq!(
                resolve_lock_task_type(ProvisionState::ProvisionInProgress, device),
                LockTaskType::EnrollmentUi
            );
            assert_eq!(
                resolve_lock_task_type(ProvisionState::KioskProvisioned, device),
                LockTaskType::SetupUi
            );
        }
    }

    #[test]
    fn test_succeeded_locked_is_lock_ui() {
        let p = ProvisionState::ProvisionSucceeded;
        assert_eq!(resolve_lock_task_type(p, DeviceState::Locked), LockTaskType::LockUi);
        assert_eq!(resolve_lock_task_type(p, DeviceState::Unlocked), LockTaskType::NotActive);
        assert_eq!(resolve_lock_task_type(p, DeviceState::Undefined), LockTaskType::NotActive);
    }

    #[test]
    fn test_paused_and_failed_are_not_active() {
        for device in [DeviceState::Undefined, DeviceState::Locked, DeviceState::Unlocked] {
            assert_eq!(
                resolve_lock_task_type(ProvisionState::ProvisionPaused, device),
                LockTaskType::NotActive
            );
            assert_eq!(
                resolve_lock_task_type(ProvisionState::ProvisionFailed, device),
                LockTaskType::NotActive
            );
        }
    }

    fn any_provision() -> impl Strategy<Value = ProvisionState> {
        proptest::sample::select(ProvisionState::ALL.to_vec())
    }

    fn any_device() -> impl Strategy<Value = DeviceState> {
        proptest::sample::select(DeviceState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(p in any_provision(), d in any_device()) {
            prop_assert_eq!(resolve_lock_task_type(p, d), resolve_lock_task_type(p, d));
        }

        #[test]
        fn prop_never_critical_error(p in any_provision(), d in any_device()) {
            prop_assert_ne!(resolve_lock_task_type(p, d), LockTaskType::CriticalError);
        }
    }
}
