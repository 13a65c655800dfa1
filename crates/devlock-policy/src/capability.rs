//! # Policy Capability Contract
//!
//! A capability is a thin wrapper over one platform concern (restriction
//! toggles, role grants, keep-alive registration). The engine calls exactly
//! one method per enforcement, chosen by [`PolicyStep`].
//!
//! Implementations must not leave side effects partially applied on
//! failure, so retrying a step is always safe. Return `Ok(false)` for
//! failures the capability considers recoverable and `Err` for rejections;
//! the engine treats both as a failed step.

use async_trait::async_trait;
use devlock_state::PolicyStep;

use crate::error::CapabilityError;

/// One independently owned unit of device policy.
#[async_trait]
pub trait PolicyCapability: Send + Sync {
    /// Stable name used in logs and aggregate errors.
    fn name(&self) -> &str;

    async fn on_unprovisioned(&self) -> Result<bool, CapabilityError>;

    async fn on_provision_in_progress(&self) -> Result<bool, CapabilityError>;

    /// Called in `KIOSK_PROVISIONED`.
    async fn on_provisioned(&self) -> Result<bool, CapabilityError>;

    async fn on_provision_paused(&self) -> Result<bool, CapabilityError>;

    async fn on_provision_failed(&self) -> Result<bool, CapabilityError>;

    async fn on_locked(&self) -> Result<bool, CapabilityError>;

    async fn on_unlocked(&self) -> Result<bool, CapabilityError>;

    /// Remove every restriction. Called whenever the device axis is `CLEARED`.
    async fn on_cleared(&self) -> Result<bool, CapabilityError>;
}

/// Dispatch `step` to the matching callback. [`PolicyStep::Idle`] succeeds
/// without calling anything.
pub async fn apply_step(
    capability: &dyn PolicyCapability,
    step: PolicyStep,
) -> Result<bool, CapabilityError> {
    match step {
        PolicyStep::Unprovisioned => capability.on_unprovisioned().await,
        PolicyStep::ProvisionInProgress => capability.on_provision_in_progress().await,
        PolicyStep::Provisioned => capability.on_provisioned().await,
        PolicyStep::ProvisionPaused => capability.on_provision_paused().await,
        PolicyStep::ProvisionFailed => capability.on_provision_failed().await,
        PolicyStep::Locked => capability.on_locked().await,
        PolicyStep::Unlocked => capability.on_unlocked().await,
        PolicyStep::Cleared => capability.on_cleared().await,
        PolicyStep::Idle => Ok(true),
    }
}
