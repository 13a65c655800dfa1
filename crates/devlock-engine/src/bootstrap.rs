//! # Engine Bootstrap
//!
//! Composition root. Builds every controller from one set of collaborators
//! and wires them together. There is no ambient global state; callers hold
//! the returned [`DeviceLockEngine`].
//!
//! ## Bootstrap Sequence
//!
//! 1. **Validate config**: reject values the controllers cannot run with.
//! 2. **Shared cursor**: one lazily loaded provision cursor for the policy
//!    and provision controllers.
//! 3. **Policy**: fan-out over the registered capabilities plus the
//!    activation scheduler.
//! 4. **Provision, finalization, device**: in dependency order.
//!
//! Must run inside a Tokio runtime, since every controller starts a guard
//! worker.

use std::sync::Arc;

use devlock_core::{DeviceState, EngineConfig, LockTaskType, ProvisionState};
use devlock_policy::{
    ActivationReport, ActivationScheduler, ModeActivator, PolicyCapability, PolicyFanout,
};
use devlock_state::resolve_lock_task_type;
use serde::Serialize;

use crate::device::DeviceStateController;
use crate::error::EngineError;
use crate::finalization::{FinalizationController, FinalizationReporter};
use crate::platform::DevicePlatform;
use crate::policy::DevicePolicyController;
use crate::provision::{ProvisionCursor, ProvisionStateController};
use crate::recovery::{RecoveryActions, RecoveryAlarm};
use crate::store::{PersistedState, StateStore};

/// Everything the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub capabilities: Vec<Arc<dyn PolicyCapability>>,
    pub activator: Arc<dyn ModeActivator>,
    pub platform: Arc<dyn DevicePlatform>,
    pub recovery: Arc<dyn RecoveryActions>,
    pub reporter: Arc<dyn FinalizationReporter>,
}

/// Point-in-time view for operators.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Cursor value enforcement acts on. May trail the persisted value after
    /// a rolled-back transition.
    pub provision_state: ProvisionState,
    pub device_state: DeviceState,
    pub pseudo_device_state: DeviceState,
    /// Mode the current pair resolves to.
    pub expected_mode: LockTaskType,
    pub persisted: PersistedState,
    pub activation: Option<ActivationReport>,
}

#[derive(Clone)]
pub struct DeviceLockEngine {
    config: EngineConfig,
    store: Arc<dyn StateStore>,
    provision: ProvisionStateController,
    device: DeviceStateController,
    policy: DevicePolicyController,
    finalization: FinalizationController,
}

impl std::fmt::Debug for DeviceLockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLockEngine")
            .field("config", &self.config)
            .field("provision", &self.provision)
            .field("device", &self.device)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Build the engine.
pub fn bootstrap(
    config: EngineConfig,
    collaborators: Collaborators,
) -> Result<DeviceLockEngine, EngineError> {
    config.validate()?;
    let Collaborators {
        store,
        capabilities,
        activator,
        platform,
        recovery,
        reporter,
    } = collaborators;

    let cursor = ProvisionCursor::new(Arc::clone(&store));
    let fanout = PolicyFanout::new(capabilities);
    let capability_count = fanout.len();
    let policy = DevicePolicyController::new(
        cursor.clone(),
        Arc::clone(&store),
        fanout,
        ActivationScheduler::new(activator, config.activation.clone()),
        Arc::clone(&platform),
        Arc::clone(&recovery),
        config.recovery.clone(),
    );
    let provision = ProvisionStateController::new(
        cursor,
        Arc::clone(&store),
        platform,
        Arc::clone(&recovery),
        policy.clone(),
        config.recovery.clone(),
    );
    let finalization = FinalizationController::new(
        Arc::clone(&store),
        reporter,
        recovery,
        config.recovery.clone(),
    );
    let device = DeviceStateController::new(
        provision.clone(),
        policy.clone(),
        finalization.clone(),
        Arc::clone(&store),
        config.device.clone(),
    );

    tracing::info!(
        capabilities = capability_count,
        max_attempts = config.activation.max_attempts,
        allow_clear_when_unprovisioned = config.device.allow_clear_when_unprovisioned,
        "device lock engine ready"
    );

    Ok(DeviceLockEngine {
        config,
        store,
        provision,
        device,
        policy,
        finalization,
    })
}

impl DeviceLockEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn provision(&self) -> &ProvisionStateController {
        &self.provision
    }

    pub fn device(&self) -> &DeviceStateController {
        &self.device
    }

    pub fn policy(&self) -> &DevicePolicyController {
        &self.policy
    }

    pub fn finalization(&self) -> &FinalizationController {
        &self.finalization
    }

    /// The check-in service says the device may provision. Records the flag
    /// and raises `READY` if setup allows.
    pub async fn on_provisioning_ready(&self) -> Result<(), EngineError> {
        self.store.set_provisioning_ready(true).await?;
        self.provision.notify_provisioning_ready().await
    }

    /// Re-drive the operation `alarm` was armed for.
    pub async fn on_recovery_alarm(&self, alarm: RecoveryAlarm) -> Result<(), EngineError> {
        tracing::info!(%alarm, "recovery alarm fired");
        match alarm {
            RecoveryAlarm::SetupCompletionTimeout => {
                self.provision.on_setup_completion_timeout().await
            }
            RecoveryAlarm::CriticalEnforcementRetry => self.provision.reconcile().await,
            RecoveryAlarm::FinalizationReportRetry => {
                self.finalization.retry_report().await.map(|_| ())
            }
        }
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let persisted = self.store.load().await?;
        let provision_state = self.provision.get_state().await?;
        Ok(EngineStatus {
            provision_state,
            device_state: persisted.device_state,
            pseudo_device_state: self.device.pseudo_state(),
            expected_mode: resolve_lock_task_type(provision_state, persisted.device_state),
            activation: self.policy.activation().latest(),
            persisted,
        })
    }
}
