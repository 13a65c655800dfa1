//! # Stand-in Collaborators
//!
//! The CLI has no device platform to talk to. These collaborators log what
//! a real platform integration would do and succeed, so the engine's state
//! machines can be driven end to end from a shell.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devlock_core::LockTaskType;
use devlock_engine::{
    DevicePlatform, FinalizationReporter, PlatformError, RecoveryActions, RecoveryAlarm,
    RecoveryError, ReportError,
};
use devlock_policy::{ActivationError, CapabilityError, ModeActivator, PolicyCapability};
use parking_lot::Mutex;

/// Exit status used when the engine asks the process to terminate.
pub const TERMINATE_EXIT_CODE: i32 = 70;

/// Capability that logs each callback and succeeds.
#[derive(Debug)]
pub struct TracingCapability {
    name: String,
}

impl TracingCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn applied(&self, callback: &'static str) -> Result<bool, CapabilityError> {
        tracing::info!(capability = %self.name, callback, "policy callback applied");
        Ok(true)
    }
}

#[async_trait]
impl PolicyCapability for TracingCapability {
    fn name(&self) -> &str {
        &self.name
    }
    async fn on_unprovisioned(&self) -> Result<bool, CapabilityError> {
        self.applied("on_unprovisioned")
    }
    async fn on_provision_in_progress(&self) -> Result<bool, CapabilityError> {
        self.applied("on_provision_in_progress")
    }
    async fn on_provisioned(&self) -> Result<bool, CapabilityError> {
        self.applied("on_provisioned")
    }
    async fn on_provision_paused(&self) -> Result<bool, CapabilityError> {
        self.applied("on_provision_paused")
    }
    async fn on_provision_failed(&self) -> Result<bool, CapabilityError> {
        self.applied("on_provision_failed")
    }
    async fn on_locked(&self) -> Result<bool, CapabilityError> {
        self.applied("on_locked")
    }
    async fn on_unlocked(&self) -> Result<bool, CapabilityError> {
        self.applied("on_unlocked")
    }
    async fn on_cleared(&self) -> Result<bool, CapabilityError> {
        self.applied("on_cleared")
    }
}

/// The capability set a managed device registers.
pub fn default_capabilities() -> Vec<Arc<dyn PolicyCapability>> {
    ["user-restrictions", "app-ops", "role-grants", "keep-alive"]
        .into_iter()
        .map(|name| Arc::new(TracingCapability::new(name)) as Arc<dyn PolicyCapability>)
        .collect()
}

/// Activator that records the mode in memory.
#[derive(Debug, Default)]
pub struct LoggingActivator {
    current: Mutex<Option<LockTaskType>>,
}

#[async_trait]
impl ModeActivator for LoggingActivator {
    async fn enter(&self, mode: LockTaskType) -> Result<(), ActivationError> {
        tracing::info!(%mode, "entering lock task mode");
        *self.current.lock() = Some(mode);
        Ok(())
    }

    async fn current_mode(&self) -> Option<LockTaskType> {
        *self.current.lock()
    }

    async fn exit(&self) -> Result<(), ActivationError> {
        if let Some(mode) = self.current.lock().take() {
            tracing::info!(%mode, "leaving lock task mode");
        }
        Ok(())
    }
}

/// Platform whose lifecycle answers come from command-line flags.
#[derive(Debug, Clone, Copy)]
pub struct CliPlatform {
    pub setup_complete: bool,
    pub user_unlocked: bool,
}

#[async_trait]
impl DevicePlatform for CliPlatform {
    async fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    async fn is_user_unlocked(&self) -> bool {
        self.user_unlocked
    }

    async fn enable_setup_component(&self) -> Result<(), PlatformError> {
        tracing::info!("setup component enabled");
        Ok(())
    }

    async fn notify_provision_succeeded(&self) -> Result<(), PlatformError> {
        tracing::info!("provisioning succeeded");
        Ok(())
    }
}

/// Recovery actions for an interactive session. Alarms are printed so the
/// operator can fire them with `devlock alarm`.
#[derive(Debug, Default)]
pub struct LoggingRecovery;

#[async_trait]
impl RecoveryActions for LoggingRecovery {
    async fn schedule_mandatory_reset(&self, reason: &str) -> Result<(), RecoveryError> {
        tracing::warn!(reason, "mandatory device reset scheduled");
        Ok(())
    }

    async fn report_critical_failure(&self, reason: &str) -> Result<(), RecoveryError> {
        tracing::warn!(reason, "critical failure reported");
        Ok(())
    }

    async fn schedule_alarm(
        &self,
        alarm: RecoveryAlarm,
        delay: Duration,
    ) -> Result<(), RecoveryError> {
        tracing::info!(
            %alarm,
            delay_secs = delay.as_secs(),
            "recovery alarm armed; fire it with `devlock alarm`"
        );
        Ok(())
    }

    async fn terminate(&self, reason: &str) {
        tracing::error!(reason, "engine requested termination");
        std::process::exit(TERMINATE_EXIT_CODE);
    }
}

#[derive(Debug, Default)]
pub struct LoggingReporter;

#[async_trait]
impl FinalizationReporter for LoggingReporter {
    async fn report_finalized(&self) -> Result<(), ReportError> {
        tracing::info!("finalization reported to check-in service");
        Ok(())
    }
}
