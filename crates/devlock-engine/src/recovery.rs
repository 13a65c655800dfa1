//! # Recovery Collaborator
//!
//! Process-level escalation for failures the engine cannot resolve inline:
//! delayed alarms that re-drive an operation, the mandatory reset fallback,
//! upstream failure reports, and termination.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An alarm the engine asks to be woken by after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryAlarm {
    /// Out-of-box setup took too long; provisioning proceeds without it.
    SetupCompletionTimeout,
    /// The critical-failure path failed; re-drive enforcement.
    CriticalEnforcementRetry,
    /// The finalization report was not acknowledged.
    FinalizationReportRetry,
}

impl RecoveryAlarm {
    pub const ALL: &'static [RecoveryAlarm] = &[
        Self::SetupCompletionTimeout,
        Self::CriticalEnforcementRetry,
        Self::FinalizationReportRetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetupCompletionTimeout => "SETUP_COMPLETION_TIMEOUT",
            Self::CriticalEnforcementRetry => "CRITICAL_ENFORCEMENT_RETRY",
            Self::FinalizationReportRetry => "FINALIZATION_REPORT_RETRY",
        }
    }
}

impl std::fmt::Display for RecoveryAlarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("recovery action failed: {message}")]
pub struct RecoveryError {
    pub message: String,
}

impl RecoveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait RecoveryActions: Send + Sync {
    /// Arrange for the device to be reset if it cannot leave the critical
    /// error mode on its own.
    async fn schedule_mandatory_reset(&self, reason: &str) -> Result<(), RecoveryError>;

    /// Report the failure to the check-in service.
    async fn report_critical_failure(&self, reason: &str) -> Result<(), RecoveryError>;

    /// Fire `alarm` back into the engine after `delay`.
    async fn schedule_alarm(&self, alarm: RecoveryAlarm, delay: Duration)
        -> Result<(), RecoveryError>;

    /// Terminate the process. Implementations normally do not return.
    async fn terminate(&self, reason: &str);
}
