//! Errors raised while enforcing policy or activating a lock task mode.

use devlock_core::{DeviceState, ProvisionState};
use devlock_state::PolicyStep;
use thiserror::Error;

/// A capability rejected a callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// How a single capability failed during fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The callback resolved to `false`.
    ReturnedFalse,
    /// The callback returned an error.
    Rejected(String),
    /// The callback task panicked or was cancelled.
    Aborted(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReturnedFalse => f.write_str("returned false"),
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::Aborted(msg) => write!(f, "aborted: {msg}"),
        }
    }
}

/// One capability's failure within an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFailure {
    /// `PolicyCapability::name()` of the failing capability.
    pub capability: String,
    pub kind: FailureKind,
}

impl std::fmt::Display for CapabilityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.capability, self.kind)
    }
}

/// Policy enforcement failed for a state pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// One or more capabilities failed.
    #[error(
        "policy enforcement failed for ({provision_state}, {device_state}) at {step}: {}",
        join_failures(.failures)
    )]
    EnforcementAggregate {
        provision_state: ProvisionState,
        device_state: DeviceState,
        step: PolicyStep,
        failures: Vec<CapabilityFailure>,
    },
}

fn join_failures(failures: &[CapabilityFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The mode activator could not enter or leave a mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock task activation failed: {message}")]
pub struct ActivationError {
    pub message: String,
}

impl ActivationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
