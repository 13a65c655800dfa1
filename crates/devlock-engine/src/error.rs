//! # Engine Error Type
//!
//! Umbrella over every failure a controller operation can surface. Domain
//! errors convert with `?`; the engine adds the fatal critical-path error.

use devlock_core::{ConfigError, StateError, StorageError};
use devlock_policy::{ActivationError, PolicyError};
use thiserror::Error;

use crate::finalization::ReportError;
use crate::guard::GuardError;
use crate::platform::PlatformError;
use crate::recovery::RecoveryError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A state machine rejected the request. Never retried automatically.
    #[error(transparent)]
    State(#[from] StateError),

    /// Persistence failed. Possibly transient.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// One or more capabilities failed for a state pair.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// The critical-failure path itself failed. Fatal to the process.
    #[error("critical enforcement failed: {reason}")]
    CriticalEnforcement { reason: String },

    #[error(transparent)]
    Guard(#[from] GuardError),
}
