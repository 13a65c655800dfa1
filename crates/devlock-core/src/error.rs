//! # Error Types: Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - State machine errors carry the current state and the rejected event.
//!   They are never retried automatically.
//! - Storage errors are treated as possibly transient; callers holding a
//!   recovery alarm re-attempt the failed operation.

use thiserror::Error;

use crate::domain::{FinalizationEvent, FinalizationState, ProvisionEvent, ProvisionState};

/// A state machine rejected a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The event is not legal from the current provision state.
    #[error("illegal provision transition: event {event} is not valid from {state}")]
    IllegalTransition {
        /// State the machine was in.
        state: ProvisionState,
        /// Rejected event.
        event: ProvisionEvent,
    },

    /// A lock, unlock, or clear request arrived while enrollment is underway.
    #[error("device is not yet provisioned (provision state {state})")]
    NotYetProvisioned {
        /// State the machine was in.
        state: ProvisionState,
    },

    /// A lock, unlock, or clear request arrived after the device was cleared.
    #[error("device has been cleared")]
    DeviceCleared,

    /// The event is not legal from the current finalization state.
    #[error("illegal finalization transition: event {event} is not valid from {state}")]
    IllegalFinalization {
        /// State the machine was in.
        state: FinalizationState,
        /// Rejected event.
        event: FinalizationEvent,
    },
}

/// Persistence collaborator failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying IO failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// The store is temporarily unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Config document is not valid YAML for [`crate::EngineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field, dotted path.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A wire name did not match any variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Human-readable name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}
