//! # devlock-core: Foundational Types for the Device Lock Engine
//!
//! Defines the vocabulary shared by every other crate in the workspace:
//! the two persisted state axes of a managed device, the events that move
//! the provisioning axis, the derived lock task mode, the error taxonomy,
//! and the engine configuration.
//!
//! ## Key Design Principles
//!
//! 1. **One enum per axis.** `ProvisionState` and `DeviceState` are
//!    independent. Nothing in this crate decides how they combine; that
//!    lives in `devlock-state`.
//!
//! 2. **Stable wire names.** Every enum serializes as `SCREAMING_SNAKE_CASE`
//!    and round-trips through `Display`/`FromStr`, so persisted values and
//!    log lines use the same spelling.
//!
//! 3. **UTC-only timestamps** truncated to seconds.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `devlock-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod domain;
pub mod error;
pub mod temporal;

pub use config::{ActivationConfig, DeviceConfig, EngineConfig, RecoveryConfig, StoreConfig};
pub use domain::{
    DeviceState, FinalizationEvent, FinalizationState, LockTaskType, ProvisionEvent,
    ProvisionState,
};
pub use error::{ConfigError, ParseEnumError, StateError, StorageError};
pub use temporal::Timestamp;
