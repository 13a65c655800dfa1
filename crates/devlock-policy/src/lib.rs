//! # devlock-policy: Policy Enforcement
//!
//! Turns a resolved state pair into effects on the device.
//!
//! ## Architecture
//!
//! - **Capability** (`capability.rs`): the contract every policy capability
//!   satisfies: one async callback per policy step, returning `Ok(true)` on
//!   success, `Ok(false)` for a tolerated failure, `Err` for a rejection.
//!
//! - **Fan-out** (`fanout.rs`): runs every capability concurrently for one
//!   step and aggregates with logical AND. Any `false`, rejection, or panic
//!   fails the whole step with `PolicyError::EnforcementAggregate`.
//!
//! - **Scheduler** (`scheduler.rs`): a single named unit of work that enters
//!   a lock task mode, verifies it took effect, and retries within a fixed
//!   budget.
//!
//! ## Crate Policy
//!
//! - Depends on `devlock-core` and `devlock-state` internally.
//! - Knows nothing about persistence or the provision/device controllers.

pub mod capability;
pub mod error;
pub mod fanout;
pub mod scheduler;

pub use capability::{apply_step, PolicyCapability};
pub use error::{ActivationError, CapabilityError, CapabilityFailure, FailureKind, PolicyError};
pub use fanout::PolicyFanout;
pub use scheduler::{ActivationReport, ActivationScheduler, ActivationStatus, ModeActivator};
