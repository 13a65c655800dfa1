//! # devlock-engine: Device Lock Engine
//!
//! The async half of the engine: controllers that decide *when* the pure
//! state machines in `devlock-state` run, and in what order.
//!
//! ## Architecture
//!
//! - **Guard** (`guard.rs`): single-worker job queue giving at-most-one-in-flight,
//!   submission-ordered mutations.
//! - **Provision** (`provision.rs`): the provisioning FSM with
//!   enforce-or-roll-back transitions, run on the policy controller's guard.
//! - **Policy** (`policy.rs`): fan-out enforcement, the cached enforced
//!   mode, and the critical-failure escape path.
//! - **Device** (`device.rs`): lock/unlock/clear gated by provisioning.
//! - **Finalization** (`finalization.rs`): cleared-then-reported lifecycle.
//! - **Collaborators** (`store.rs`, `platform.rs`, `recovery.rs`): the
//!   traits the engine is injected with, plus in-memory and JSON file stores.
//! - **Bootstrap** (`bootstrap.rs`): the composition root.
//!
//! ## Ownership
//!
//! ```text
//! DeviceStateController ──▶ ProvisionStateController ──▶ DevicePolicyController
//! DeviceStateController ──▶ DevicePolicyController
//! DeviceStateController ──▶ FinalizationController
//! ```
//!
//! The provision and policy controllers share one `ProvisionCursor`. No
//! controller holds a handle back to its owner.

pub mod bootstrap;
pub mod device;
pub mod error;
pub mod finalization;
pub mod guard;
pub mod platform;
pub mod policy;
pub mod provision;
pub mod recovery;
pub mod store;

pub use bootstrap::{bootstrap, Collaborators, DeviceLockEngine, EngineStatus};
pub use device::DeviceStateController;
pub use error::EngineError;
pub use finalization::{FinalizationController, FinalizationReporter, ReportError};
pub use guard::{GuardError, SequentialGuard};
pub use platform::{DevicePlatform, PlatformError};
pub use policy::DevicePolicyController;
pub use provision::{ProvisionCursor, ProvisionStateController};
pub use recovery::{RecoveryActions, RecoveryAlarm, RecoveryError};
pub use store::{InMemoryStore, JsonFileStore, PersistedState, StateChange, StateStore};
