//! # devlock-state: Pure State Machines
//!
//! Every decision the engine makes about *what* should happen lives here as
//! a pure, synchronous function over `devlock-core` enums. The async
//! controllers in `devlock-engine` decide *when* and in what order; they
//! never re-derive these tables.
//!
//! ## State Machines
//!
//! - **Provision** (`provision.rs`): the seven legal `(state, event)` pairs.
//!   Everything else is `StateError::IllegalTransition`.
//!
//! - **Policy step** (`resolution.rs`): which capability callback a state
//!   pair maps to. `CLEARED` overrides the provision axis;
//!   `PROVISION_SUCCEEDED` hands control to the device axis.
//!
//! - **Lock task** (`lock_task.rs`): the exclusive operating mode for a
//!   state pair.
//!
//! - **Device request** (`device.rs`): whether a lock/unlock/clear request
//!   touches only the in-memory pseudo state, the persisted state, or is
//!   rejected.
//!
//! - **Finalization** (`finalization.rs`): cleared-then-reported lifecycle.

pub mod device;
pub mod finalization;
pub mod lock_task;
pub mod provision;
pub mod resolution;

pub use device::{plan_device_request, DevicePlan, DeviceRequest};
pub use finalization::next_finalization_state;
pub use lock_task::resolve_lock_task_type;
pub use provision::{is_legal, next_state_for_event};
pub use resolution::{resolve_policy_step, PolicyStep};
