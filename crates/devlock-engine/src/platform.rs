//! Device platform collaborator: lifecycle queries and state-entry side effects.

use async_trait::async_trait;
use thiserror::Error;

/// A platform call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("platform call {operation} failed: {message}")]
pub struct PlatformError {
    pub operation: &'static str,
    pub message: String,
}

impl PlatformError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DevicePlatform: Send + Sync {
    /// Whether out-of-box setup has finished.
    async fn is_setup_complete(&self) -> bool;

    /// Whether the active user session is unlocked. Lock task modes are
    /// only entered for an unlocked user.
    async fn is_user_unlocked(&self) -> bool;

    /// Wake the dormant setup component. Called on entry to
    /// `PROVISION_IN_PROGRESS`.
    async fn enable_setup_component(&self) -> Result<(), PlatformError>;

    /// Signal that provisioning completed. Called on `SUCCESS`.
    async fn notify_provision_succeeded(&self) -> Result<(), PlatformError>;
}
