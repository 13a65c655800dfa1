//! # State Store
//!
//! The persistence collaborator. The engine needs atomic get/set per key and
//! nothing more; no operation spans two keys.
//!
//! ## Implementations
//!
//! - [`InMemoryStore`]: a `parking_lot::RwLock` around the document. The
//!   lock is never held across an `.await`.
//! - [`JsonFileStore`]: the whole document as one JSON file. Every set
//!   writes a sibling temp file and renames it over the original, so a
//!   crash leaves either the old or the new document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use devlock_core::{DeviceState, FinalizationState, ProvisionState, StorageError, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Every persisted key. Absent keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub provision_state: ProvisionState,
    pub device_state: DeviceState,
    pub finalization_state: FinalizationState,
    pub provisioning_start_time: Option<Timestamp>,
    pub setup_wizard_timed_out: bool,
    pub provisioning_ready: bool,
}

/// A single-key write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Provision(ProvisionState),
    Device(DeviceState),
    Finalization(FinalizationState),
    ProvisioningStartTime(Timestamp),
    SetupWizardTimedOut(bool),
    ProvisioningReady(bool),
}

impl StateChange {
    pub fn apply(self, doc: &mut PersistedState) {
        match self {
            Self::Provision(s) => doc.provision_state = s,
            Self::Device(s) => doc.device_state = s,
            Self::Finalization(s) => doc.finalization_state = s,
            Self::ProvisioningStartTime(t) => doc.provisioning_start_time = Some(t),
            Self::SetupWizardTimedOut(v) => doc.setup_wizard_timed_out = v,
            Self::ProvisioningReady(v) => doc.provisioning_ready = v,
        }
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the whole document.
    async fn load(&self) -> Result<PersistedState, StorageError>;

    /// Apply one single-key write.
    async fn write(&self, change: StateChange) -> Result<(), StorageError>;

    async fn provision_state(&self) -> Result<ProvisionState, StorageError> {
        Ok(self.load().await?.provision_state)
    }

    async fn set_provision_state(&self, state: ProvisionState) -> Result<(), StorageError> {
        self.write(StateChange::Provision(state)).await
    }

    async fn device_state(&self) -> Result<DeviceState, StorageError> {
        Ok(self.load().await?.device_state)
    }

    async fn set_device_state(&self, state: DeviceState) -> Result<(), StorageError> {
        self.write(StateChange::Device(state)).await
    }

    async fn finalization_state(&self) -> Result<FinalizationState, StorageError> {
        Ok(self.load().await?.finalization_state)
    }

    async fn set_finalization_state(&self, state: FinalizationState) -> Result<(), StorageError> {
        self.write(StateChange::Finalization(state)).await
    }

    async fn provisioning_start_time(&self) -> Result<Option<Timestamp>, StorageError> {
        Ok(self.load().await?.provisioning_start_time)
    }

    async fn set_provisioning_start_time(&self, at: Timestamp) -> Result<(), StorageError> {
        self.write(StateChange::ProvisioningStartTime(at)).await
    }

    async fn setup_wizard_timed_out(&self) -> Result<bool, StorageError> {
        Ok(self.load().await?.setup_wizard_timed_out)
    }

    async fn set_setup_wizard_timed_out(&self, value: bool) -> Result<(), StorageError> {
        self.write(StateChange::SetupWizardTimedOut(value)).await
    }

    async fn provisioning_ready(&self) -> Result<bool, StorageError> {
        Ok(self.load().await?.provisioning_ready)
    }

    async fn set_provisioning_ready(&self, value: bool) -> Result<(), StorageError> {
        self.write(StateChange::ProvisioningReady(value)).await
    }
}

// ─── In-memory ───────────────────────────────────────────────────────

/// Process-local store. Cloning shares the document.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    doc: Arc<RwLock<PersistedState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(doc: PersistedState) -> Self {
        Self {
            doc: Arc::new(RwLock::new(doc)),
        }
    }

    /// Copy of the current document without going through the trait.
    pub fn snapshot(&self) -> PersistedState {
        self.doc.read().clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn load(&self) -> Result<PersistedState, StorageError> {
        Ok(self.snapshot())
    }

    async fn write(&self, change: StateChange) -> Result<(), StorageError> {
        change.apply(&mut self.doc.write());
        Ok(())
    }
}

// ─── JSON file ───────────────────────────────────────────────────────

/// File-backed store. The document is cached after the first read.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<PersistedState>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<PersistedState, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &PersistedState) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState, StorageError> {
        let mut cache = self.cache.lock().await;
        if let Some(doc) = cache.as_ref() {
            return Ok(doc.clone());
        }
        let doc = self.read_document().await?;
        *cache = Some(doc.clone());
        Ok(doc)
    }

    async fn write(&self, change: StateChange) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut doc = match cache.as_ref() {
            Some(doc) => doc.clone(),
            None => self.read_document().await?,
        };
        change.apply(&mut doc);
        self.write_document(&doc).await?;
        tracing::debug!(path = %self.path.display(), ?change, "state persisted");
        *cache = Some(doc);
        Ok(())
    }
}
