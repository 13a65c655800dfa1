//! # Engine Configuration
//!
//! YAML-backed settings for the engine. Every field has a default, so an
//! empty document is a valid configuration.
//!
//! ```yaml
//! activation:
//!   max_attempts: 5
//!   retry_delay_ms: 500
//! recovery:
//!   critical_retry_delay_secs: 60
//!   setup_completion_timeout_secs: 3600
//!   finalization_retry_delay_secs: 300
//! device:
//!   allow_clear_when_unprovisioned: false
//! store:
//!   path: /var/lib/devlock/state.json
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Lock task mode activation retry budget.
    pub activation: ActivationConfig,
    /// Recovery alarm delays.
    pub recovery: RecoveryConfig,
    /// Device state request behavior.
    pub device: DeviceConfig,
    /// Persistence location.
    pub store: StoreConfig,
}

/// Retry budget for entering a lock task mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivationConfig {
    /// Attempts before activation is reported as failed. At least 1.
    pub max_attempts: u32,
    /// Linear backoff base; attempt `n` waits `n * retry_delay_ms` before retrying.
    pub retry_delay_ms: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 500,
        }
    }
}

impl ActivationConfig {
    /// Backoff base as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Delays for recovery alarms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Delay before re-driving enforcement after the critical path failed.
    pub critical_retry_delay_secs: u64,
    /// How long out-of-box setup may take before provisioning proceeds anyway.
    pub setup_completion_timeout_secs: u64,
    /// Delay before re-sending an unacknowledged finalization report.
    pub finalization_retry_delay_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            critical_retry_delay_secs: 60,
            setup_completion_timeout_secs: 3600,
            finalization_retry_delay_secs: 300,
        }
    }
}

impl RecoveryConfig {
    pub fn critical_retry_delay(&self) -> Duration {
        Duration::from_secs(self.critical_retry_delay_secs)
    }

    pub fn setup_completion_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_completion_timeout_secs)
    }

    pub fn finalization_retry_delay(&self) -> Duration {
        Duration::from_secs(self.finalization_retry_delay_secs)
    }
}

/// Device state request behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// When set, `clear` is accepted again while unprovisioned even if the
    /// device was already (pseudo-)cleared. Lock and unlock still fail.
    pub allow_clear_when_unprovisioned: bool,
}

/// Persistence location for file-backed stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the JSON state document. `None` means in-memory only.
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document as a struct; treat it as defaults.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activation.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "activation.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
