//! # Config File Loading
//!
//! Exercises `EngineConfig::load` against real files on disk.

use std::io::Write;

use devlock_core::{ConfigError, EngineConfig};

#[test]
fn test_load_full_document() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
activation:
  max_attempts: 3
  retry_delay_ms: 10
recovery:
  critical_retry_delay_secs: 5
  setup_completion_timeout_secs: 120
  finalization_retry_delay_secs: 30
device:
  allow_clear_when_unprovisioned: true
store:
  path: /tmp/devlock-state.json
"#
    )
    .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.activation.max_attempts, 3);
    assert_eq!(config.activation.retry_delay_ms, 10);
    assert_eq!(config.recovery.setup_completion_timeout_secs, 120);
    assert!(config.device.allow_clear_when_unprovisioned);
    assert_eq!(
        config.store.path.as_deref(),
        Some(std::path::Path::new("/tmp/devlock-state.json"))
    );
}

#[test]
fn test_load_missing_file_reports_path() {
    let err = EngineConfig::load("/definitely/not/here.yaml").unwrap_err();
    match err {
        ConfigError::Read { path, .. } => assert!(path.contains("not/here.yaml")),
        other => panic!("Expected Read, got: {other:?}"),
    }
}

#[test]
fn test_load_malformed_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "activation: [not, a, map]").unwrap();
    assert!(matches!(
        EngineConfig::load(file.path()),
        Err(ConfigError::Parse(_))
    ));
}
