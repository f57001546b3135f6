//! Tests for config functionality.

use crate::config::{ComputeTier, Config};
use crate::error::BatonError;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.max_concurrent, 12);
    assert_eq!(config.lock_lease_minutes, 15);
    assert_eq!(config.heartbeat_timeout_seconds, 60);
    assert_eq!(config.progress_lock_timeout_seconds, 30);
    assert_eq!(config.warning_threshold_percent, 90);
    assert_eq!(config.health_signal_file, "health.json");
    assert!(config.agent_types.contains_key("module-writer"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    assert_eq!(config.max_concurrent, 12);
    assert_eq!(config.agent_types.len(), Config::default().agent_types.len());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
max_concurrent: 4
lock_lease_minutes: 5
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.max_concurrent, 4);
    assert_eq!(config.lock_lease_minutes, 5);
    assert_eq!(config.heartbeat_timeout_seconds, 60);
}

#[test]
fn test_parse_agent_types_replaces_default_table() {
    let yaml = r#"
agent_types:
  writer:
    category: generation
    compute_tier: heavy
    max_instances: 3
    exclusive_resources:
      - module-index.md
  linter:
    parallelizable: false
    max_instances: 5
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.agent_types.len(), 2);
    let writer = config.agent_type("writer").unwrap();
    assert_eq!(writer.category, "generation");
    assert_eq!(writer.compute_tier, ComputeTier::Heavy);
    assert_eq!(writer.exclusive_resources, vec!["module-index.md"]);
    assert_eq!(writer.effective_max_instances(), 3);

    let linter = config.agent_type("linter").unwrap();
    assert_eq!(linter.category, "general");
    assert_eq!(linter.compute_tier, ComputeTier::Standard);
    assert_eq!(linter.effective_max_instances(), 1);
}

#[test]
fn test_unknown_fields_ignored() {
    let config = Config::from_yaml("max_concurrent: 3\nfuture_option: true\n").unwrap();
    assert_eq!(config.max_concurrent, 3);
}

#[test]
fn test_unknown_agent_type_is_invalid_argument() {
    let config = Config::default();
    let err = config.agent_type("poet").unwrap_err();
    assert!(matches!(err, BatonError::InvalidArgument(_)));
    assert!(err.to_string().contains("poet"));
}

#[test]
fn test_validation_rejects_zero_values() {
    for yaml in [
        "max_concurrent: 0",
        "lock_lease_minutes: 0",
        "heartbeat_timeout_seconds: 0",
        "progress_lock_timeout_seconds: 0",
        "store_lock_timeout_seconds: 0",
    ] {
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains("must be greater than 0"),
            "{} should be rejected",
            yaml
        );
    }
}

#[test]
fn test_validation_rejects_bad_threshold() {
    assert!(Config::from_yaml("warning_threshold_percent: 0").is_err());
    assert!(Config::from_yaml("warning_threshold_percent: 101").is_err());
    assert!(Config::from_yaml("warning_threshold_percent: 100").is_ok());
}

#[test]
fn test_validation_rejects_bad_agent_types() {
    let yaml = r#"
agent_types:
  writer:
    max_instances: 0
"#;
    assert!(Config::from_yaml(yaml).is_err());

    let yaml = r#"
agent_types:
  writer:
    exclusive_resources: ["  "]
"#;
    assert!(Config::from_yaml(yaml).is_err());
}

#[test]
fn test_invalid_yaml_is_usage_error() {
    let err = Config::from_yaml("max_concurrent: [").unwrap_err();
    assert!(matches!(err, BatonError::InvalidArgument(_)));
}

#[test]
fn test_yaml_roundtrip() {
    let config = Config::default();
    let parsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(parsed.max_concurrent, config.max_concurrent);
    assert_eq!(parsed.agent_types, config.agent_types);
}

#[test]
fn test_load_or_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");

    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.max_concurrent, 12);

    std::fs::write(&path, "max_concurrent: 2\n").unwrap();
    assert_eq!(Config::load_or_default(&path).unwrap().max_concurrent, 2);

    std::fs::write(&path, "max_concurrent: nope\n").unwrap();
    assert!(Config::load_or_default(&path).is_err());
}

#[test]
fn test_duration_accessors() {
    let config = Config::default();
    assert_eq!(config.lock_lease().num_minutes(), 15);
    assert_eq!(config.heartbeat_timeout().num_seconds(), 60);
    assert_eq!(config.progress_lock_timeout().as_secs(), 30);
    assert_eq!(config.store_lock_timeout().as_secs(), 10);
}
