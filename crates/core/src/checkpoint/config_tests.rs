// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn defaults_match_documented_values() {
    let config = CheckpointConfig::default();
    assert_eq!(config.period(), Duration::from_secs(5));
    assert_eq!(config.max_items(), 5000);
    assert_eq!(config.max_checkpoints(), 2);
    assert!(config.item_num_based_new_checkpoint());
    assert!(!config.keep_closed_checkpoints());
}

#[parameterized(
    period_zero = { "chk_period", "0" },
    period_too_long = { "chk_period", "3601" },
    items_zero = { "chk_max_items", "0" },
    items_too_many = { "chk_max_items", "50001" },
    checkpoints_one = { "max_checkpoints", "1" },
    checkpoints_six = { "max_checkpoints", "6" },
)]
fn out_of_range_settings_are_rejected(key: &str, value: &str) {
    let mut config = CheckpointConfig::default();
    let err = config.apply_setting(key, value).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { .. }), "{err}");
    assert_eq!(config, CheckpointConfig::default());
}

#[parameterized(
    period_secs = { "chk_period", "60" },
    period_humantime = { "chk_period", "2m" },
    items = { "chk_max_items", "50000" },
    checkpoints = { "max_checkpoints", "5" },
    item_based = { "item_num_based_new_chk", "false" },
    keep_closed = { "keep_closed_chks", "true" },
)]
fn in_range_settings_are_applied(key: &str, value: &str) {
    let mut config = CheckpointConfig::default();
    config.apply_setting(key, value).unwrap();
    assert_ne!(config, CheckpointConfig::default());
}

#[test]
fn unknown_setting_is_an_error() {
    let mut config = CheckpointConfig::default();
    assert!(matches!(
        config.apply_setting("chk_bogus", "1"),
        Err(ConfigError::UnknownSetting(_))
    ));
}

#[test]
fn unparseable_value_is_an_error() {
    let mut config = CheckpointConfig::default();
    assert!(matches!(
        config.apply_setting("chk_max_items", "lots"),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn toml_document_is_validated() {
    let config = CheckpointConfig::from_toml(
        r#"
period = "30s"
max_items = 100
max_checkpoints = 3
keep_closed_checkpoints = true
"#,
    )
    .unwrap();
    assert_eq!(config.period(), Duration::from_secs(30));
    assert_eq!(config.max_items(), 100);
    assert_eq!(config.max_checkpoints(), 3);
    assert!(config.keep_closed_checkpoints());
    assert!(config.item_num_based_new_checkpoint());
}

#[test]
fn toml_document_with_bad_field_is_rejected_whole() {
    let err = CheckpointConfig::from_toml("max_items = 10\nmax_checkpoints = 9\n").unwrap_err();
    assert!(err.to_string().contains("max_checkpoints"), "{err}");
}

#[test]
fn toml_document_with_unknown_field_is_rejected() {
    assert!(CheckpointConfig::from_toml("max_itemz = 10\n").is_err());
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoint.toml");
    std::fs::write(&path, "max_items = 42\n").unwrap();
    assert_eq!(CheckpointConfig::load(&path).unwrap().max_items(), 42);
}

#[test]
fn handle_keeps_previous_value_on_rejection() {
    let handle = ConfigHandle::default();
    handle.apply_setting("chk_max_items", "10").unwrap();
    assert!(handle.apply_setting("chk_max_items", "0").is_err());
    assert_eq!(handle.snapshot().max_items(), 10);
}

#[test]
fn handle_clones_observe_updates() {
    let handle = ConfigHandle::default();
    let observer = handle.clone();
    handle.apply_setting("max_checkpoints", "4").unwrap();
    assert_eq!(observer.snapshot().max_checkpoints(), 4);
}

#[test]
fn serializes_period_as_humantime() {
    let json = serde_json::to_value(CheckpointConfig::default()).unwrap();
    assert_eq!(json["period"], "5s");
}
