//! Alerts configuration persistence.

use fae_alerts::AlertsConfig;

#[test]
fn config_roundtrips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("alerts.toml");

    let mut config = AlertsConfig::default();
    config.scheduler.past_due_limit_secs = 600;
    config.storage.database_path = dir.path().join("custom.db");
    config.save_to_file(&path).unwrap();

    let loaded = AlertsConfig::from_file(&path).unwrap();
    assert_eq!(loaded.scheduler, config.scheduler);
    assert_eq!(loaded.storage.database_path, config.storage.database_path);
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = AlertsConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(loaded.scheduler.max_rendering_secs, 3600);
    assert_eq!(loaded.storage.open_retry_attempts, 3);
}

#[test]
fn partial_config_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.toml");
    std::fs::write(&path, "[scheduler]\npast_due_limit_secs = 60\n").unwrap();

    let loaded = AlertsConfig::from_file(&path).unwrap();
    assert_eq!(loaded.scheduler.past_due_limit_secs, 60);
    assert_eq!(loaded.scheduler.max_rendering_secs, 3600);
}
