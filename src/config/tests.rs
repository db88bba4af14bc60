use std::fs;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use super::settings::Settings;
use crate::broker::pool::ExecutionPool;
use super::{load_config, load_config_from};

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 50051);
    assert_eq!(settings.server.log_level, "info");
    assert_eq!(settings.broker.pool_size, ExecutionPool::DEFAULT_SIZE);
    assert_eq!(
        settings.broker.disconnect_check_interval(),
        Duration::from_secs(5)
    );
    assert_eq!(settings.address(), "127.0.0.1:50051");
}

#[test]
fn zero_interval_is_clamped() {
    let mut settings = Settings::default();
    settings.broker.disconnect_check_interval_ms = 0;
    assert_eq!(
        settings.broker.disconnect_check_interval(),
        Duration::from_millis(1)
    );
}

#[test]
#[serial]
fn load_config_without_sources_yields_defaults() {
    temp_env::with_vars_unset(
        [
            "TOPIC_BROKER_SERVER__HOST",
            "TOPIC_BROKER_SERVER__PORT",
            "TOPIC_BROKER_SERVER__LOG_LEVEL",
            "TOPIC_BROKER_BROKER__POOL_SIZE",
            "TOPIC_BROKER_BROKER__DISCONNECT_CHECK_INTERVAL_MS",
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg, Settings::default());
        },
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("broker.toml");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        pool_size = 2
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().expect("utf-8 path")).expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.pool_size, 2);
    // not in the file
    assert_eq!(cfg.server.log_level, "info");
    assert_eq!(cfg.broker.disconnect_check_interval_ms, 5000);
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent.toml");
    assert!(load_config_from(path.to_str().expect("utf-8 path")).is_err());
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("broker.toml");
    fs::write(&path, "[broker]\npool_size = 2\n").expect("write config file");

    temp_env::with_vars(
        [
            ("TOPIC_BROKER_BROKER__POOL_SIZE", Some("8")),
            ("TOPIC_BROKER_BROKER__DISCONNECT_CHECK_INTERVAL_MS", Some("250")),
            ("TOPIC_BROKER_SERVER__LOG_LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config_from(path.to_str().expect("utf-8 path"))
                .expect("load_config failed");
            assert_eq!(cfg.broker.pool_size, 8);
            assert_eq!(cfg.broker.disconnect_check_interval_ms, 250);
            assert_eq!(cfg.server.log_level, "debug");
            assert_eq!(cfg.server.port, 50051);
        },
    );
}
