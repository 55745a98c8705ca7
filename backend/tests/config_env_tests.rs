//! Tests for config loading - file discovery and environment overrides.

mod support;

use std::path::PathBuf;

use parking_stats::config::{AppConfig, CONFIG_ENV, DATA_DIR_ENV};
use tempfile::TempDir;

const ALL_VARS: [&str; 4] = [CONFIG_ENV, DATA_DIR_ENV, "HOST", "PORT"];

fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
    ALL_VARS.iter().map(|k| (*k, None)).collect()
}

#[test]
fn test_load_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("service.toml");
    std::fs::write(&path, "[buckets]\noccupancy_minutes = 10\n").unwrap();

    support::with_scoped_env(&cleared(), || {
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.buckets.occupancy_minutes, 10);
        assert_eq!(config.buckets.request_minutes, 60);
    });
}

#[test]
fn test_load_from_config_env() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from-env.toml");
    std::fs::write(&path, "[server]\nport = 9100\n").unwrap();
    let path_str = path.to_str().unwrap().to_string();

    let env = [
        (CONFIG_ENV, Some(path_str.as_str())),
        (DATA_DIR_ENV, None),
        ("HOST", None),
        ("PORT", None),
    ];
    support::with_scoped_env(&env, || {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.port, 9100);
    });
}

#[test]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("service.toml");
    std::fs::write(
        &path,
        "[server]\nhost = \"10.0.0.1\"\nport = 7000\n\n[storage]\ndata_dir = \"/srv/a\"\n",
    )
    .unwrap();

    support::with_scoped_env(
        &[
            (CONFIG_ENV, None),
            ("HOST", Some("127.0.0.1")),
            ("PORT", Some("9999")),
            (DATA_DIR_ENV, Some("/srv/b")),
        ],
        || {
            let config = AppConfig::load(Some(&path)).unwrap();
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.server.port, 9999);
            assert_eq!(config.occupancy_path(), PathBuf::from("/srv/b/occupancy.json"));
        },
    );
}

#[test]
fn test_unparsable_port_is_ignored() {
    support::with_scoped_env(&[("PORT", Some("eighty"))], || {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.server.port, 8080);
    });
}

#[test]
fn test_missing_explicit_file_is_configuration_error() {
    support::with_scoped_env(&cleared(), || {
        let err = AppConfig::load(Some(std::path::Path::new("/nonexistent/parking.toml")))
            .unwrap_err();
        assert!(err.is_configuration());
    });
}

#[test]
fn test_invalid_bucket_length_stops_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[buckets]\nrequest_minutes = 0\n").unwrap();

    support::with_scoped_env(&cleared(), || {
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(err.is_configuration());
    });
}
