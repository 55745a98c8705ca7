//! Service configuration file support.
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! missing section (or a missing file, see [`AppConfig::load`]) falls back to
//! sensible values. A handful of environment variables override the file.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::repository::{ErrorContext, RepositoryError};
use crate::models::BucketLength;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PARKING_STATS_CONFIG";

/// Environment variable overriding `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "PARKING_STATS_DATA_DIR";

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub buckets: BucketSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Bucket lengths in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSettings {
    #[serde(default = "default_occupancy_minutes")]
    pub occupancy_minutes: i64,
    #[serde(default = "default_request_minutes")]
    pub request_minutes: i64,
}

/// Snapshot locations and flush cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_occupancy_file")]
    pub occupancy_file: PathBuf,
    #[serde(default = "default_request_stats_file")]
    pub request_stats_file: PathBuf,
    #[serde(default = "default_historic_file")]
    pub historic_file: PathBuf,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

/// Cadence of the ingestion tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_ingestion_interval_secs")]
    pub ingestion_interval_secs: u64,
}

/// Where occupancy snapshots come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// JSON file holding the latest list of parking snapshots.
    #[serde(default)]
    pub snapshot_file: Option<PathBuf>,
}

/// HTTP bind address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_occupancy_minutes() -> i64 {
    15
}

fn default_request_minutes() -> i64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_occupancy_file() -> PathBuf {
    PathBuf::from("occupancy.json")
}

fn default_request_stats_file() -> PathBuf {
    PathBuf::from("request_stats.json")
}

fn default_historic_file() -> PathBuf {
    PathBuf::from("historic.json")
}

fn default_flush_interval_secs() -> u64 {
    300
}

fn default_ingestion_interval_secs() -> u64 {
    900
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self {
            occupancy_minutes: default_occupancy_minutes(),
            request_minutes: default_request_minutes(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            occupancy_file: default_occupancy_file(),
            request_stats_file: default_request_stats_file(),
            historic_file: default_historic_file(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            ingestion_interval_secs: default_ingestion_interval_secs(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` if successful
    /// * `Err(RepositoryError)` if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            RepositoryError::configuration(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, RepositoryError> {
        toml::from_str(content).map_err(|e| {
            RepositoryError::configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `parking-stats.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    ///
    /// # Returns
    /// * `Ok(Some(AppConfig))` if found and parsed successfully
    /// * `Ok(None)` if no config file exists
    /// * `Err(RepositoryError)` on a parse error
    pub fn from_default_location() -> Result<Option<Self>, RepositoryError> {
        let search_paths = [
            PathBuf::from("parking-stats.toml"),
            PathBuf::from("backend/parking-stats.toml"),
            PathBuf::from("../parking-stats.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                log::info!("Loading configuration from {}", path.display());
                return Self::from_file(&path).map(Some);
            }
        }

        Ok(None)
    }

    /// Resolve the configuration the server should run with.
    ///
    /// An explicit `path`, then `PARKING_STATS_CONFIG`, then the default search
    /// list; defaults when nothing is found. Environment overrides are applied
    /// and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, RepositoryError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_location()?.unwrap_or_else(|| {
                log::info!("No configuration file found, using defaults");
                Self::default()
            }),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOST`, `PORT` and `PARKING_STATS_DATA_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = env::var("PORT").ok().and_then(|s| s.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = env::var_os(DATA_DIR_ENV) {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        self.occupancy_bucket_length()?;
        self.request_bucket_length()?;

        let intervals = [
            ("storage.flush_interval_secs", self.storage.flush_interval_secs),
            ("schedule.ingestion_interval_secs", self.schedule.ingestion_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(RepositoryError::configuration_with_context(
                    format!("{} must be greater than zero", name),
                    ErrorContext::new("validate_config").with_entity(name),
                ));
            }
        }
        Ok(())
    }

    pub fn occupancy_bucket_length(&self) -> Result<BucketLength, RepositoryError> {
        BucketLength::new(self.buckets.occupancy_minutes)
            .map_err(|e| e.with_operation("buckets.occupancy_minutes"))
    }

    pub fn request_bucket_length(&self) -> Result<BucketLength, RepositoryError> {
        BucketLength::new(self.buckets.request_minutes)
            .map_err(|e| e.with_operation("buckets.request_minutes"))
    }

    pub fn occupancy_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.occupancy_file)
    }

    pub fn request_stats_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.request_stats_file)
    }

    pub fn historic_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.historic_file)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.storage.flush_interval_secs)
    }

    pub fn ingestion_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.ingestion_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.buckets.occupancy_minutes, 15);
        assert_eq!(config.buckets.request_minutes, 60);
        assert_eq!(config.occupancy_path(), PathBuf::from("data/occupancy.json"));
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[buckets]
occupancy_minutes = 10
request_minutes = 30

[storage]
data_dir = "/var/lib/parking"
historic_file = "ledger.json"
flush_interval_secs = 60

[schedule]
ingestion_interval_secs = 120

[source]
snapshot_file = "feed.json"

[server]
host = "127.0.0.1"
port = 9000
"#;

        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.occupancy_bucket_length().unwrap().count(), 144);
        assert_eq!(config.request_bucket_length().unwrap().count(), 48);
        assert_eq!(
            config.historic_path(),
            PathBuf::from("/var/lib/parking/ledger.json")
        );
        assert_eq!(
            config.request_stats_path(),
            PathBuf::from("/var/lib/parking/request_stats.json")
        );
        assert_eq!(config.flush_interval(), Duration::from_secs(60));
        assert_eq!(config.ingestion_interval(), Duration::from_secs(120));
        assert_eq!(config.source.snapshot_file, Some(PathBuf::from("feed.json")));
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_non_positive_bucket_length_is_configuration_error() {
        let config = AppConfig::from_toml("[buckets]\noccupancy_minutes = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.context().operation.as_deref(),
            Some("buckets.occupancy_minutes")
        );

        let config = AppConfig::from_toml("[buckets]\nrequest_minutes = -5\n").unwrap();
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = AppConfig::from_toml("[storage]\nflush_interval_secs = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = AppConfig::from_toml("[buckets\n").unwrap_err();
        assert!(err.is_configuration());
    }
}
