// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub scheduler: SchedulerConfig,
    pub ingest: IngestConfig,
    pub publisher: PublisherConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Which delayed-execution substrate backs the scheduler bridge.
/// Chosen here, never by runtime feature detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubstrateKind {
    /// Redis-backed sorted set; durable, exact cancel-by-key
    Durable,
    /// In-process tokio timers; coarse, best-effort cancel
    Timer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub substrate: SubstrateKind,
    /// Sorted-set key the durable substrate stores schedules under
    pub queue_key: String,
    pub dispatch_interval_seconds: u64,
    /// Maximum due tasks handed to the executor per dispatch poll
    pub dispatch_batch: usize,
    pub reconcile_interval_seconds: u64,
    /// Maximum overdue tasks re-submitted per reconciler tick
    pub reconcile_batch: i64,
    /// Delay applied when the reconciler re-submits an overdue task
    pub resubmit_grace_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub default_batch_size: usize,
    /// Offset of the first task of a fresh project from "now"
    pub start_grace_seconds: i64,
    /// Pause between one ingestion batch and its continuation
    pub continuation_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    pub default_author: String,
    /// Status the sink should assign to created content
    pub publish_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Settings {
    /// Load configuration with layered precedence: defaults -> file -> env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides, not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.scheduler.substrate == SubstrateKind::Durable && self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty when the durable substrate is selected".to_string());
        }
        if self.scheduler.queue_key.is_empty() {
            return Err("Scheduler queue_key cannot be empty".to_string());
        }
        if self.scheduler.dispatch_interval_seconds == 0 {
            return Err("Scheduler dispatch_interval_seconds must be greater than 0".to_string());
        }
        if self.scheduler.reconcile_interval_seconds == 0 {
            return Err("Scheduler reconcile_interval_seconds must be greater than 0".to_string());
        }
        if self.scheduler.reconcile_batch <= 0 {
            return Err("Scheduler reconcile_batch must be greater than 0".to_string());
        }

        if self.ingest.default_batch_size == 0 {
            return Err("Ingest default_batch_size must be greater than 0".to_string());
        }

        if self.publisher.base_url.is_empty() {
            return Err("Publisher base_url cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, substrate: &str, batch_size: usize) {
        let toml = format!(
            r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
url = "postgresql://localhost/dripfeed_test"
max_connections = 10
min_connections = 2
connect_timeout_seconds = 30

[redis]
url = "redis://localhost:6379"

[scheduler]
substrate = "{substrate}"
queue_key = "dripfeed:schedule"
dispatch_interval_seconds = 1
dispatch_batch = 32
reconcile_interval_seconds = 60
reconcile_batch = 5
resubmit_grace_seconds = 5

[ingest]
default_batch_size = {batch_size}
start_grace_seconds = 5
continuation_delay_seconds = 5

[publisher]
base_url = "http://localhost:9000/api"
default_author = "dripfeed"
publish_status = "publish"

[observability]
log_level = "info"
"#
        );
        fs::write(dir.join("default.toml"), toml).unwrap();
    }

    #[test]
    fn test_load_and_validate() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "durable", 500);

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.scheduler.substrate, SubstrateKind::Durable);
        assert_eq!(settings.ingest.default_batch_size, 500);
        assert_eq!(settings.scheduler.reconcile_batch, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_timer_substrate_selected_by_configuration() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "timer", 500);

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.scheduler.substrate, SubstrateKind::Timer);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "durable", 500);

        let mut settings = Settings::load_from_path(dir.path()).unwrap();
        settings.ingest.default_batch_size = 0;
        assert!(settings.validate().is_err());
    }
}
