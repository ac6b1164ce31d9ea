//! Configuration management

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default database connection acquire timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Queue Configuration Constants
// ============================================================================

/// Default logical queue name (partition key in the relay table).
pub const DEFAULT_QUEUE_NAME: &str = "ingest";

/// Default lease duration in seconds before a claimed message becomes
/// redeliverable.
pub const DEFAULT_QUEUE_LEASE_SECS: u64 = 300;

// ============================================================================
// Warehouse Configuration Constants
// ============================================================================

/// Default warehouse dataset (Postgres schema) destination tables live in.
pub const DEFAULT_WAREHOUSE_SCHEMA: &str = "analytics";

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default per-table batch size that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default drain cap when a run request does not supply one.
pub const DEFAULT_MAX_MESSAGES: i64 = 10_000;

/// Default wall-clock ceiling for a single run in seconds.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub warehouse: WarehouseConfig,
    pub pipeline: PipelineConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Message queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub lease_secs: u64,
}

/// Warehouse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub schema: String,
}

/// Relay pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub max_messages: i64,
    pub run_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL must be set (Postgres backing store)")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            queue: QueueConfig {
                name: std::env::var("QUEUE_NAME")
                    .unwrap_or_else(|_| DEFAULT_QUEUE_NAME.to_string()),
                lease_secs: std::env::var("QUEUE_LEASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_QUEUE_LEASE_SECS),
            },
            warehouse: WarehouseConfig {
                schema: std::env::var("WAREHOUSE_SCHEMA")
                    .unwrap_or_else(|_| DEFAULT_WAREHOUSE_SCHEMA.to_string()),
            },
            pipeline: PipelineConfig {
                batch_size: std::env::var("BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BATCH_SIZE),
                max_messages: std::env::var("MAX_MESSAGES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_MESSAGES),
                run_timeout_secs: std::env::var("RUN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RUN_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // Validate connection pool settings
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        // Validate queue settings
        if self.queue.name.is_empty() {
            anyhow::bail!("Queue name cannot be empty");
        }

        if self.queue.lease_secs == 0 {
            anyhow::bail!("Queue lease_secs must be greater than 0");
        }

        // Validate warehouse dataset name; it is interpolated into DDL, so it
        // must already be a clean identifier.
        if self.warehouse.schema.is_empty() {
            anyhow::bail!("Warehouse schema cannot be empty");
        }

        if !self
            .warehouse
            .schema
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            anyhow::bail!(
                "Warehouse schema '{}' must contain only lowercase alphanumerics and underscores",
                self.warehouse.schema
            );
        }

        if self
            .warehouse
            .schema
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
        {
            anyhow::bail!(
                "Warehouse schema '{}' cannot start with a digit",
                self.warehouse.schema
            );
        }

        // Validate pipeline tuning
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.pipeline.max_messages <= 0 {
            anyhow::bail!("Max messages must be greater than 0");
        }

        if self.pipeline.run_timeout_secs == 0 {
            anyhow::bail!("Run timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
            },
            database: DatabaseConfig {
                // No default URL: DATABASE_URL is required at load time.
                url: String::new(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            queue: QueueConfig {
                name: DEFAULT_QUEUE_NAME.to_string(),
                lease_secs: DEFAULT_QUEUE_LEASE_SECS,
            },
            warehouse: WarehouseConfig {
                schema: DEFAULT_WAREHOUSE_SCHEMA.to_string(),
            },
            pipeline: PipelineConfig {
                batch_size: DEFAULT_BATCH_SIZE,
                max_messages: DEFAULT_MAX_MESSAGES,
                run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.database.url = "postgresql://localhost/siphon_test".to_string();
        config
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.queue.name, "ingest");
        assert_eq!(config.queue.lease_secs, 300);
        assert_eq!(config.warehouse.schema, "analytics");
        assert_eq!(config.pipeline.batch_size, 500);
        assert_eq!(config.pipeline.max_messages, 10_000);
        assert_eq!(config.pipeline.run_timeout_secs, 300);
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_database_url() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_queue_name() {
        let mut config = valid_config();
        config.queue.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_schema_identifier() {
        let mut config = valid_config();
        config.warehouse.schema = "Analytics!".to_string();
        assert!(config.validate().is_err());

        config.warehouse.schema = "1analytics".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = valid_config();
        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_max_messages() {
        let mut config = valid_config();
        config.pipeline.max_messages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_requires_database_url() {
        std::env::remove_var("DATABASE_URL");
        assert!(Config::load().is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_environment() {
        std::env::set_var("DATABASE_URL", "postgresql://localhost/siphon_test");
        std::env::set_var("QUEUE_NAME", "orders");
        std::env::set_var("BATCH_SIZE", "25");
        std::env::set_var("MAX_MESSAGES", "100");

        let config = Config::load().unwrap();
        assert_eq!(config.queue.name, "orders");
        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.pipeline.max_messages, 100);

        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("QUEUE_NAME");
        std::env::remove_var("BATCH_SIZE");
        std::env::remove_var("MAX_MESSAGES");
    }

    #[test]
    #[serial]
    fn test_load_ignores_unparsable_numbers() {
        std::env::set_var("DATABASE_URL", "postgresql://localhost/siphon_test");
        std::env::set_var("BATCH_SIZE", "not-a-number");

        let config = Config::load().unwrap();
        assert_eq!(config.pipeline.batch_size, DEFAULT_BATCH_SIZE);

        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("BATCH_SIZE");
    }
}
