use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logging::{LogFormat, LOG_FILE_PREFIX};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub tokens: TokenConfig,
    pub device_feed: DeviceFeedConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
    pub operation_timeout_seconds: u64,
    pub purge_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub header_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceFeedConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    pub default_polling_seconds: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Directory for the daily-rotated log files.
    pub directory: String,
    pub file_prefix: String,
    pub format: LogFormat,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default(
                "server.cors_allowed_origins",
                vec!["http://localhost:5173", "http://localhost:4173"],
            )?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "postgres://localhost:5432/device_sessions")?
            .set_default("database.pool_max_size", 10)?
            .set_default("database.pool_timeout_seconds", 3)?
            .set_default("database.operation_timeout_seconds", 3)?
            .set_default("database.purge_interval_seconds", 300)?
            .set_default("session.cookie_name", "anonymous_session")?
            .set_default("session.ttl_hours", 72)?
            .set_default("tokens.ttl_seconds", 30)?
            .set_default("tokens.sweep_interval_seconds", 60)?
            .set_default("tokens.header_name", "Authorization")?
            .set_default("device_feed.base_url", "https://track.onestepgps.com")?
            .set_default("device_feed.api_key", "")?
            .set_default("device_feed.timeout_seconds", 5)?
            .set_default("stream.default_polling_seconds", 5.0)?
            .set_default("logging.directory", "logs")?
            .set_default("logging.file_prefix", LOG_FILE_PREFIX)?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_allowed_origins")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("device_feed.api_key", std::env::var("DEVICE_FEED_API_KEY").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("logging.format", std::env::var("LOG_FORMAT").ok())?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds.max(1))
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl DeviceFeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Built-in values with the in-memory store, for tests and local runs.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_allowed_origins: vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:4173".to_string(),
                ],
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: String::new(),
                pool_max_size: 10,
                pool_timeout_seconds: 3,
                operation_timeout_seconds: 3,
                purge_interval_seconds: 300,
            },
            session: SessionConfig {
                cookie_name: "anonymous_session".to_string(),
                ttl_hours: 72,
            },
            tokens: TokenConfig {
                ttl_seconds: 30,
                sweep_interval_seconds: 60,
                header_name: "Authorization".to_string(),
            },
            device_feed: DeviceFeedConfig {
                base_url: "https://track.onestepgps.com".to_string(),
                api_key: String::new(),
                timeout_seconds: 5,
            },
            stream: StreamConfig {
                default_polling_seconds: 5.0,
            },
            logging: LoggingConfig {
                directory: "logs".to_string(),
                file_prefix: LOG_FILE_PREFIX.to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}
