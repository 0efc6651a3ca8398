//! Configuration management for the gateway.
//!
//! Configuration starts from defaults and is overridden from environment
//! variables prefixed with `GATEWAY_` (a `.env` file is honoured).

use super::transport::TransportConfig;
use crate::domains::events;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Tool metadata store.
    pub store: StoreConfig,

    /// Invocation and event streaming.
    pub dispatch: DispatchConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

/// Tool metadata store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `:memory:` opens a private in-memory database.
    pub database_path: PathBuf,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Events buffered per stream subscriber before it starts lagging.
    pub event_buffer: usize,

    /// Run handlers on a spawned task after acknowledging a call.
    pub detached: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("tools.db"),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            event_buffer: events::DEFAULT_CAPACITY,
            detached: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "tool-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Parse a boolean flag leniently: anything but "false"/"0"/"no"/"off" is true.
pub(crate) fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Recognised variables: `GATEWAY_SERVER_NAME`, `GATEWAY_LOG_LEVEL`,
    /// `GATEWAY_LOG_TIMESTAMPS`, `GATEWAY_DATABASE_PATH`,
    /// `GATEWAY_EVENT_BUFFER`, `GATEWAY_DISPATCH_DETACHED`, plus the
    /// transport variables read by [`TransportConfig::from_env`].
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("GATEWAY_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(flag) = std::env::var("GATEWAY_LOG_TIMESTAMPS") {
            config.logging.with_timestamps = parse_flag(&flag);
        }

        config.transport = TransportConfig::from_env();

        if let Ok(path) = std::env::var("GATEWAY_DATABASE_PATH") {
            config.store.database_path = PathBuf::from(path);
            info!("Tool store set to {:?}", config.store.database_path);
        }

        if let Ok(raw) = std::env::var("GATEWAY_EVENT_BUFFER") {
            match raw.parse::<usize>() {
                Ok(size) if size > 0 => config.dispatch.event_buffer = size,
                _ => warn!(
                    "Ignoring GATEWAY_EVENT_BUFFER={:?}, keeping {}",
                    raw, config.dispatch.event_buffer
                ),
            }
        }

        if let Ok(flag) = std::env::var("GATEWAY_DISPATCH_DETACHED") {
            config.dispatch.detached = parse_flag(&flag);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests run serially
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "GATEWAY_SERVER_NAME",
        "GATEWAY_DATABASE_PATH",
        "GATEWAY_EVENT_BUFFER",
        "GATEWAY_DISPATCH_DETACHED",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.database_path, PathBuf::from("tools.db"));
        assert_eq!(config.dispatch.event_buffer, 1024);
        assert!(config.dispatch.detached);
    }

    #[test]
    fn test_overrides_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        clear();
        unsafe {
            std::env::set_var("GATEWAY_SERVER_NAME", "edge");
            std::env::set_var("GATEWAY_DATABASE_PATH", ":memory:");
            std::env::set_var("GATEWAY_EVENT_BUFFER", "16");
            std::env::set_var("GATEWAY_DISPATCH_DETACHED", "false");
        }

        let config = Config::from_env();
        assert_eq!(config.server.name, "edge");
        assert_eq!(config.store.database_path, PathBuf::from(":memory:"));
        assert_eq!(config.dispatch.event_buffer, 16);
        assert!(!config.dispatch.detached);

        clear();
    }

    #[test]
    fn test_invalid_buffer_keeps_default() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        clear();
        unsafe {
            std::env::set_var("GATEWAY_EVENT_BUFFER", "0");
        }

        assert_eq!(Config::from_env().dispatch.event_buffer, 1024);

        clear();
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("FALSE"));
        assert!(!parse_flag(" off "));
    }
}
