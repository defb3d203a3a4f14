//! Configuration structures for LogCaster

use crate::{LogCasterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on configurable worker tasks
pub const MAX_WORKERS: usize = 32;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Core server settings
    pub server: ServerSettings,
    /// Disk persistence configuration
    pub persistence: PersistenceSettings,
    /// IRC streaming configuration
    pub irc: IrcSettings,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind all listeners to
    pub bind_address: String,
    /// TCP port for log ingestion
    pub ingest_port: u16,
    /// TCP port for one-shot queries
    pub query_port: u16,
    /// Maximum concurrent ingest connections
    pub max_clients: usize,
    /// Ring buffer capacity in entries
    pub buffer_capacity: usize,
    /// Worker tasks executing connection handlers, clamped to [1, 32]
    pub workers: usize,
}

/// Disk persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Enable the persistence writer
    pub enabled: bool,
    /// Directory holding `current.log` and rotated files
    pub log_directory: PathBuf,
    /// Maximum file size in bytes before rotation
    pub max_file_size: u64,
    /// Writer flush interval in milliseconds
    pub flush_interval_ms: u64,
}

/// IRC streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcSettings {
    /// Enable the IRC listener
    pub enabled: bool,
    /// TCP port for the IRC listener
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "0.0.0.0".to_string(),
                ingest_port: 9999,
                query_port: 9998,
                max_clients: 1024,
                buffer_capacity: 10000,
                workers: 4,
            },
            persistence: PersistenceSettings::default(),
            irc: IrcSettings::default(),
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            log_directory: PathBuf::from("./logs"),
            max_file_size: 10 * 1024 * 1024, // 10MB
            flush_interval_ms: 1000,
        }
    }
}

impl Default for IrcSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 6667,
        }
    }
}

impl PersistenceSettings {
    /// Writer flush interval as a [`Duration`]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LogCasterError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| LogCasterError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.buffer_capacity == 0 {
            return Err(LogCasterError::Config(
                "Buffer capacity must be non-zero".to_string(),
            ));
        }
        if self.server.workers == 0 || self.server.workers > MAX_WORKERS {
            return Err(LogCasterError::Config(format!(
                "Worker count must be between 1 and {}",
                MAX_WORKERS
            )));
        }
        if self.server.ingest_port == self.server.query_port {
            return Err(LogCasterError::Config(
                "Ingest and query ports must differ".to_string(),
            ));
        }
        if self.irc.enabled
            && (self.irc.port == self.server.ingest_port || self.irc.port == self.server.query_port)
        {
            return Err(LogCasterError::Config(
                "IRC port collides with another listener".to_string(),
            ));
        }
        if self.persistence.enabled && self.persistence.max_file_size == 0 {
            return Err(LogCasterError::Config(
                "Max file size must be non-zero when persistence is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
