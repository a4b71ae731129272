//! Daemon configuration.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 50051
//! defrag_interval_secs = 60
//!
//! [manager]
//! capacity = 1048576
//! collector_interval_ms = 5000
//! dump_dir = "/var/lib/memkeep/dumps"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use memkeep_common::{ManagerConfig, BYTES_PER_MB, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Run `defragment` on this period. Unset means compaction only happens
    /// when a client asks for it.
    #[serde(default)]
    pub defrag_interval_secs: Option<u64>,

    /// Memory manager settings.
    #[serde(default)]
    pub manager: ManagerConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            defrag_interval_secs: None,
            manager: ManagerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the socket address.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the periodic compaction interval, if any.
    pub fn defrag_interval(&self) -> Option<Duration> {
        self.defrag_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        if self.host.is_empty() {
            anyhow::bail!("host must not be empty");
        }
        Ok(())
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the arena size in megabytes.
    pub fn memsize_mb(mut self, megabytes: usize) -> Self {
        self.config.manager.capacity = megabytes.saturating_mul(BYTES_PER_MB);
        self
    }

    /// Sets the snapshot directory.
    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.manager.dump_dir = Some(dir.into());
        self
    }

    /// Sets the collector wake interval.
    pub fn collector_interval(mut self, interval: Duration) -> Self {
        self.config.manager = self.config.manager.with_collector_interval(interval);
        self
    }

    /// Sets the periodic compaction interval.
    pub fn defrag_interval_secs(mut self, secs: u64) -> Self {
        self.config.defrag_interval_secs = Some(secs);
        self
    }

    /// Replaces the manager settings.
    pub fn manager(mut self, manager: ManagerConfig) -> Self {
        self.config.manager = manager;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
