//! Configuration module for tokio_onion.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_onion::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! ```

mod error;
mod logging;
mod parse;
mod server;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::{ServerConfig, DEFAULT_MAX_BODY_SIZE};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Max body size: {} bytes", self.server.max_body_size);

        match self.server.request_timeout {
            Some(timeout) => info!("  Request timeout: {}ms", timeout.as_millis()),
            None => info!("  Request timeout: disabled"),
        }

        info!("  Header timeout: {}s", self.server.header_timeout.as_secs());
        info!("  Drain timeout: {}s", self.server.drain_timeout.as_secs());
        info!("  Log format: {}", self.logging.format);

        if self.server.access_log {
            info!("  Access log: enabled");
        }
    }
}
