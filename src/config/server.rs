//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, env_parse};
use super::ConfigError;

/// Default request body limit (2 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
    /// Bound on a single dispatch. None disables it.
    pub request_timeout: Option<Duration>,
    /// HTTP/1 header read timeout.
    pub header_timeout: Duration,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
    /// Emit one access log line per request.
    pub access_log: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_addr = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| ConfigError::parse("LISTEN_ADDR", raw_addr.as_str(), e))?;

        let max_body_size = env_parse("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE)?;
        if max_body_size == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_BODY_SIZE".into(),
                message: "must be greater than zero".into(),
            });
        }

        let header_timeout_secs: u64 = env_parse("HEADER_TIMEOUT_SECS", 5)?;
        let drain_timeout_secs: u64 = env_parse("DRAIN_TIMEOUT_SECS", 30)?;

        Ok(Self {
            listen_addr,
            max_body_size,
            request_timeout: env_duration("REQUEST_TIMEOUT", "30s")?,
            header_timeout: Duration::from_secs(header_timeout_secs.max(1)),
            drain_timeout: Duration::from_secs(drain_timeout_secs),
            access_log: env_bool("ACCESS_LOG", false),
        })
    }

    /// Configuration for tests: ephemeral port on loopback.
    pub fn local() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: Some(Duration::from_secs(30)),
            header_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
            access_log: false,
        }
    }
}
