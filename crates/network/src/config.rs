//! # Client Configuration
//!
//! Configuration options for the NetSync networking layer.
//!
//! # Example
//!
//! ```rust
//! use netsync_network::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig {
//!     host: "127.0.0.1".to_string(),
//!     port: 9000,
//!     retry_delay: Duration::from_secs(2),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use netsync_protocol::DEFAULT_MAX_LINE_LENGTH;
use std::time::Duration;

/// Client configuration options
///
/// # Default Values
///
/// - `localhost:8080`
/// - 3 connect attempts, 10 seconds apart, 5 seconds each
/// - 10-second handshake timeout
/// - 1024-byte reads, 64 KiB line limit
/// - 1-second attack cooldown
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server host name or IP address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    /// Number of connect attempts before the session is Failed
    ///
    /// # Default
    /// 3
    pub max_attempts: u32,

    /// Pause between a failed attempt and the next one
    ///
    /// # Default
    /// 10 seconds
    pub retry_delay: Duration,

    /// Upper bound for a single connect attempt
    ///
    /// # Default
    /// 5 seconds
    ///
    /// # Notes
    /// - A timed-out attempt counts as a failed attempt
    pub connect_timeout: Duration,

    /// How long to wait for the handshake line after connecting
    ///
    /// # Default
    /// 10 seconds
    pub handshake_timeout: Duration,

    /// Maximum number of bytes requested per socket read
    ///
    /// # Default
    /// 1024 bytes
    pub read_chunk_size: usize,

    /// Longest accepted wire line, excluding the delimiter
    ///
    /// # Default
    /// 64 KiB
    ///
    /// # Notes
    /// - Longer lines are discarded and counted as decode failures
    pub max_line_length: usize,

    /// Minimum time between two accepted attack commands
    ///
    /// # Default
    /// 1 second
    ///
    /// # Notes
    /// - `Duration::ZERO` disables the cooldown
    pub attack_cooldown: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            read_chunk_size: 1024,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            attack_cooldown: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// `host:port` string used for connecting and logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// `Ok(())` if configuration is valid, `Err(String)` otherwise
    ///
    /// # Checks
    /// - `host` must not be empty
    /// - `max_attempts` must be > 0
    /// - `connect_timeout` and `handshake_timeout` must be non-zero
    /// - `read_chunk_size` and `max_line_length` must be > 0
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }

        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be > 0".to_string());
        }

        if self.handshake_timeout.is_zero() {
            return Err("handshake_timeout must be > 0".to_string());
        }

        if self.read_chunk_size == 0 {
            return Err("read_chunk_size must be > 0".to_string());
        }

        if self.max_line_length == 0 {
            return Err("max_line_length must be > 0".to_string());
        }

        if self.read_chunk_size > self.max_line_length {
            tracing::warn!("read_chunk_size exceeds max_line_length, reads may span several lines");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "localhost:8080");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.read_chunk_size, 1024);
    }

    #[test]
    fn test_config_validation() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_max_attempts() {
        let mut config = ClientConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_host() {
        let mut config = ClientConfig::default();
        config.host = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
