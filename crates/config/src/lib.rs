//! NetSync Configuration Management
//!
//! Loads client options from `clientoptions.txt`.
//!
//! # Format
//!
//! ```text
//! # comment
//! serverhost = game.example.net
//! serverport = 8080
//! retrydelay = 10
//! ```
//!
//! Unknown keys are ignored and unparsable values keep their defaults.

use netsync_core::{NetSyncError, Result};
use netsync_network::ClientConfig;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default location of the options file, relative to the working directory
pub const DEFAULT_OPTIONS_PATH: &str = "config/clientoptions.txt";

/// Client options from clientoptions.txt
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Server host (from "serverhost" option, default: localhost)
    pub server_host: String,
    /// Server port (from "serverport" option, default: 8080)
    pub server_port: u16,

    // Connect behavior
    /// Connect attempts (from "maxattempts" option, default: 3)
    pub max_attempts: u32,
    /// Seconds between attempts (from "retrydelay" option, default: 10)
    pub retry_delay_secs: u64,
    /// Seconds per attempt (from "connecttimeout" option, default: 5)
    pub connect_timeout_secs: u64,
    /// Seconds to wait for the handshake (from "handshaketimeout" option, default: 10)
    pub handshake_timeout_secs: u64,

    // Stream limits
    /// Max bytes per read (from "readchunk" option, default: 1024)
    pub read_chunk_size: usize,
    /// Max wire line length (from "maxline" option, default: 65536)
    pub max_line_length: usize,

    // Commands
    /// Milliseconds between accepted attacks (from "attackcooldown" option, default: 1000)
    pub attack_cooldown_ms: u64,
    /// Milliseconds between move commands (from "moveinterval" option, default: 200)
    pub move_interval_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            server_port: 8080,
            max_attempts: 3,
            retry_delay_secs: 10,
            connect_timeout_secs: 5,
            handshake_timeout_secs: 10,
            read_chunk_size: 1024,
            max_line_length: 65536,
            attack_cooldown_ms: 1000,
            move_interval_ms: 200,
        }
    }
}

impl ClientOptions {
    /// Load options from `path`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            NetSyncError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    /// Load options from `path`, or use defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("{} not found, using default options", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Load options from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_or_default(DEFAULT_OPTIONS_PATH)
    }

    /// Parse clientoptions.txt content
    pub fn parse(content: &str) -> Self {
        let mut options = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            if let Some((key, value)) = line.split_once('=') {
                options.parse_option(&key.trim().to_lowercase(), value.trim());
            }
        }

        options
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        let defaults = Self::default();

        match key {
            "serverhost" => {
                if !value.is_empty() {
                    self.server_host = value.to_string();
                }
            }
            "serverport" => self.server_port = parse_or(key, value, defaults.server_port),
            "maxattempts" => self.max_attempts = parse_or(key, value, defaults.max_attempts),
            "retrydelay" => self.retry_delay_secs = parse_or(key, value, defaults.retry_delay_secs),
            "connecttimeout" => {
                self.connect_timeout_secs = parse_or(key, value, defaults.connect_timeout_secs);
            }
            "handshaketimeout" => {
                self.handshake_timeout_secs = parse_or(key, value, defaults.handshake_timeout_secs);
            }
            "readchunk" => self.read_chunk_size = parse_or(key, value, defaults.read_chunk_size),
            "maxline" => self.max_line_length = parse_or(key, value, defaults.max_line_length),
            "attackcooldown" => {
                self.attack_cooldown_ms = parse_or(key, value, defaults.attack_cooldown_ms);
            }
            "moveinterval" => {
                self.move_interval_ms = parse_or(key, value, defaults.move_interval_ms);
            }
            _ => {
                tracing::debug!("Unknown client option: {} = {}", key, value);
            }
        }
    }

    /// Time between move commands in the headless client
    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval_ms)
    }

    /// Networking configuration for these options
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.server_host.clone(),
            port: self.server_port,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            read_chunk_size: self.read_chunk_size,
            max_line_length: self.max_line_length,
            attack_cooldown: Duration::from_millis(self.attack_cooldown_ms),
        }
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Client options:");
        tracing::info!("  Server: {}:{}", self.server_host, self.server_port);
        tracing::info!(
            "  Connect: {} attempts, {}s apart, {}s timeout",
            self.max_attempts,
            self.retry_delay_secs,
            self.connect_timeout_secs
        );
        tracing::info!("  Handshake timeout: {}s", self.handshake_timeout_secs);
        tracing::info!(
            "  Read chunk: {} bytes, max line: {} bytes",
            self.read_chunk_size,
            self.max_line_length
        );
        tracing::info!(
            "  Attack cooldown: {}ms, move interval: {}ms",
            self.attack_cooldown_ms,
            self.move_interval_ms
        );
    }
}

impl From<&ClientOptions> for ClientConfig {
    fn from(options: &ClientOptions) -> Self {
        options.client_config()
    }
}

impl From<ClientOptions> for ClientConfig {
    fn from(options: ClientOptions) -> Self {
        options.client_config()
    }
}

fn parse_or<T>(key: &str, value: &str, default: T) -> T
where
    T: FromStr + Display,
{
    value.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid value for {}: {:?}, using {}", key, value, default);
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default();
        assert_eq!(options.server_host, "localhost");
        assert_eq!(options.server_port, 8080);
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.retry_delay_secs, 10);
    }

    #[test]
    fn test_parse_simple_options() {
        let text = r#"
# connection
serverhost = 10.0.0.5
serverport = 9999
maxattempts=5
retrydelay = 2
"#;
        let options = ClientOptions::parse(text);
        assert_eq!(options.server_host, "10.0.0.5");
        assert_eq!(options.server_port, 9999);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.retry_delay_secs, 2);
        assert_eq!(options.read_chunk_size, 1024);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let text = "serverport = lots\nattackcooldown = -1\nmystery = 1\nno equals sign\n";
        let options = ClientOptions::parse(text);
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let options = ClientOptions::parse("ServerPort = 7000\n");
        assert_eq!(options.server_port, 7000);
    }

    #[test]
    fn test_client_config_conversion() {
        let options = ClientOptions::parse("retrydelay = 3\nattackcooldown = 250\n");
        let config = ClientConfig::from(&options);

        assert_eq!(config.address(), "localhost:8080");
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.attack_cooldown, Duration::from_millis(250));
        assert!(config.validate().is_ok());
        assert_eq!(ClientConfig::from(ClientOptions::default()), ClientConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "serverhost = play.local").unwrap();
        writeln!(file, "moveinterval = 50").unwrap();

        let options = ClientOptions::load_from_file(file.path()).unwrap();
        assert_eq!(options.server_host, "play.local");
        assert_eq!(options.move_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clientoptions.txt");

        assert!(ClientOptions::load_from_file(&path).is_err());
        assert_eq!(
            ClientOptions::load_or_default(&path).unwrap(),
            ClientOptions::default()
        );
    }
}
