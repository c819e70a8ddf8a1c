//! Configuration for serial-bridge
//!
//! Every field has a compiled-in default, so the bridge runs without a
//! configuration file. A TOML file only needs the values it overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial device discovery and line settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Directory scanned for the device (default: /dev)
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Full-path prefix a candidate must start with (default: /dev/ttyACM)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Line speed (default: 9600)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Driver-level read timeout in milliseconds (default: 500)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Pick the lexicographically smallest match instead of the first enumerated
    #[serde(default)]
    pub sort_candidates: bool,
}

/// Request/response exchange policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// Wait between writing a command and reading the reply (default: 150)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Command buffer capacity including the terminator slot (default: 50)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Listener settings shared by the UDP and TCP endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Local address both endpoints bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port shared by UDP and TCP (default: 20118)
    #[serde(default = "default_port")]
    pub port: u16,

    /// TCP listen backlog (default: 5)
    #[serde(default = "default_backlog")]
    pub backlog: i32,

    /// Sleep between poll iterations in milliseconds (default: 10)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long an accepted connection may stay silent (default: 500)
    #[serde(default = "default_client_read_timeout")]
    pub client_read_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: default_prefix(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout(),
            sort_candidates: false,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            poll_interval_ms: default_poll_interval(),
            client_read_timeout_ms: default_client_read_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DeviceConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl ExchangeConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl NetworkConfig {
    /// Address shared by both endpoints
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn client_read_timeout(&self) -> Duration {
        Duration::from_millis(self.client_read_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use serial_bridge::config::Config;
    ///
    /// let config = Config::load("/etc/serial-bridge.toml")?;
    /// # Ok::<(), serial_bridge::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use compiled-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.exchange.buffer_size < 2 {
            return Err(Error::Config(format!(
                "exchange.buffer_size must be at least 2, got {}",
                self.exchange.buffer_size
            )));
        }
        if self.network.port == 0 {
            return Err(Error::Config("network.port must not be 0".to_string()));
        }
        if self.device.prefix.is_empty() {
            return Err(Error::Config("device.prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_directory() -> PathBuf {
    PathBuf::from("/dev")
}
fn default_prefix() -> String {
    "/dev/ttyACM".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_read_timeout() -> u64 {
    500
}
fn default_settle_delay() -> u64 {
    150
}
fn default_buffer_size() -> usize {
    50
}
fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}
fn default_port() -> u16 {
    20118
}
fn default_backlog() -> i32 {
    5
}
fn default_poll_interval() -> u64 {
    10
}
fn default_client_read_timeout() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.directory, PathBuf::from("/dev"));
        assert_eq!(config.device.prefix, "/dev/ttyACM");
        assert_eq!(config.device.baud_rate, 9600);
        assert!(!config.device.sort_candidates);
        assert_eq!(config.exchange.settle_delay(), Duration::from_millis(150));
        assert_eq!(config.exchange.buffer_size, 50);
        assert_eq!(config.network.socket_addr().to_string(), "0.0.0.0:20118");
        assert_eq!(config.network.backlog, 5);
        assert_eq!(config.network.poll_interval(), Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_content = r#"
[device]
prefix = "/dev/ttyUSB"

[network]
port = 30000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.prefix, "/dev/ttyUSB");
        assert_eq!(config.device.baud_rate, 9600);
        assert_eq!(config.network.port, 30000);
        assert_eq!(config.exchange.buffer_size, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[exchange]\nsettle_delay_ms = 20\nbuffer_size = 16\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.exchange.settle_delay_ms, 20);
        assert_eq!(config.exchange.buffer_size, 16);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../serial-bridge.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.device.prefix, defaults.device.prefix);
        assert_eq!(config.exchange.settle_delay_ms, defaults.exchange.settle_delay_ms);
        assert_eq!(config.network.socket_addr(), defaults.network.socket_addr());
        assert_eq!(config.network.backlog, defaults.network.backlog);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/serial-bridge.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = Config::load_or_default(None::<&Path>).unwrap();
        assert_eq!(config.network.port, 20118);
    }

    #[test]
    fn test_validate_rejects_tiny_buffer() {
        let mut config = Config::default();
        config.exchange.buffer_size = 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut config = Config::default();
        config.device.prefix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err: Error = toml::from_str::<Config>("[network]\nport = \"x\"")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Config(_)));
    }
}
