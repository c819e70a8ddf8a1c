//! Error types for serial-bridge

use std::net::SocketAddr;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// serial-bridge error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No serial entry matching the configured prefix was found (or it could not be opened)
    #[error("Serial device not found")]
    DeviceNotFound,

    /// Write to an open serial link failed
    #[error("Write to serial device failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// No bytes came back from the device, even after one re-discovery
    #[error("No response from serial device")]
    NoResponse,

    /// Socket creation or bind failure at startup
    #[error("Failed to set up {endpoint} endpoint on {addr}: {source}")]
    TransportSetup {
        /// "udp" or "tcp"
        endpoint: &'static str,
        /// Address the endpoint was bound to
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
