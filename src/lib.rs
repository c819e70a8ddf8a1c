//! serial-bridge - network-to-serial gateway
//!
//! Forwards payloads received over UDP or TCP to a microcontroller attached
//! on a serial line and returns its reply to TCP clients.
//!
//! ## Components
//!
//! - [`session`]: device discovery and the open serial link
//! - [`executor`]: write, settle, read, with one rediscovery on silence
//! - [`poller`]: single-threaded UDP + TCP service loop
//! - [`gateway`]: startup, signal handling and shutdown

pub mod buffer;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod poller;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{CommandExecutor, ExchangePolicy};
pub use gateway::Gateway;
pub use poller::{Endpoints, PollReport, Poller};
pub use session::{DeviceLocator, SerialSession};
