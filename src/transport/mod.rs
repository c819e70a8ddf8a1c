//! Transport layer for serial I/O abstraction
//!
//! [`Transport`] is an open byte link to the device; [`Connector`] turns a
//! discovered device path into one. The session only talks to these traits,
//! so tests swap the real serial driver for [`mock::MockConnector`].

use crate::error::Result;
use std::path::Path;

pub mod mock;
mod serial;
pub use serial::{SerialConnector, SerialTransport};

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    ///
    /// A read that times out with nothing available returns `Ok(0)`.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;
}

/// Opens a configured [`Transport`] for a device path
pub trait Connector: Send {
    fn connect(&mut self, path: &Path) -> Result<Box<dyn Transport>>;
}
