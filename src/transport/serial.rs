//! Serial transport implementation

use super::{Connector, Transport};
use crate::config::DeviceConfig;
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

/// Serial transport for UART communication
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port in raw 8N1 mode
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `read_timeout` - Longest a read waits for the first byte
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        // serialport puts the tty in raw mode with CLOCAL | CREAD set
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}

/// [`Connector`] backed by real serial ports
#[derive(Debug, Clone)]
pub struct SerialConnector {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.baud_rate, config.read_timeout())
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self, path: &Path) -> Result<Box<dyn Transport>> {
        let transport =
            SerialTransport::open(&path.to_string_lossy(), self.baud_rate, self.read_timeout)?;
        Ok(Box::new(transport))
    }
}
