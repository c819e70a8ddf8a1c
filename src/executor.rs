//! Command executor: one write-then-read exchange with the device
//!
//! There is no framing on the serial line. A reply is whatever the device has
//! produced after a fixed settle delay, collected by a single read bounded by
//! the driver timeout. Multi-part replies can therefore be truncated or merged.
//!
//! # Failure policy
//!
//! | Step  | Failure                 | Outcome                                    |
//! |-------|-------------------------|--------------------------------------------|
//! | open  | no device / open error  | `DeviceNotFound`                           |
//! | write | any error               | session closed, `WriteFailed`, no retry    |
//! | read  | zero bytes or error     | session closed, rediscover, read once more |
//! | retry | rediscovery fails       | `DeviceNotFound`                           |
//! | retry | zero bytes again        | session closed, `NoResponse`               |
//!
//! Only the read path retries. Write failures surface immediately and the
//! next exchange starts with a fresh discovery.

use crate::buffer::CommandBuffer;
use crate::config::ExchangeConfig;
use crate::error::{Error, Result};
use crate::session::SerialSession;
use std::thread;
use std::time::Duration;

/// Timing and sizing of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangePolicy {
    /// Wait between the write and the first read
    pub settle_delay: Duration,
    /// Buffer capacity including the terminator slot
    pub buffer_size: usize,
}

impl ExchangePolicy {
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            buffer_size: config.buffer_size,
        }
    }
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self::from_config(&ExchangeConfig::default())
    }
}

/// Runs exchanges against the serial session it owns
pub struct CommandExecutor {
    session: SerialSession,
    policy: ExchangePolicy,
    /// Outbound command, truncated to the payload bound
    outbound: CommandBuffer,
    /// Reused for every response, zeroed before each read
    buffer: CommandBuffer,
}

impl CommandExecutor {
    pub fn new(session: SerialSession, policy: ExchangePolicy) -> Self {
        Self {
            session,
            outbound: CommandBuffer::new(policy.buffer_size),
            buffer: CommandBuffer::new(policy.buffer_size),
            policy,
        }
    }

    pub fn policy(&self) -> &ExchangePolicy {
        &self.policy
    }

    pub fn session(&self) -> &SerialSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SerialSession {
        &mut self.session
    }

    /// Largest command or response an exchange carries
    pub fn max_payload(&self) -> usize {
        self.buffer.max_payload()
    }

    /// Write `command`, wait the settle delay and read the reply
    pub fn execute(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        if let Err(e) = self.session.ensure_open() {
            log::warn!("Serial device not available: {}", e);
            return Err(Error::DeviceNotFound);
        }

        let command = self.outbound.load(command);
        log::info!(
            "Executing (len {}): {}",
            command.len(),
            String::from_utf8_lossy(command).trim_end()
        );

        match self.session.write(command) {
            Ok(n) => log::debug!("Written {} bytes", n),
            Err(e) => {
                log::warn!("Can't write to serial device ({}), will re-search it", e);
                self.session.close();
                return Err(Error::WriteFailed(into_io_error(e)));
            }
        }

        thread::sleep(self.policy.settle_delay);

        if let Some(response) = self.read_response() {
            return Ok(response);
        }

        log::warn!(
            "No response within {:?}, re-searching serial device",
            self.policy.settle_delay
        );
        self.session.close();

        if !self.session.discover() || self.session.open().is_err() {
            return Err(Error::DeviceNotFound);
        }

        match self.read_response() {
            Some(response) => Ok(response),
            None => {
                log::warn!("No response from serial device after reopening");
                self.session.close();
                Err(Error::NoResponse)
            }
        }
    }

    /// One bounded read; `None` when nothing came back
    fn read_response(&mut self) -> Option<Vec<u8>> {
        let session = &mut self.session;
        match self.buffer.read_with(|slot| session.read(slot)) {
            Ok(0) => None,
            Ok(n) => {
                log::info!(
                    "Read (len {}): {}",
                    n,
                    String::from_utf8_lossy(self.buffer.as_bytes()).trim_end()
                );
                Some(self.buffer.as_bytes().to_vec())
            }
            Err(e) => {
                log::debug!("Serial read failed: {}", e);
                None
            }
        }
    }
}

fn into_io_error(e: Error) -> std::io::Error {
    match e {
        Error::Io(io) => io,
        Error::Serial(serial) => serial.into(),
        other => std::io::Error::other(other.to_string()),
    }
}
