//! Mock transport for testing
//!
//! Stands in for the serial driver: scripted replies, echo mode and injected
//! write failures. Handles are cheap clones sharing one state, so a test can
//! keep a copy after the session takes ownership.

use super::{Connector, Transport};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock transport for unit testing
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    echo: bool,
    fail_writes: bool,
    reads: usize,
}

impl MockTransport {
    /// Create a silent mock transport (reads return 0 until data is injected)
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers every write with the same bytes
    pub fn echo() -> Self {
        let transport = Self::new();
        transport.lock().echo = true;
        transport
    }

    /// Transport whose writes all fail as if the device was unplugged
    pub fn failing_writes() -> Self {
        let transport = Self::new();
        transport.lock().fail_writes = true;
        transport
    }

    /// Transport with a reply already waiting
    pub fn with_reply(data: &[u8]) -> Self {
        let transport = Self::new();
        transport.inject_read(data);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.lock().write_buffer.clone()
    }

    /// Number of read calls made so far
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        inner.reads += 1;
        let available = inner.read_buffer.len().min(buffer.len());

        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock device unplugged",
            )));
        }
        inner.write_buffer.extend_from_slice(data);
        if inner.echo {
            inner.read_buffer.extend(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a [`MockConnector`] hands out once its queue is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    /// Opening fails
    #[default]
    Fail,
    /// A transport that never answers
    Silent,
    /// A transport that echoes every write
    Echo,
}

/// Connector serving queued [`MockTransport`]s, in order
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<MockConnectorInner>>,
}

#[derive(Default)]
struct MockConnectorInner {
    queue: VecDeque<MockTransport>,
    fallback: Fallback,
    opens: usize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose every open yields an echoing device
    pub fn echo() -> Self {
        Self::new().with_fallback(Fallback::Echo)
    }

    pub fn with_fallback(self, fallback: Fallback) -> Self {
        self.lock().fallback = fallback;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockConnectorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the transport returned by the next open
    pub fn push(&self, transport: MockTransport) {
        self.lock().queue.push_back(transport);
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }
}

impl Connector for MockConnector {
    fn connect(&mut self, path: &Path) -> Result<Box<dyn Transport>> {
        let mut inner = self.lock();
        let transport = match inner.queue.pop_front() {
            Some(transport) => transport,
            None => match inner.fallback {
                Fallback::Fail => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("mock device {} unavailable", path.display()),
                    )));
                }
                Fallback::Silent => MockTransport::new(),
                Fallback::Echo => MockTransport::echo(),
            },
        };
        inner.opens += 1;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_transport_returns_written_bytes() {
        let mut transport = MockTransport::echo();
        transport.write(b"ping").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(transport.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_is_bounded_by_buffer() {
        let mut transport = MockTransport::with_reply(b"abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
    }

    #[test]
    fn test_failing_writes() {
        let mut transport = MockTransport::failing_writes();
        assert!(transport.write(b"x").is_err());
        assert!(transport.get_written().is_empty());
    }

    #[test]
    fn test_connector_queue_then_fallback() {
        let mut connector = MockConnector::new();
        let queued = MockTransport::with_reply(b"ok");
        connector.push(queued.clone());

        let mut first = connector.connect(Path::new("/dev/ttyACM0")).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(first.read(&mut buf).unwrap(), 2);
        assert_eq!(queued.read_count(), 1);

        assert!(connector.connect(Path::new("/dev/ttyACM0")).is_err());
        assert_eq!(connector.open_count(), 1);
    }
}
