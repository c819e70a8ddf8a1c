//! Dual-transport poller
//!
//! One UDP socket and one TCP listener share the bridge port. Both are
//! non-blocking and serviced from a single thread, datagrams first:
//!
//! ```text
//! ┌────────── iteration ──────────┐
//! │ 1. recv_from (UDP)            │ → execute, result dropped
//! │ 2. accept (TCP)               │ → read once, execute, reply, close
//! │ 3. sleep poll interval        │
//! └───────────────────────────────┘
//! ```
//!
//! UDP is fire-and-forget: no reply path exists. A TCP connection carries one
//! request and at most one reply, and is closed whether or not the exchange
//! succeeded. Failed exchanges are never reported to clients.

use crate::buffer::CommandBuffer;
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// The two listening endpoints
///
/// Either one may be missing when it failed to bind; the poller then skips it.
#[derive(Debug, Default)]
pub struct Endpoints {
    pub udp: Option<UdpSocket>,
    pub tcp: Option<TcpListener>,
}

impl Endpoints {
    /// Bind both endpoints, logging (not returning) failures
    pub fn bind(config: &NetworkConfig) -> Self {
        let addr = config.socket_addr();

        let udp = match bind_udp(addr) {
            Ok(socket) => {
                log::info!("UDP endpoint listening on {}", addr);
                Some(socket)
            }
            Err(e) => {
                log::error!("{}", e);
                None
            }
        };

        let tcp = match bind_tcp(addr, config.backlog) {
            Ok(listener) => {
                log::info!(
                    "TCP endpoint listening on {} (backlog {})",
                    addr,
                    config.backlog
                );
                Some(listener)
            }
            Err(e) => {
                log::error!("{}", e);
                None
            }
        };

        Self { udp, tcp }
    }

    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Drop both sockets, releasing the port
    pub fn close(&mut self) {
        if self.udp.take().is_some() {
            log::debug!("UDP endpoint closed");
        }
        if self.tcp.take().is_some() {
            log::debug!("TCP endpoint closed");
        }
    }
}

/// Bind a non-blocking datagram socket
pub fn bind_udp(addr: SocketAddr) -> Result<UdpSocket> {
    let setup = |source| Error::TransportSetup {
        endpoint: "udp",
        addr,
        source,
    };
    let socket = UdpSocket::bind(addr).map_err(setup)?;
    socket.set_nonblocking(true).map_err(setup)?;
    Ok(socket)
}

/// Bind a non-blocking stream listener with an explicit backlog
pub fn bind_tcp(addr: SocketAddr, backlog: i32) -> Result<TcpListener> {
    let setup = |source| Error::TransportSetup {
        endpoint: "tcp",
        addr,
        source,
    };
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(setup)?;
    socket.set_reuse_address(true).map_err(setup)?;
    socket.bind(&addr.into()).map_err(setup)?;
    socket.listen(backlog).map_err(setup)?;
    socket.set_nonblocking(true).map_err(setup)?;
    Ok(socket.into())
}

/// What a TCP connection amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub peer: SocketAddr,
    /// Bytes read from the client
    pub request_len: usize,
    /// Bytes written back (0 when the exchange failed or nothing was read)
    pub reply_len: usize,
}

/// Work done by one [`Poller::poll_once`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Length of the datagram serviced, if any
    pub datagram: Option<usize>,
    pub connection: Option<ConnectionReport>,
}

impl PollReport {
    pub fn is_idle(&self) -> bool {
        self.datagram.is_none() && self.connection.is_none()
    }
}

/// Single-threaded service loop over both endpoints
pub struct Poller {
    endpoints: Endpoints,
    executor: CommandExecutor,
    /// Inbound request buffer, same capacity as the exchange buffer
    inbound: CommandBuffer,
    poll_interval: Duration,
    client_read_timeout: Duration,
}

impl Poller {
    pub fn new(endpoints: Endpoints, executor: CommandExecutor, config: &NetworkConfig) -> Self {
        let inbound = CommandBuffer::new(executor.policy().buffer_size);
        Self {
            endpoints,
            executor,
            inbound,
            poll_interval: config.poll_interval(),
            client_read_timeout: config.client_read_timeout(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut CommandExecutor {
        &mut self.executor
    }

    /// Poll until `shutdown` is set
    ///
    /// The flag is checked once per iteration; an exchange already under way
    /// runs to completion.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            let report = self.poll_once();
            if !report.is_idle() {
                log::debug!("Poll: {:?}", report);
            }
            thread::sleep(self.poll_interval);
        }
        log::debug!("Poll loop stopped");
    }

    /// Service at most one datagram, then at most one connection
    pub fn poll_once(&mut self) -> PollReport {
        PollReport {
            datagram: self.service_datagram(),
            connection: self.service_connection(),
        }
    }

    fn service_datagram(&mut self) -> Option<usize> {
        let socket = self.endpoints.udp.as_ref()?;

        let received = self.inbound.read_with(|slot| match socket.recv_from(slot) {
            Ok((n, from)) => {
                log::debug!("Datagram of {} bytes from {}", n, from);
                Ok(n)
            }
            Err(e) => Err(Error::Io(e)),
        });

        match received {
            Ok(0) => None,
            Ok(n) => {
                if let Err(e) = self.executor.execute(self.inbound.as_bytes()) {
                    log::debug!("UDP command dropped: {}", e);
                }
                Some(n)
            }
            Err(Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("UDP receive failed: {}", e);
                None
            }
        }
    }

    fn service_connection(&mut self) -> Option<ConnectionReport> {
        let listener = self.endpoints.tcp.as_ref()?;

        let (mut stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                log::error!("Accept error: {}", e);
                return None;
            }
        };

        log::debug!("TCP client connected: {}", peer);
        let report = self.handle_client(&mut stream, peer);
        let _ = stream.shutdown(Shutdown::Both);
        log::debug!("TCP client closed: {}", peer);
        Some(report)
    }

    fn handle_client(&mut self, stream: &mut TcpStream, peer: SocketAddr) -> ConnectionReport {
        let mut report = ConnectionReport {
            peer,
            request_len: 0,
            reply_len: 0,
        };

        // Accepted sockets may inherit non-blocking mode from the listener
        if let Err(e) = stream.set_nonblocking(false) {
            log::error!("Failed to set socket to blocking mode: {}", e);
            return report;
        }
        if let Err(e) = stream.set_read_timeout(Some(self.client_read_timeout)) {
            log::warn!("Failed to set read timeout: {}", e);
        }

        let read = self.inbound.read_with(|slot| {
            use std::io::Read;
            stream.read(slot).map_err(Error::Io)
        });

        report.request_len = match read {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Failed to read from {}: {}", peer, e);
                return report;
            }
        };
        if report.request_len == 0 {
            return report;
        }

        match self.executor.execute(self.inbound.as_bytes()) {
            Ok(response) => match stream.write_all(&response) {
                Ok(()) => report.reply_len = response.len(),
                Err(e) => log::warn!("Failed to reply to {}: {}", peer, e),
            },
            Err(e) => log::debug!("No reply for {}: {}", peer, e),
        }

        report
    }

    /// Release both endpoints and the serial session
    pub fn close(&mut self) {
        self.endpoints.close();
        self.executor.session_mut().close();
    }
}
