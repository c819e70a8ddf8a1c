//! End-to-end tests: real sockets on loopback, mock serial device

use serial_bridge::config::Config;
use serial_bridge::session::{DeviceLocator, SerialSession};
use serial_bridge::transport::mock::{MockConnector, MockTransport};
use serial_bridge::Gateway;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

struct Running {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Running {
    fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.handle.join().unwrap();
    }
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.network.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.network.port = port;
    config.network.poll_interval_ms = 2;
    config.network.client_read_timeout_ms = 300;
    config.exchange.settle_delay_ms = 5;
    config
}

fn device_dir(present: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    if present {
        std::fs::write(dir.path().join("ttyACM0"), b"").unwrap();
    }
    dir
}

fn session(dir: &TempDir, connector: &MockConnector) -> SerialSession {
    let prefix = dir.path().join("ttyACM");
    SerialSession::new(
        DeviceLocator::new(dir.path(), prefix.to_string_lossy()),
        connector.clone(),
    )
}

/// Loopback port currently free for both UDP and TCP
fn shared_port() -> u16 {
    for _ in 0..10 {
        let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = udp.local_addr().unwrap().port();
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return port;
        }
    }
    panic!("could not find a shared test port");
}

/// Start a gateway with UDP and TCP on one shared loopback port
///
/// The session is built once, after a port is found, so a queued mock device
/// is consumed by the gateway that actually runs.
fn start(dir: &TempDir, connector: &MockConnector) -> Running {
    let port = shared_port();
    let shutdown = Arc::new(AtomicBool::new(false));
    let gateway = Gateway::with_session(
        &test_config(port),
        session(dir, connector),
        Arc::clone(&shutdown),
    );

    let endpoints = gateway.poller().endpoints();
    assert!(endpoints.udp.is_some() && endpoints.tcp.is_some());

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let handle = thread::spawn(move || gateway.run());
    Running {
        addr,
        shutdown,
        handle,
    }
}

fn tcp_request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(payload).unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).unwrap();
    reply
}

#[test]
fn tcp_echo_round_trip() {
    let dir = device_dir(true);
    let running = start(&dir, &MockConnector::echo());

    assert_eq!(tcp_request(running.addr, b"LED 1 ON\n"), b"LED 1 ON\n");
    assert_eq!(tcp_request(running.addr, b"LED 1 OFF\n"), b"LED 1 OFF\n");

    running.stop();
}

#[test]
fn payload_of_max_size_round_trips() {
    let dir = device_dir(true);
    let running = start(&dir, &MockConnector::echo());

    let exact = vec![b'A'; 49];
    assert_eq!(tcp_request(running.addr, &exact), exact);

    running.stop();
}

#[test]
fn oversized_datagram_is_truncated() {
    let dir = device_dir(true);
    let connector = MockConnector::new();
    let device = MockTransport::echo();
    connector.push(device.clone());
    let running = start(&dir, &connector);

    let payload: Vec<u8> = (0..64).collect();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(&payload, running.addr).unwrap();

    for _ in 0..200 {
        if !device.get_written().is_empty() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(device.get_written(), &payload[..49]);

    running.stop();
}

#[test]
fn oversized_tcp_request_is_truncated() {
    let dir = device_dir(true);
    let connector = MockConnector::new();
    let device = MockTransport::echo();
    connector.push(device.clone());
    let running = start(&dir, &connector);

    let payload: Vec<u8> = (0..64).collect();
    let mut stream = TcpStream::connect(running.addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(&payload).unwrap();

    let mut reply = [0u8; 49];
    stream.read_exact(&mut reply).unwrap();
    assert_eq!(reply.as_slice(), &payload[..49]);
    assert_eq!(device.get_written(), &payload[..49]);

    // Nothing follows the bounded reply; the unread tail may surface as a reset
    let mut rest = Vec::new();
    if stream.read_to_end(&mut rest).is_ok() {
        assert!(rest.is_empty());
    }

    running.stop();
}

#[test]
fn tcp_without_device_gets_nothing() {
    let dir = device_dir(false);
    let connector = MockConnector::echo();
    let running = start(&dir, &connector);

    assert!(tcp_request(running.addr, b"PING").is_empty());
    assert_eq!(connector.open_count(), 0);

    running.stop();
}

#[test]
fn device_attached_after_startup_is_found() {
    let dir = device_dir(false);
    let running = start(&dir, &MockConnector::echo());

    assert!(tcp_request(running.addr, b"PING").is_empty());
    std::fs::write(dir.path().join("ttyACM1"), b"").unwrap();
    assert_eq!(tcp_request(running.addr, b"PING"), b"PING");

    running.stop();
}

#[test]
fn udp_is_forwarded_without_reply() {
    let dir = device_dir(true);
    let connector = MockConnector::new();
    let device = MockTransport::echo();
    connector.push(device.clone());
    let running = start(&dir, &connector);

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    client.send_to(b"BEEP", running.addr).unwrap();

    let mut buf = [0u8; 64];
    match client.recv_from(&mut buf) {
        Ok((n, _)) => panic!("unexpected {} byte UDP reply", n),
        Err(e) => assert!(matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)),
    }
    assert_eq!(device.get_written(), b"BEEP");

    running.stop();
}

#[test]
fn shutdown_releases_port_and_device() {
    let dir = device_dir(true);
    let connector = MockConnector::new();
    let device = MockTransport::echo();
    connector.push(device.clone());
    let running = start(&dir, &connector);
    let addr = running.addr;

    running.stop();

    // Port is free again for both protocols
    UdpSocket::bind(addr).unwrap();
    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(300)).is_err());

    // Nothing listens anymore, so nothing reaches the device
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    let _ = client.send_to(b"LATE", addr);
    thread::sleep(Duration::from_millis(50));
    assert!(device.get_written().is_empty());
    assert_eq!(connector.open_count(), 1);
}
