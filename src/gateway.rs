//! Gateway lifecycle: startup, poll loop and shutdown
//!
//! Startup order:
//! 0. Install the Ctrl-C handler and the fatal-fault hook
//! 1. Try to discover and open the serial device (absence is not fatal,
//!    the first command retries discovery)
//! 2. Bind the UDP and TCP endpoints (bind failures are logged, the gateway
//!    keeps running with whatever endpoints it got)
//! 3. Poll until the shutdown flag is set
//!
//! Shutdown closes both endpoints and the serial session.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{CommandExecutor, ExchangePolicy};
use crate::poller::{Endpoints, Poller};
use crate::session::SerialSession;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the poller and the shutdown flag
pub struct Gateway {
    poller: Poller,
    shutdown: Arc<AtomicBool>,
}

impl Gateway {
    /// Gateway over real serial ports
    pub fn new(config: &Config, shutdown: Arc<AtomicBool>) -> Self {
        Self::with_session(config, SerialSession::from_config(&config.device), shutdown)
    }

    /// Gateway over a caller-supplied session
    pub fn with_session(
        config: &Config,
        mut session: SerialSession,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        if session.ensure_open().is_err() {
            log::warn!("No serial device at startup, will retry on first command");
        }

        let executor = CommandExecutor::new(session, ExchangePolicy::from_config(&config.exchange));
        let endpoints = Endpoints::bind(&config.network);
        if endpoints.udp.is_none() || endpoints.tcp.is_none() {
            log::warn!("Running with a missing endpoint, some clients cannot be served");
        }

        Self {
            poller: Poller::new(endpoints, executor, &config.network),
            shutdown,
        }
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Poll until shutdown, then release every resource
    pub fn run(mut self) {
        log::info!("serial-bridge running. Press Ctrl-C to stop.");
        self.poller.run(&self.shutdown);

        log::info!("Shutdown...");
        self.poller.close();
        log::info!("Shutdown.");
    }
}

/// Set up a Ctrl-C handler that sets the returned shutdown flag
///
/// Can only be installed once per process.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let s = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
    Ok(shutdown)
}

/// Log unrecoverable faults and terminate
///
/// Panics are the process' fatal-fault path: nothing is cleaned up and the
/// exit status is 1.
pub fn install_fault_hook() {
    std::panic::set_hook(Box::new(|info| {
        log::error!("Fatal fault: {}", info);
        eprintln!("Error: {}", info);
        std::process::exit(1);
    }));
}
