//! serial-bridge - network-to-serial gateway daemon
//!
//! ## Protocol Architecture
//!
//! - **UDP (port 20118)**: Commands only, fire-and-forget, no reply
//! - **TCP (port 20118)**: One command per connection, device reply written back
//!
//! Both endpoints forward the raw payload to the first `/dev/ttyACM*` device.

use clap::Parser;
use serial_bridge::config::Config;
use serial_bridge::error::Result;
use serial_bridge::gateway::{self, Gateway};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "serial-bridge", version, about = "Forward TCP/UDP payloads to a serial microcontroller")]
struct Args {
    /// Configuration file (TOML); compiled-in defaults when omitted
    #[arg(value_name = "CONFIG")]
    config_path: Option<PathBuf>,

    /// Configuration file, flag form
    #[arg(short, long, value_name = "PATH", conflicts_with = "config_path")]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the device path prefix (e.g. /dev/ttyUSB)
    #[arg(long, value_name = "PREFIX")]
    device_prefix: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.or(args.config_path).as_deref())?;
    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(prefix) = args.device_prefix {
        config.device.prefix = prefix;
    }
    config.validate()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    gateway::install_fault_hook();
    let shutdown = gateway::install_signal_handler()?;

    log::info!("serial-bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Device: {}* in {} at {} baud",
        config.device.prefix,
        config.device.directory.display(),
        config.device.baud_rate
    );

    Gateway::new(&config, shutdown).run();

    log::info!("serial-bridge stopped");
    Ok(())
}
