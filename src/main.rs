//! radalertlog - console and network logger for Radiation Alert geiger
//! counters
//!
//! Connects to a device over BLE or USB HID, aggregates its telemetry and
//! prints periodic statistics. Lost connections are re-established with a
//! short backoff so a long-running log survives the device wandering out of
//! range.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use radalert::{BleSession, HidSession, Record};
use radalert_transport::{discovery, protocol, BleTransport};

mod cli;
mod logger;
#[cfg(feature = "upload")]
mod net;

use cli::{Cli, Commands};
use logger::{ConsoleLogger, LogBackend};

/// Delay between reconnect attempts
const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let backend = Arc::new(LogBackend::new());
    let running = Arc::new(AtomicBool::new(true));

    if !cli.json {
        let interval = std::env::var("CONSOLE_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .map_or(Duration::from_secs(30), Duration::from_secs);
        let console = ConsoleLogger::new(Arc::clone(&backend), interval);
        let console_running = console.running_flag();
        std::thread::spawn(move || console.spin());
        let running = Arc::clone(&running);
        // Tie the console lifetime to the main loop
        std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(250));
            }
            console_running.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(feature = "upload")]
    net::spawn_uploaders(net::UploadConfig::from_env(), &backend, &running);

    match cli.command.unwrap_or(Commands::Ble { address: None }) {
        Commands::Ble { address } => run_ble(address, cli.json, backend, running),
        Commands::Hid { vid, pid } => run_hid(vid, pid, cli.json, backend, running),
    }
}

/// Session callback: optional JSON lines, then the aggregation backend
fn make_callback(
    backend: Arc<LogBackend>,
    json: bool,
) -> impl FnMut(Record) + Send + 'static {
    move |record| {
        if json {
            match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Record serialization failed: {e}"),
            }
        }
        backend.on_record(&record);
    }
}

fn run_ble(
    address: Option<String>,
    json: bool,
    backend: Arc<LogBackend>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let mut session = BleSession::new(make_callback(backend, json));
    install_ctrlc(&running, &session.handle())?;

    while running.load(Ordering::SeqCst) {
        let target = match &address {
            Some(address) => address.clone(),
            None => match scan_for_monitor(&running)? {
                Some(address) => address,
                None => break,
            },
        };

        info!("Connecting to {target}");
        match BleTransport::open(&target) {
            Ok(transport) => {
                debug!("Device information: {:?}", transport.read_device_info());
                session.attach(Arc::new(transport));
            }
            Err(e) => {
                warn!("Connect failed: {e}");
                backoff(&running);
                continue;
            }
        }

        info!("Sampling from {target}");
        match session.spin() {
            Ok(()) => break,
            Err(e) => warn!("Connection lost: {e}"),
        }
        backoff(&running);
    }
    Ok(())
}

fn run_hid(
    vid: Option<u16>,
    pid: Option<u16>,
    json: bool,
    backend: Arc<LogBackend>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let mut session = HidSession::new(make_callback(backend, json));
    install_ctrlc(&running, &session.handle())?;

    while running.load(Ordering::SeqCst) {
        let (vid, pid) = match (vid, pid) {
            (Some(vid), Some(pid)) => (vid, pid),
            _ => match wait_for_hid(&running)? {
                Some(ids) => ids,
                None => break,
            },
        };

        info!("Connecting to {vid:04x}:{pid:04x}");
        if let Err(e) = session.connect(vid, pid) {
            warn!("Connect failed: {e}");
            backoff(&running);
            continue;
        }

        info!("Sampling from {vid:04x}:{pid:04x}");
        match session.spin() {
            Ok(()) => break,
            Err(e) => warn!("Connection lost: {e}"),
        }
        backoff(&running);
    }
    Ok(())
}

fn install_ctrlc(running: &Arc<AtomicBool>, handle: &radalert::SessionHandle) -> Result<()> {
    let running = Arc::clone(running);
    let handle = handle.clone();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        handle.shutdown();
    })
    .context("Failed to install the Ctrl-C handler")?;
    Ok(())
}

/// Scan until a Mon200 shows up or the program is stopped
fn scan_for_monitor(running: &AtomicBool) -> Result<Option<String>> {
    info!("Scanning for {} devices...", protocol::ble::SCAN_NAME);
    while running.load(Ordering::SeqCst) {
        let found = discovery::scan_ble(protocol::ble::SCAN_NAME, Duration::from_secs(3))
            .context("BLE scan failed")?;
        if let Some(address) = found.into_iter().next() {
            info!("Found {address}");
            return Ok(Some(address));
        }
    }
    Ok(None)
}

/// Poll the USB bus until a Radiation Alert unit shows up
fn wait_for_hid(running: &AtomicBool) -> Result<Option<(u16, u16)>> {
    info!(
        "Waiting for HID device {:04x}:{:04x}...",
        protocol::hid::VENDOR_ID,
        protocol::hid::PRODUCT_ID
    );
    while running.load(Ordering::SeqCst) {
        if let Some(ids) = discovery::find_hid().context("HID enumeration failed")? {
            return Ok(Some(ids));
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    Ok(None)
}

fn backoff(running: &AtomicBool) {
    if running.load(Ordering::SeqCst) {
        std::thread::sleep(RECONNECT_BACKOFF);
    }
}
