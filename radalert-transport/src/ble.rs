//! Bluetooth LE transparent UART transport implementation
//!
//! The BM70 module inside the Radiation Alert units exposes the Microchip
//! "transparent UART" service: a serial byte stream carried over a notify
//! characteristic (device to us) and a write characteristic (us to device).
//! Note the naming is from the peripheral's point of view - we *receive*
//! from TX and *write* to RX.
//!
//! btleplug is async; this transport owns a small tokio runtime and bridges
//! notifications into a channel so the rest of the stack can stay blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use btleplug::api::{
    BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::protocol::{ble, device_info};
use crate::{Transport, TransportDeviceInfo, TransportType};

/// How long to scan for the requested address before giving up
const CONNECT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Slice length for the blocking receive loop; bounds how long a pending
/// receive can outlive a close
const RECV_SLICE: Duration = Duration::from_millis(500);

/// Transparent UART transport for a Radiation Alert unit
pub struct BleTransport {
    runtime: Runtime,
    _central: Adapter,
    peripheral: Peripheral,
    /// Write target (client-to-peripheral)
    rx_char: Characteristic,
    notifications: Mutex<Receiver<Vec<u8>>>,
    info: TransportDeviceInfo,
    closed: AtomicBool,
}

impl BleTransport {
    /// Connect to a device by BLE address (`XX:XX:XX:XX:XX:XX`).
    ///
    /// Scans until the address shows up (bounded), connects, resolves the
    /// transparent UART characteristics and enables notifications.
    pub fn open(address: &str) -> Result<Self, TransportError> {
        let addr: BDAddr = address
            .parse()
            .map_err(|e| TransportError::Open(format!("Invalid BLE address {address:?}: {e}")))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| TransportError::Open(e.to_string()))?;

        let (central, peripheral, rx_char, product_name) =
            runtime.block_on(open_peripheral(addr))?;

        let (bytes_tx, bytes_rx) = mpsc::channel::<Vec<u8>>();
        let stream = runtime
            .block_on(peripheral.notifications())
            .map_err(|e| TransportError::Open(e.to_string()))?;
        runtime.spawn(async move {
            let mut stream = stream;
            while let Some(notification) = stream.next().await {
                if notification.uuid != ble::UART_TX {
                    continue;
                }
                if bytes_tx.send(notification.value).is_err() {
                    break;
                }
            }
            debug!("BLE notification stream ended");
        });

        Ok(Self {
            runtime,
            _central: central,
            peripheral,
            rx_char,
            notifications: Mutex::new(bytes_rx),
            info: TransportDeviceInfo {
                transport_type: TransportType::Ble,
                address: address.to_string(),
                product_name,
            },
            closed: AtomicBool::new(false),
        })
    }

    /// Read the standard Device Information service.
    ///
    /// The Radiation Alert units answer with details of the Bluetooth module
    /// (e.g. manufacturer "ISSC", model "BM70") rather than the counter
    /// itself. Missing characteristics come back as `None`.
    pub fn read_device_info(&self) -> DeviceInformation {
        let read = |uuid: Uuid| -> Option<String> {
            let characteristic = self
                .peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.service_uuid == device_info::SERVICE && c.uuid == uuid)?;
            let bytes = self.runtime.block_on(self.peripheral.read(&characteristic)).ok()?;
            Some(String::from_utf8_lossy(&bytes).trim_end_matches('\0').to_string())
        };

        DeviceInformation {
            manufacturer: read(device_info::MANUFACTURER),
            model_number: read(device_info::MODEL_NUMBER),
            serial_number: read(device_info::SERIAL_NUMBER),
            hw_revision: read(device_info::HW_REVISION),
            fw_revision: read(device_info::FW_REVISION),
            sw_revision: read(device_info::SW_REVISION),
        }
    }
}

impl Transport for BleTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.runtime
            .block_on(self.peripheral.write(&self.rx_char, bytes, WriteType::WithoutResponse))?;
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let receiver = self.notifications.lock();
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let slice = RECV_SLICE.min(deadline - now);
            match receiver.recv_timeout(slice) {
                Ok(chunk) => return Ok(chunk),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
        }
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.runtime
            .block_on(self.peripheral.is_connected())
            .unwrap_or(false)
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("Disconnecting BLE transport");
        if let Err(e) = self.runtime.block_on(self.peripheral.disconnect()) {
            warn!("BLE disconnect failed: {e}");
        }
        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Values read from the Device Information service
#[derive(Debug, Clone, Default)]
pub struct DeviceInformation {
    pub manufacturer: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub hw_revision: Option<String>,
    pub fw_revision: Option<String>,
    pub sw_revision: Option<String>,
}

async fn open_peripheral(
    addr: BDAddr,
) -> Result<(Adapter, Peripheral, Characteristic, Option<String>), TransportError> {
    let manager = Manager::new()
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?;
    let central = manager
        .adapters()
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::Open("No Bluetooth adapter found".into()))?;

    central
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?;
    let peripheral = wait_for_address(&central, addr).await;
    let _ = central.stop_scan().await;
    let peripheral = peripheral?;

    peripheral
        .connect()
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?;
    peripheral
        .discover_services()
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?;

    let characteristics = peripheral.characteristics();
    let tx_char = characteristics
        .iter()
        .find(|c| c.uuid == ble::UART_TX)
        .cloned()
        .ok_or_else(|| TransportError::Open("Transparent UART TX characteristic not found".into()))?;
    let rx_char = characteristics
        .iter()
        .find(|c| c.uuid == ble::UART_RX)
        .cloned()
        .ok_or_else(|| TransportError::Open("Transparent UART RX characteristic not found".into()))?;

    // Writes `01 00` to the TX client characteristic configuration
    // descriptor, turning on notifications
    peripheral
        .subscribe(&tx_char)
        .await
        .map_err(|e| TransportError::Open(e.to_string()))?;

    let product_name = peripheral
        .properties()
        .await
        .ok()
        .flatten()
        .and_then(|p| p.local_name);

    Ok((central, peripheral, rx_char, product_name))
}

async fn wait_for_address(central: &Adapter, addr: BDAddr) -> Result<Peripheral, TransportError> {
    let deadline = tokio::time::Instant::now() + CONNECT_SCAN_TIMEOUT;
    loop {
        let peripherals = central
            .peripherals()
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;
        if let Some(peripheral) = peripherals.into_iter().find(|p| p.address() == addr) {
            return Ok(peripheral);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TransportError::NotFound(format!(
                "No peripheral with address {addr} seen during scan"
            )));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
