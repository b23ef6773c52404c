//! Device discovery helpers
//!
//! The session layer takes an already-chosen address or vendor/product pair;
//! these helpers do the choosing. BLE scanning matches on the advertised
//! "Complete Local Name", HID discovery on the known vendor/product IDs.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use hidapi::HidApi;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::hid;

/// Scan for BLE peripherals whose local name contains `name_fragment`.
///
/// Returns the addresses of every match seen within `duration`; the list may
/// be empty. Scanning usually needs elevated privileges on Linux.
pub fn scan_ble(name_fragment: &str, duration: Duration) -> Result<Vec<String>, TransportError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| TransportError::Open(e.to_string()))?;

    runtime.block_on(async {
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
        tokio::time::sleep(duration).await;

        let mut matches = Vec::new();
        for peripheral in central
            .peripherals()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?
        {
            let name = peripheral
                .properties()
                .await
                .ok()
                .flatten()
                .and_then(|p| p.local_name);
            if let Some(name) = name {
                debug!("Scan result: {} ({name})", peripheral.address());
                if name.contains(name_fragment) {
                    matches.push(peripheral.address().to_string());
                }
            }
        }
        let _ = central.stop_scan().await;
        Ok(matches)
    })
}

/// Look for an attached Radiation Alert HID device.
///
/// Returns the vendor/product pair when one is present.
pub fn find_hid() -> Result<Option<(u16, u16)>, TransportError> {
    let api = HidApi::new().map_err(|e| TransportError::Open(e.to_string()))?;
    for device in api.device_list() {
        if device.vendor_id() == hid::VENDOR_ID && device.product_id() == hid::PRODUCT_ID {
            debug!(
                "Found Radiation Alert HID device at {}",
                device.path().to_string_lossy()
            );
            return Ok(Some((device.vendor_id(), device.product_id())));
        }
    }
    Ok(None)
}
