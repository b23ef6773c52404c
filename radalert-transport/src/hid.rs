//! USB HID transport implementation
//!
//! The HID endpoint has one quirk worth knowing about: interrupt reads
//! re-report the last 15-byte payload over and over until the device produces
//! a new one. [`HidTransport::receive`] therefore deduplicates consecutive
//! identical reports and only surfaces a chunk when the payload changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::hid;
use crate::{Transport, TransportDeviceInfo, TransportType};

/// HID transport for a directly attached Radiation Alert unit
pub struct HidTransport {
    /// hidapi handles are Send but not Sync
    device: Mutex<HidDevice>,
    dedup: Mutex<PollDeduper>,
    info: TransportDeviceInfo,
    closed: AtomicBool,
}

impl HidTransport {
    /// Open a device by vendor/product ID pair
    pub fn open(vid: u16, pid: u16) -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Open(e.to_string()))?;
        let device = api
            .open(vid, pid)
            .map_err(|e| TransportError::Open(e.to_string()))?;
        let product_name = device.get_product_string().ok().flatten();

        debug!("Opened HID device {vid:04x}:{pid:04x} ({product_name:?})");
        Ok(Self {
            device: Mutex::new(device),
            dedup: Mutex::new(PollDeduper::default()),
            info: TransportDeviceInfo {
                transport_type: TransportType::Hid,
                address: format!("{vid:04x}:{pid:04x}"),
                product_name,
            },
            closed: AtomicBool::new(false),
        })
    }
}

impl Transport for HidTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let device = self.device.lock();
        device.write(bytes)?;
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 64];
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            let len = {
                let device = self.device.lock();
                device.read_timeout(&mut buf, hid::POLL_SLICE_MS)?
            };
            if len > 0 {
                if let Some(fresh) = self.dedup.lock().accept(&buf[..len]) {
                    return Ok(fresh);
                }
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
        }
    }

    fn read_query_report(&self) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut buf = vec![0u8; hid::QUERY_LEN + 1];
        buf[0] = hid::QUERY_REPORT_ID;
        let len = {
            let device = self.device.lock();
            device.get_feature_report(&mut buf)?
        };
        if len < hid::QUERY_LEN {
            return Err(TransportError::Io(format!(
                "Short feature report: {len} bytes"
            )));
        }
        // Strip the leading report id
        Ok(buf[1..=hid::QUERY_LEN].to_vec())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let device = self.device.lock();
        device.get_product_string().is_ok()
    }

    fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("HID transport closed");
        }
        Ok(())
    }
}

/// Suppresses the endpoint's repeated reports.
///
/// `accept` returns the payload only when it differs from the previous one.
#[derive(Default)]
struct PollDeduper {
    last: Option<Vec<u8>>,
}

impl PollDeduper {
    fn accept(&mut self, report: &[u8]) -> Option<Vec<u8>> {
        if self.last.as_deref() == Some(report) {
            return None;
        }
        self.last = Some(report.to_vec());
        Some(report.to_vec())
    }
}
