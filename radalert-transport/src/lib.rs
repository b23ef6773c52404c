//! Transport layer for Radiation Alert geiger counter communication
//!
//! This crate provides a uniform byte-stream interface over the two links
//! the Radiation Alert series supports:
//!
//! - Bluetooth LE "transparent UART" (Monitor 200 and friends)
//! - USB HID (interrupt reports plus a feature report for queries)
//!
//! Packet framing and decoding live one level up, in the `radalert` crate;
//! everything here deals in opaque chunks of bytes.

pub mod discovery;
pub mod error;
pub mod protocol;

mod ble;
mod hid;

pub use ble::{BleTransport, DeviceInformation};
pub use error::TransportError;
pub use hid::HidTransport;

use std::time::Duration;

/// The core transport trait - both backends implement this
///
/// Methods take `&self`; implementations use interior mutability so a session
/// can keep reading on one thread while another thread closes the link.
pub trait Transport: Send + Sync {
    /// Send raw bytes to the device. Best-effort; fails with
    /// [`TransportError::Io`] when the write does not complete.
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block until new bytes arrive, returning them as an opaque chunk.
    ///
    /// Returns an empty chunk when the timeout expires and
    /// [`TransportError::Closed`] when the link has dropped. Chunks are not
    /// guaranteed to align with packet boundaries.
    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Pull the 64-byte query payload via a feature-report read.
    ///
    /// Only the HID link carries queries out-of-band; the default
    /// implementation reports [`TransportError::NotSupported`].
    fn read_query_report(&self) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::NotSupported)
    }

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;

    /// Check if the transport is still connected
    fn is_connected(&self) -> bool;

    /// Close the transport. Idempotent; releases all resources and unblocks
    /// any pending [`Transport::receive`] with [`TransportError::Closed`].
    fn close(&self) -> Result<(), TransportError>;
}

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Bluetooth LE transparent UART
    Ble,
    /// USB HID
    Hid,
}

/// Device identification information
#[derive(Debug, Clone)]
pub struct TransportDeviceInfo {
    /// Transport type
    pub transport_type: TransportType,
    /// BLE address or `vid:pid` pair, depending on the transport
    pub address: String,
    /// Product name if available
    pub product_name: Option<String>,
}
