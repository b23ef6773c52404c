//! Protocol constants for Radiation Alert devices
//!
//! The Monitor 200, Ranger and 1000EC share one undocumented telemetry
//! protocol carried over two physical links: a Microchip "transparent UART"
//! BLE service and a USB HID endpoint. The values collected here come from
//! observing real devices; none of them are published by the vendor.

use std::time::Duration;

use uuid::Uuid;

/// Bluetooth LE transparent UART service
pub mod ble {
    use super::*;

    /// Transparent UART service (ISSC / Microchip vendor service)
    pub const UART_SERVICE: Uuid = Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);
    /// TX characteristic: peripheral-to-client notifications
    pub const UART_TX: Uuid = Uuid::from_u128(0x49535343_1e4d_4bd9_ba61_23c647249616);
    /// RX characteristic: client-to-peripheral writes
    pub const UART_RX: Uuid = Uuid::from_u128(0x49535343_8841_43f4_a8d4_ecbe34729bb3);
    /// Client characteristic configuration descriptor; `01 00` enables
    /// notifications (written by the subscribe call)
    pub const CCCD: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

    /// Both packet types are 16 bytes on the wire
    pub const FRAME_LEN: usize = 16;

    /// Per-read timeout while servicing notifications. The device pushes one
    /// status packet per second, so anything in the 4-10 s band works.
    pub const READ_TIMEOUT: Duration = Duration::from_millis(8500);

    /// Substring of the "Complete Local Name" advertised by Monitor 200 units
    pub const SCAN_NAME: &str = "Mon200";
}

/// Standard Device Information service (informational only; the Radiation
/// Alert units report details of their Bluetooth module, not the counter)
pub mod device_info {
    use super::*;

    pub const SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
    pub const MANUFACTURER: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);
    pub const MODEL_NUMBER: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
    pub const SERIAL_NUMBER: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
    pub const HW_REVISION: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
    pub const FW_REVISION: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
    pub const SW_REVISION: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);
}

/// Serial commands understood by the UART session. One ASCII character,
/// newline-terminated. Commands are latched by the peripheral and executed
/// when the following ack arrives.
pub mod cmd {
    /// Request a one-shot query packet
    pub const QUERY: char = '?';
    /// Acknowledge the last notification (and execute any latched command)
    pub const ACK: char = 'X';
    /// Terminate the connection immediately
    pub const TERMINATE: char = 'Z';
    /// Line terminator appended to every command
    pub const ENDL: char = '\n';
}

/// USB HID endpoint
pub mod hid {
    use super::*;

    /// SE International vendor ID
    pub const VENDOR_ID: u16 = 0x1781;
    /// Radiation Alert product ID
    pub const PRODUCT_ID: u16 = 0x08E9;

    /// Written once to begin streaming status reports
    pub const START_SENTINEL: [u8; 8] = [0x46, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    /// Written to acknowledge a decoded status report
    pub const ACK_SENTINEL: [u8; 8] = [0x00; 8];

    /// Interrupt endpoint status report length
    pub const STATUS_LEN: usize = 15;
    /// Query payload length (feature report minus the report id byte)
    pub const QUERY_LEN: usize = 64;
    /// Feature report id used for query retrieval
    pub const QUERY_REPORT_ID: u8 = 0x00;

    /// Per-receive timeout while streaming
    pub const READ_TIMEOUT: Duration = Duration::from_secs(4);
    /// Poll slice for the interrupt endpoint; the endpoint re-reports the
    /// last payload, so short reads plus dedup approximate "block on change"
    pub const POLL_SLICE_MS: i32 = 200;
}
