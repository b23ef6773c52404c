//! Client library for SE International Radiation Alert geiger counters
//!
//! The Monitor 200, Ranger and 1000EC push a proprietary binary telemetry
//! stream over Bluetooth LE ("transparent UART") or USB HID. This crate
//! decodes that stream into typed records and drives the session protocol
//! the devices expect - per-notification acks, latched commands, periodic
//! query refreshes and byte-wise resynchronization after corruption.
//!
//! ```no_run
//! use radalert::{BleSession, Record};
//!
//! let mut session = BleSession::new(|record| match record {
//!     Record::Status(status) => println!("cps = {}", status.cps()),
//!     Record::Query(query) => println!("conversion = {}", query.conversion_factor()),
//! });
//! session.connect("00:11:22:33:44:55")?;
//! session.spin()?; // blocks; records flow to the callback
//! # Ok::<(), radalert::RadAlertError>(())
//! ```
//!
//! Byte-level transports live in [`radalert_transport`], re-exported here as
//! [`transport`].

pub mod error;
pub mod filter;
pub mod packet;
pub mod record;
pub mod session;

mod engine;

pub use error::{DecodeError, NotAvailable, RadAlertError};
pub use filter::{FirFilter, IirFilter, Reducer};
pub use record::{AlarmState, DeviceSettings, DisplayMode, Query, Record, Status};
pub use session::{BleSession, Command, HidSession, SessionHandle};

pub use radalert_transport as transport;
