//! Client library error types

use radalert_transport::TransportError;
use thiserror::Error;

/// Errors from packet decoding and validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes yet; wait for more
    #[error("Frame too short: expected {expected} bytes, got {got}")]
    FrameShort { expected: usize, got: usize },

    /// Structural parse failure
    #[error("Malformed packet: {0}")]
    Malformed(&'static str),

    /// A validator bound was violated
    #[error("{field} = {value} is outside the expected range")]
    OutOfRange { field: &'static str, value: i64 },

    /// The rolling packet id skipped or went backward
    #[error("Packet ID jump: {from} to {to}")]
    SeqJump { from: u8, to: u8 },
}

/// Error returned by record accessors for fields the current transport does
/// not carry (e.g. `cpm` on a HID status packet)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{0} is not available on this transport")]
pub struct NotAvailable(pub &'static str);

/// Errors surfaced to session clients
#[derive(Error, Debug)]
pub enum RadAlertError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session has no live transport; call `connect` first
    #[error("Session is not connected")]
    NotConnected,
}
