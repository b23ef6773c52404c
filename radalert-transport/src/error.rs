//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Failed to open transport: {0}")]
    Open(String),

    #[error("Transport I/O error: {0}")]
    Io(String),

    #[error("Transport closed")]
    Closed,

    #[error("Operation not supported by this transport")]
    NotSupported,
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        TransportError::Io(e.to_string())
    }
}

impl From<btleplug::Error> for TransportError {
    fn from(e: btleplug::Error) -> Self {
        match e {
            btleplug::Error::NotConnected => TransportError::Closed,
            btleplug::Error::DeviceNotFound => TransportError::NotFound(e.to_string()),
            other => TransportError::Io(other.to_string()),
        }
    }
}
