//! Byte-stream decoding engine shared by the session drivers
//!
//! Bytes arriving from a transport are not guaranteed to align with packet
//! boundaries - a BLE link interrupted mid-packet resumes wherever it
//! pleases, and HID reports can be stale right after a reconnect. The engine
//! therefore runs a small state machine over its receive buffer:
//!
//! - `Syncing`: decode at offset 0; on failure drop a single byte and retry,
//!   on success count it. Five consecutive good frames mean the stream is
//!   aligned again.
//! - `Active`: decode frame after frame; any failure (including a packet-id
//!   jump) falls back to `Syncing` and leaves the remaining bytes for the
//!   next receive cycle.
//!
//! Records decoded in either state are handed back for delivery.

use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::record::Record;

/// Consecutive good frames required to consider the stream aligned
const SYNC_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineState {
    Syncing,
    Active,
}

pub(crate) struct Engine {
    frame_len: usize,
    decode: fn(&[u8]) -> Result<Record, DecodeError>,
    buf: Vec<u8>,
    state: EngineState,
    sync_count: u32,
    last_id: Option<u8>,
}

impl Engine {
    pub fn new(frame_len: usize, decode: fn(&[u8]) -> Result<Record, DecodeError>) -> Self {
        Self {
            frame_len,
            decode,
            buf: Vec::new(),
            state: EngineState::Syncing,
            sync_count: 0,
            last_id: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Drop all buffered bytes and start over from `Syncing`
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = EngineState::Syncing;
        self.sync_count = 0;
        self.last_id = None;
    }

    /// Append a received chunk to the buffer
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode as much of the buffer as possible, returning the records in
    /// arrival order.
    pub fn drain(&mut self) -> Vec<Record> {
        let mut records = Vec::new();
        while self.buf.len() >= self.frame_len {
            match self.state {
                EngineState::Syncing => match self.try_decode() {
                    Ok(record) => {
                        self.consume_frame();
                        self.sync_count += 1;
                        records.push(record);
                        if self.sync_count >= SYNC_THRESHOLD {
                            debug!(
                                "Stream aligned after {} consecutive frames",
                                self.sync_count
                            );
                            self.state = EngineState::Active;
                        }
                    }
                    Err(err) => {
                        debug!("Resync: dropping one byte ({err})");
                        self.buf.remove(0);
                        self.sync_count = 0;
                        self.last_id = None;
                    }
                },
                EngineState::Active => match self.try_decode() {
                    Ok(record) => {
                        self.consume_frame();
                        records.push(record);
                    }
                    Err(err) => {
                        warn!("Decode failed, resynchronizing: {err}");
                        self.state = EngineState::Syncing;
                        self.sync_count = 0;
                        self.last_id = None;
                        // Leave the bytes in place; the next receive cycle
                        // retries them under Syncing rules
                        break;
                    }
                },
            }
        }
        records
    }

    /// Decode the frame at offset 0 without consuming it, enforcing the
    /// rolling-id continuity check for status packets.
    fn try_decode(&mut self) -> Result<Record, DecodeError> {
        let record = (self.decode)(&self.buf[..self.frame_len])?;
        if let Record::Status(status) = &record {
            if let Some(prev) = self.last_id {
                if prev.wrapping_add(1) != status.id() {
                    self.last_id = None;
                    return Err(DecodeError::SeqJump {
                        from: prev,
                        to: status.id(),
                    });
                }
            }
            self.last_id = Some(status.id());
        }
        Ok(record)
    }

    fn consume_frame(&mut self) {
        self.buf.drain(..self.frame_len);
    }
}
