//! Session drivers that keep a device connection alive
//!
//! A session owns one transport, feeds its bytes through the decoding
//! engine, delivers records to the client callback, and speaks the
//! peripheral's ack protocol. Everything runs on the thread that calls
//! [`BleSession::spin`] / [`HidSession::spin`]; the only blocking points are
//! the transport receive and the callback itself, so callbacks must return
//! promptly or the peripheral's watchdog will time the link out.
//!
//! The UART peripheral has an empirically discovered quirk: commands are
//! latched rather than executed on receipt, and the ack (`X`) doubles as
//! "execute the latched command". Sending `[command, X]` works; `[X,
//! command]` does not. The drivers therefore flush queued commands first and
//! ack last, once per receive cycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use radalert_transport::protocol::{ble, cmd, hid};
use radalert_transport::{BleTransport, HidTransport, Transport, TransportError};

use crate::engine::Engine;
use crate::error::RadAlertError;
use crate::packet;
use crate::record::Record;

/// Commands a client may enqueue for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request a one-shot query record
    Query,
    /// Ask the device to drop the connection
    Terminate,
}

/// Callback invoked synchronously for every decoded record
pub type RecordCallback = Box<dyn FnMut(Record) + Send>;

/// Notifications between automatic query refreshes
const QUERY_REFRESH_INTERVAL: u64 = 5;

/// Consecutive receive timeouts before the idle warning
const IDLE_TIMEOUT_STRIKES: u32 = 3;

/// State shared with [`SessionHandle`]s on other threads
#[derive(Default)]
struct SessionShared {
    commands: Mutex<VecDeque<Command>>,
    closing: AtomicBool,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl SessionShared {
    fn enqueue(&self, command: Command) {
        self.commands.lock().push_back(command);
    }

    fn drain_commands(&self) -> Vec<Command> {
        self.commands.lock().drain(..).collect()
    }

    fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(transport) = self.transport.lock().as_ref() {
            let _ = transport.close();
        }
    }

    fn take_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().take()
    }

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().clone()
    }
}

/// Cloneable, thread-safe handle to a session.
///
/// Handles stay valid across reconnects of the session they came from.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Ask the session to request a one-shot query record. The resulting
    /// [`Record::Query`] arrives through the ordinary callback.
    pub fn trigger_query(&self) {
        self.shared.enqueue(Command::Query);
    }

    /// Ask the device to drop the connection. The session's `spin` will
    /// surface [`TransportError::Closed`] once the device obliges.
    pub fn terminate(&self) {
        self.shared.enqueue(Command::Terminate);
    }

    /// Close the session from any thread. Unblocks a pending receive and
    /// makes `spin` return cleanly.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

/// Bluetooth LE session speaking the transparent UART protocol
pub struct BleSession {
    callback: RecordCallback,
    shared: Arc<SessionShared>,
    engine: Engine,
    read_timeout: Duration,
    notifications: u64,
    timeout_strikes: u32,
}

impl BleSession {
    /// Create a session delivering records to `callback`. The callback is
    /// kept across disconnects and reconnects.
    pub fn new(callback: impl FnMut(Record) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            shared: Arc::new(SessionShared::default()),
            engine: Engine::new(packet::BLE_FRAME_LEN, packet::decode_ble_frame),
            read_timeout: ble::READ_TIMEOUT,
            notifications: 0,
            timeout_strikes: 0,
        }
    }

    /// Get a handle usable from other threads
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Connect to a device by BLE address
    pub fn connect(&mut self, address: &str) -> Result<(), RadAlertError> {
        let transport = BleTransport::open(address)?;
        self.attach(Arc::new(transport));
        Ok(())
    }

    /// Attach an already-open transport. Used by tests and custom stacks;
    /// `connect` is the usual entry point.
    pub fn attach(&mut self, transport: Arc<dyn Transport>) {
        self.disconnect();
        self.shared.closing.store(false, Ordering::SeqCst);
        *self.shared.transport.lock() = Some(transport);
    }

    /// Request a one-shot query record
    pub fn trigger_query(&self) {
        self.shared.enqueue(Command::Query);
    }

    /// Close the transport and reset all session state except the callback.
    /// Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(transport) = self.shared.take_transport() {
            let _ = transport.close();
        }
        self.engine.reset();
        self.shared.commands.lock().clear();
        self.notifications = 0;
        self.timeout_strikes = 0;
    }

    /// Service the connection until it ends.
    ///
    /// Blocks the calling thread; records flow to the callback from here.
    /// Returns `Ok(())` after [`SessionHandle::shutdown`] and the transport
    /// error otherwise. The session is back in the disconnected state either
    /// way and may be `connect`ed again.
    pub fn spin(&mut self) -> Result<(), RadAlertError> {
        let transport = self
            .shared
            .current_transport()
            .ok_or(RadAlertError::NotConnected)?;
        let result = self.run(&transport);
        let requested = self.shared.closing.load(Ordering::SeqCst);
        self.disconnect();
        match result {
            Err(RadAlertError::Transport(TransportError::Closed)) if requested => Ok(()),
            other => other,
        }
    }

    fn run(&mut self, transport: &Arc<dyn Transport>) -> Result<(), RadAlertError> {
        loop {
            if self.shared.closing.load(Ordering::SeqCst) {
                return Err(TransportError::Closed.into());
            }
            let chunk = transport.receive(self.read_timeout)?;
            if chunk.is_empty() {
                self.timeout_strikes += 1;
                if self.timeout_strikes == IDLE_TIMEOUT_STRIKES {
                    warn!(
                        "No notifications for {} consecutive read timeouts",
                        self.timeout_strikes
                    );
                }
                continue;
            }
            self.timeout_strikes = 0;

            self.notifications += 1;
            if self.notifications % QUERY_REFRESH_INTERVAL == 0 {
                // Keep the query snapshot fresh alongside the stream
                self.shared.enqueue(Command::Query);
            }

            self.engine.extend(&chunk);
            let records = self.engine.drain();
            let decoded = records.len();
            for record in records {
                if record.reserved_anomaly() {
                    debug!("Reserved fields deviate from their usual values: {record:?}");
                }
                (self.callback)(record);
            }

            // Commands first so the peripheral latches them, then the ack
            // that executes them and keeps the watchdog fed
            for command in self.shared.drain_commands() {
                let ch = match command {
                    Command::Query => cmd::QUERY,
                    Command::Terminate => cmd::TERMINATE,
                };
                transport.send(format!("{ch}{}", cmd::ENDL).as_bytes())?;
            }
            if decoded > 0 {
                transport.send(format!("{}{}", cmd::ACK, cmd::ENDL).as_bytes())?;
            }
        }
    }
}

/// USB HID session
///
/// Status packets stream from the interrupt endpoint; queries are pulled
/// explicitly through a feature report, so `Command::Query` is serviced
/// locally instead of being written to the device.
pub struct HidSession {
    callback: RecordCallback,
    shared: Arc<SessionShared>,
    engine: Engine,
    read_timeout: Duration,
    reads: u64,
    timeout_strikes: u32,
}

impl HidSession {
    /// Create a session delivering records to `callback`
    pub fn new(callback: impl FnMut(Record) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            shared: Arc::new(SessionShared::default()),
            engine: Engine::new(packet::HID_STATUS_LEN, packet::decode_hid_frame),
            read_timeout: hid::READ_TIMEOUT,
            reads: 0,
            timeout_strikes: 0,
        }
    }

    /// Get a handle usable from other threads
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Connect to a device by vendor/product ID pair
    pub fn connect(&mut self, vid: u16, pid: u16) -> Result<(), RadAlertError> {
        let transport = HidTransport::open(vid, pid)?;
        self.attach(Arc::new(transport));
        Ok(())
    }

    /// Attach an already-open transport
    pub fn attach(&mut self, transport: Arc<dyn Transport>) {
        self.disconnect();
        self.shared.closing.store(false, Ordering::SeqCst);
        *self.shared.transport.lock() = Some(transport);
    }

    /// Request a one-shot query record
    pub fn trigger_query(&self) {
        self.shared.enqueue(Command::Query);
    }

    /// Close the transport and reset all session state except the callback.
    /// Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(transport) = self.shared.take_transport() {
            let _ = transport.close();
        }
        self.engine.reset();
        self.shared.commands.lock().clear();
        self.reads = 0;
        self.timeout_strikes = 0;
    }

    /// Service the connection until it ends. Semantics match
    /// [`BleSession::spin`].
    pub fn spin(&mut self) -> Result<(), RadAlertError> {
        let transport = self
            .shared
            .current_transport()
            .ok_or(RadAlertError::NotConnected)?;
        let result = self.run(&transport);
        let requested = self.shared.closing.load(Ordering::SeqCst);
        self.disconnect();
        match result {
            Err(RadAlertError::Transport(TransportError::Closed)) if requested => Ok(()),
            other => other,
        }
    }

    fn run(&mut self, transport: &Arc<dyn Transport>) -> Result<(), RadAlertError> {
        let mut needs_start = true;
        loop {
            if self.shared.closing.load(Ordering::SeqCst) {
                return Err(TransportError::Closed.into());
            }
            if needs_start {
                transport.send(&hid::START_SENTINEL)?;
                needs_start = false;
            }
            let chunk = transport.receive(self.read_timeout)?;
            if chunk.is_empty() {
                self.timeout_strikes += 1;
                if self.timeout_strikes == IDLE_TIMEOUT_STRIKES {
                    warn!(
                        "No reports for {} consecutive read timeouts",
                        self.timeout_strikes
                    );
                }
                // Nudge the device back into streaming
                needs_start = true;
                continue;
            }
            self.timeout_strikes = 0;
            self.reads += 1;

            self.engine.extend(&chunk);
            for record in self.engine.drain() {
                if record.reserved_anomaly() {
                    debug!("Reserved fields deviate from their usual values: {record:?}");
                }
                (self.callback)(record);
                transport.send(&hid::ACK_SENTINEL)?;
            }

            let mut want_query = self.reads % QUERY_REFRESH_INTERVAL == 0;
            for command in self.shared.drain_commands() {
                match command {
                    Command::Query => want_query = true,
                    Command::Terminate => {
                        // No terminate command exists on HID; drop the link
                        // locally instead
                        info!("Terminate requested; closing the HID transport");
                        let _ = transport.close();
                    }
                }
            }
            if want_query {
                self.fetch_query(transport)?;
            }
        }
    }

    /// Pull a query snapshot via feature report and deliver it
    fn fetch_query(&mut self, transport: &Arc<dyn Transport>) -> Result<(), RadAlertError> {
        let payload = transport.read_query_report()?;
        match packet::decode_hid_query(&payload) {
            Ok(query) => {
                let record = Record::Query(query);
                if record.reserved_anomaly() {
                    debug!("Reserved fields deviate from their usual values: {record:?}");
                }
                (self.callback)(record);
            }
            Err(err) => warn!("Discarding undecodable query report: {err}"),
        }
        // The feature-report read knocks the device out of streaming mode
        transport.send(&hid::START_SENTINEL)?;
        Ok(())
    }
}
