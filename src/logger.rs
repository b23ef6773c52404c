//! Logging backend and console printer
//!
//! The session callback feeds a [`LogBackend`]; the console logger and the
//! uploaders read aggregated views from it on their own threads. Callbacks
//! must return quickly, so the backend does nothing but lock, update a few
//! filters and return.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use radalert::{FirFilter, Record, Reducer, Status};

/// Sliding count windows tracked by the backend, in seconds
const WINDOWS: [usize; 4] = [10, 60, 300, 3600];

struct BackendState {
    last_update: Option<Instant>,
    conversion: Option<f64>,
    battery: Option<f64>,
    /// Count sums over each window; one sample per status record
    windows: Vec<FirFilter>,
    seeded: bool,
}

/// Aggregated device state shared between the session callback and the
/// logging threads
pub struct LogBackend {
    state: Mutex<BackendState>,
}

impl Default for LogBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                last_update: None,
                conversion: None,
                battery: None,
                windows: WINDOWS
                    .iter()
                    .map(|&n| FirFilter::new(n, Reducer::Sum))
                    .collect(),
                seeded: false,
            }),
        }
    }

    /// Session callback entry point
    pub fn on_record(&self, record: &Record) {
        match record {
            Record::Status(status) => self.on_status(status),
            Record::Query(query) => {
                self.state.lock().conversion = Some(f64::from(query.conversion_factor()));
            }
        }
    }

    fn on_status(&self, status: &Status) {
        let mut state = self.state.lock();
        state.last_update = Some(Instant::now());
        state.battery = status.battery_percent();

        // Seed the windows from the device's own rolling average so the
        // first minutes of output are not dominated by an empty filter.
        // One-shot; BLE only, since HID carries no cpm.
        if !state.seeded {
            if let Ok(cpm) = status.cpm() {
                let per_second = f64::from(cpm) / 60.0;
                for window in &mut state.windows {
                    window.push(per_second);
                }
            }
            state.seeded = true;
        }

        for window in &mut state.windows {
            window.push(f64::from(status.cps()));
        }
    }

    /// Counts-per-minute estimate from window `index`, or `None` before any
    /// data arrived
    pub fn cpm_average(&self, index: usize) -> Option<f64> {
        let state = self.state.lock();
        let window = state.windows.get(index)?;
        let sum = window.value()?;
        Some(sum / window.len() as f64 * 60.0)
    }

    /// CPM-per-mR/h conversion factor from the latest query record
    pub fn conversion(&self) -> Option<f64> {
        self.state.lock().conversion
    }

    /// Battery percentage from the latest status record
    pub fn battery(&self) -> Option<f64> {
        self.state.lock().battery
    }

    /// Time since the last status record
    pub fn staleness(&self) -> Option<Duration> {
        self.state.lock().last_update.map(|t| t.elapsed())
    }

    /// Per-window (sample count, count sum) pairs
    fn window_snapshot(&self) -> Vec<(usize, Option<f64>)> {
        let state = self.state.lock();
        state.windows.iter().map(|w| (w.len(), w.value())).collect()
    }
}

/// Prints a TSV table of the backend's aggregates on an interval.
///
/// Runs on its own thread; `stop` ends the loop.
pub struct ConsoleLogger {
    backend: Arc<LogBackend>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl ConsoleLogger {
    pub fn new(backend: Arc<LogBackend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with `spin`; clear it to stop the logger
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    fn header() -> String {
        let mut table = vec!["time".to_string(), "battery".into(), "cpm/(mR/h)".into()];
        for seconds in WINDOWS {
            let (span, unit) = timespan(seconds as f64);
            table.push(format!("{span:.0}{unit}-cnt"));
            table.push(format!("{span:.0}{unit}-cpm"));
        }
        table.join("\t")
    }

    fn row(&self) -> Option<String> {
        // Stale data prints nothing rather than repeating old numbers
        if self.backend.staleness()? > self.interval {
            return None;
        }

        let mut table = vec![
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            self.backend
                .battery()
                .map_or_else(|| "-".into(), |b| format!("{b:.0}%")),
            self.backend
                .conversion()
                .map_or_else(|| "-".into(), |c| format!("{c:.0}")),
        ];
        for (len, sum) in self.backend.window_snapshot() {
            match sum {
                Some(sum) => {
                    table.push(format!("{sum:.0}"));
                    table.push(format!("{:.1}", sum / len as f64 * 60.0));
                }
                None => {
                    table.push(String::new());
                    table.push(String::new());
                }
            }
        }
        Some(table.join("\t"))
    }

    /// Print the header once, then a row per interval until stopped
    pub fn spin(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            println!("{}", Self::header());
        }
        while self.running.load(Ordering::SeqCst) {
            if let Some(row) = self.row() {
                println!("{row}");
            }
            std::thread::sleep(self.interval);
        }
    }
}

fn timespan(seconds: f64) -> (f64, &'static str) {
    if seconds <= 60.0 {
        return (seconds, "s");
    }
    let minutes = seconds / 60.0;
    if minutes <= 60.0 {
        return (minutes, "m");
    }
    let hours = minutes / 60.0;
    if hours <= 24.0 {
        return (hours, "h");
    }
    (hours / 24.0, "d")
}

#[cfg(test)]
mod tests {
    use super::*;
    use radalert::packet;

    fn status(cps: u32, cpm: u32, id: u8) -> Record {
        let mut frame = [0u8; 16];
        frame[0..4].copy_from_slice(&cps.to_le_bytes());
        frame[10..12].copy_from_slice(&(cpm as u16).to_le_bytes());
        frame[15] = id;
        packet::decode_ble_frame(&frame).unwrap()
    }

    #[test]
    fn backend_accumulates_window_sums() {
        let backend = LogBackend::new();
        for i in 0..10 {
            backend.on_record(&status(60, 0, i));
        }
        // Zero cpm seeds the windows with one zero sample, then ten
        // 60-count seconds arrive
        let avg = backend.cpm_average(0).unwrap();
        assert!(avg > 0.0);
        assert!(backend.staleness().unwrap() < Duration::from_secs(1));
    }

    #[test]
    fn backend_seeds_once_from_device_cpm() {
        let backend = LogBackend::new();
        backend.on_record(&status(0, 1200, 0));
        // Window holds the seed (1200/60 = 20) plus the 0-cps sample
        let (len, sum) = backend.window_snapshot()[0];
        assert_eq!(len, 2);
        assert_eq!(sum, Some(20.0));

        // A second record must not seed again
        backend.on_record(&status(0, 1200, 1));
        let (len, _) = backend.window_snapshot()[0];
        assert_eq!(len, 3);
    }

    #[test]
    fn timespan_picks_readable_units() {
        assert_eq!(timespan(10.0), (10.0, "s"));
        assert_eq!(timespan(300.0), (5.0, "m"));
        assert_eq!(timespan(3600.0), (60.0, "m"));
        assert_eq!(timespan(7200.0), (2.0, "h"));
    }
}
