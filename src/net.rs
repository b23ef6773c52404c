//! Upload clients for public radiation-monitoring services
//!
//! Thin wrappers over the HTTP APIs of GMC.MAP, Radmon and uRadMonitor,
//! plus the interval loops that feed them from the [`LogBackend`]. All of
//! this lives behind the `upload` cargo feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::logger::LogBackend;

const GMCMAP_URL: &str = "http://www.GMCmap.com/log2.asp";
const RADMON_URL: &str = "http://radmon.org/radmon.php";
const URADMONITOR_URL: &str = "http://data.uradmonitor.com/api/v1/upload/exp";

/// Upload client for the GMC.MAP service
pub struct Gmcmap {
    client: reqwest::blocking::Client,
    account_id: String,
    geiger_id: String,
}

impl Gmcmap {
    pub fn new(account_id: String, geiger_id: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            account_id,
            geiger_id,
        }
    }

    /// Send current CPM, averaged CPM and dose rate
    pub fn send_values(
        &self,
        cpm: Option<f64>,
        acpm: Option<f64>,
        usv: Option<f64>,
    ) -> Result<()> {
        let mut params: Vec<(&str, String)> = vec![
            ("AID", self.account_id.clone()),
            ("GID", self.geiger_id.clone()),
        ];
        if let Some(cpm) = cpm {
            params.push(("CPM", format!("{cpm:.2}")));
        }
        if let Some(acpm) = acpm {
            params.push(("ACPM", format!("{acpm:.2}")));
        }
        if let Some(usv) = usv {
            params.push(("uSV", format!("{usv:.5}")));
        }
        self.client
            .get(GMCMAP_URL)
            .query(&params)
            .send()
            .and_then(|r| r.error_for_status())
            .context("GMC.MAP upload failed")?;
        Ok(())
    }
}

/// Upload client for the Radmon service
///
/// API docs: <https://radmon.org/index.php/forum/howtos-and-faqs/864-radmon-org-api>
pub struct Radmon {
    client: reqwest::blocking::Client,
    user: String,
    password: String,
}

impl Radmon {
    pub fn new(user: String, password: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            user,
            password,
        }
    }

    pub fn send_values(&self, cpm: f64) -> Result<()> {
        let params: Vec<(&str, String)> = vec![
            ("function", "submit".into()),
            ("user", self.user.clone()),
            ("password", self.password.clone()),
            ("value", format!("{cpm:.2}")),
            ("unit", "CPM".into()),
        ];
        self.client
            .get(RADMON_URL)
            .query(&params)
            .send()
            .and_then(|r| r.error_for_status())
            .context("Radmon upload failed")?;
        Ok(())
    }
}

/// Upload client for the uRadMonitor EXP endpoint
///
/// Parameters ride in the URL path as `/key/value` pairs; identity rides in
/// headers.
pub struct URadMonitor {
    client: reqwest::blocking::Client,
    user_id: String,
    user_hash: String,
    device_id: String,
    /// Tube type id; 0 = unknown
    tube: u8,
}

impl URadMonitor {
    pub fn new(user_id: String, user_hash: String, device_id: String, tube: u8) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            user_id,
            user_hash,
            device_id,
            tube,
        }
    }

    pub fn send_values(&self, cpm: f64, unixtime: u64) -> Result<()> {
        // Parameter ids from the vendor's expProtocol.h: 1 = time, 11 = cpm,
        // 16 = tube
        let path = format!("/1/{unixtime}/11/{cpm:.2}/16/{}", self.tube);
        self.client
            .get(format!("{URADMONITOR_URL}{path}"))
            .header("X-User-id", &self.user_id)
            .header("X-User-hash", &self.user_hash)
            .header("X-Device-id", &self.device_id)
            .send()
            .and_then(|r| r.error_for_status())
            .context("uRadMonitor upload failed")?;
        Ok(())
    }
}

/// Uploader wiring read from the environment
pub struct UploadConfig {
    pub gmcmap: Option<(String, String, Duration)>,
    pub radmon: Option<(String, String, Duration)>,
    pub uradmonitor: Option<(String, String, String, Duration)>,
}

impl UploadConfig {
    /// Read `GMCMAP_ACCT_ID` / `GMCMAP_GC_ID` / `GMCMAP_INTERVAL`,
    /// `RADMON_USER_ID` / `RADMON_DATA_PW` / `RADMON_INTERVAL` and
    /// `URADMONITOR_USER_ID` / `URADMONITOR_USER_HASH` /
    /// `URADMONITOR_DEVICE_ID` / `URADMONITOR_INTERVAL`. A service is
    /// enabled when all of its ids are present; intervals default to 300 s.
    pub fn from_env() -> Self {
        let interval = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(Duration::from_secs(300), Duration::from_secs)
        };
        let pair = |a: &str, b: &str| {
            match (std::env::var(a), std::env::var(b)) {
                (Ok(a), Ok(b)) => Some((a, b)),
                _ => None,
            }
        };
        Self {
            gmcmap: pair("GMCMAP_ACCT_ID", "GMCMAP_GC_ID")
                .map(|(a, g)| (a, g, interval("GMCMAP_INTERVAL"))),
            radmon: pair("RADMON_USER_ID", "RADMON_DATA_PW")
                .map(|(u, p)| (u, p, interval("RADMON_INTERVAL"))),
            uradmonitor: pair("URADMONITOR_USER_ID", "URADMONITOR_USER_HASH")
                .zip(std::env::var("URADMONITOR_DEVICE_ID").ok())
                .map(|((u, h), d)| (u, h, d, interval("URADMONITOR_INTERVAL"))),
        }
    }
}

/// Spawn the uploader threads configured in the environment
pub fn spawn_uploaders(
    config: UploadConfig,
    backend: &Arc<LogBackend>,
    running: &Arc<AtomicBool>,
) {
    if let Some((account_id, geiger_id, interval)) = config.gmcmap {
        let uploader = Gmcmap::new(account_id, geiger_id);
        let backend = Arc::clone(backend);
        let running = Arc::clone(running);
        std::thread::spawn(move || {
            upload_loop(interval, &running, || {
                let Some(short) = backend.cpm_average(1) else {
                    return Ok(());
                };
                let long = backend.cpm_average(2);
                let usv = backend.conversion().map(|conv| short / conv * 10.0);
                uploader.send_values(Some(short), long, usv)
            });
        });
    }

    if let Some((user, password, interval)) = config.radmon {
        let uploader = Radmon::new(user, password);
        let backend = Arc::clone(backend);
        let running = Arc::clone(running);
        std::thread::spawn(move || {
            upload_loop(interval, &running, || {
                match backend.cpm_average(2) {
                    Some(cpm) => uploader.send_values(cpm),
                    None => Ok(()),
                }
            });
        });
    }

    if let Some((user_id, user_hash, device_id, interval)) = config.uradmonitor {
        let uploader = URadMonitor::new(user_id, user_hash, device_id, 0);
        let backend = Arc::clone(backend);
        let running = Arc::clone(running);
        std::thread::spawn(move || {
            upload_loop(interval, &running, || {
                let Some(cpm) = backend.cpm_average(2) else {
                    return Ok(());
                };
                let unixtime = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                uploader.send_values(cpm, unixtime)
            });
        });
    }
}

fn upload_loop(interval: Duration, running: &AtomicBool, mut send: impl FnMut() -> Result<()>) {
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = send() {
            warn!("{e:#}");
        }
    }
}
