//! Typed records decoded from the telemetry stream
//!
//! Two packet kinds exist: [`Status`] (pushed once per second) and [`Query`]
//! (pulled on request). Both transports produce the same record types, but
//! not every field travels on every link - the BLE status packet carries cpm
//! and battery state where the HID one does not, and the HID query packet
//! carries the full settings block where the BLE one exposes only three
//! fields. Accessors for absent fields return [`NotAvailable`].
//!
//! Records are immutable once constructed; every field is a pure function of
//! the raw packet bytes.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::NotAvailable;

/// Display mode reported in the status packet.
///
/// The mode selects both the unit label on the LCD and the scaling applied
/// to the raw on-screen value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayMode {
    /// Counts per minute
    Cpm,
    /// Counts per second (raw value is centi-cps)
    Cps,
    /// µR/h
    MicroRoentgenPerHour,
    /// µSv/h (raw value is nSv/h)
    MicroSievertPerHour,
    /// Accumulated counts (timed-count mode)
    Counts,
    /// mR/h (raw value is µR/h)
    MilliRoentgenPerHour,
}

impl DisplayMode {
    /// Map the wire value to a mode. Only six values are known.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Cpm),
            1 => Some(Self::Cps),
            2 => Some(Self::MicroRoentgenPerHour),
            3 => Some(Self::MicroSievertPerHour),
            20 => Some(Self::Counts),
            23 => Some(Self::MilliRoentgenPerHour),
            _ => None,
        }
    }

    /// The wire value for this mode
    pub fn raw(self) -> u16 {
        match self {
            Self::Cpm => 0,
            Self::Cps => 1,
            Self::MicroRoentgenPerHour => 2,
            Self::MicroSievertPerHour => 3,
            Self::Counts => 20,
            Self::MilliRoentgenPerHour => 23,
        }
    }

    /// Unit label shown on the device display
    pub fn units(self) -> &'static str {
        match self {
            Self::Cpm => "cpm",
            Self::Cps => "cps",
            Self::MicroRoentgenPerHour => "µR/h",
            Self::MicroSievertPerHour => "µSv/h",
            Self::Counts => "counts",
            Self::MilliRoentgenPerHour => "mR/h",
        }
    }

    /// Scale a raw on-screen value into display units
    pub fn scale(self, raw: f64) -> f64 {
        match self {
            Self::Cpm | Self::MicroRoentgenPerHour | Self::Counts => raw,
            Self::Cps => raw / 10.0,
            Self::MicroSievertPerHour | Self::MilliRoentgenPerHour => raw / 1000.0,
        }
    }
}

/// Alarm state of the device.
///
/// Derived from three packed flags; the variants are ordered by priority, so
/// `Silenced > Alerting > Set > Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AlarmState {
    Disabled,
    Set,
    Alerting,
    Silenced,
}

impl AlarmState {
    /// Derive the state from the three status-byte flags.
    ///
    /// This chain must be kept in priority order.
    pub(crate) fn from_flags(set: bool, alerting: bool, silenced: bool) -> Self {
        if silenced {
            Self::Silenced
        } else if alerting {
            Self::Alerting
        } else if set {
            Self::Set
        } else {
            Self::Disabled
        }
    }
}

/// Periodic telemetry record, one per second
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub(crate) cps: u32,
    pub(crate) raw_value: u32,
    pub(crate) mode: DisplayMode,
    pub(crate) id: u8,
    pub(crate) cpm: Option<u32>,
    pub(crate) power: Option<u8>,
    pub(crate) alarm: Option<AlarmState>,
    pub(crate) unknown_bits: u8,
    #[serde(skip)]
    pub(crate) reserved_anomaly: bool,
}

impl Status {
    /// Number of counts observed in the last second
    pub fn cps(&self) -> u32 {
        self.cps
    }

    /// Device-computed rolling counts per minute (BLE only)
    pub fn cpm(&self) -> Result<u32, NotAvailable> {
        self.cpm.ok_or(NotAvailable("cpm"))
    }

    /// Rolling 8-bit packet counter; increments by one per packet
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Current display mode
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Value shown on the device display, scaled per the current mode
    pub fn display_value(&self) -> f64 {
        self.mode.scale(self.raw_value as f64)
    }

    /// Unit label for [`Status::display_value`]
    pub fn display_units(&self) -> &'static str {
        self.mode.units()
    }

    /// Raw power field: 0-4 battery quarter level, 5 charging (BLE only)
    pub fn power(&self) -> Result<u8, NotAvailable> {
        self.power.ok_or(NotAvailable("power"))
    }

    /// Whether the device is running on external power.
    ///
    /// Units streaming over USB are externally powered by definition.
    pub fn is_charging(&self) -> bool {
        match self.power {
            Some(level) => level == 5,
            None => true,
        }
    }

    /// Battery charge percentage, or `None` while charging
    pub fn battery_percent(&self) -> Option<f64> {
        match self.power {
            Some(level) if level < 5 => Some(f64::from(level) / 4.0 * 100.0),
            _ => None,
        }
    }

    /// Current alarm state (BLE only)
    pub fn alarm_state(&self) -> Result<AlarmState, NotAvailable> {
        self.alarm.ok_or(NotAvailable("alarm state"))
    }

    /// Reserved bits, preserved for diagnostics. Always 0 so far.
    pub fn unknown_bits(&self) -> u8 {
        self.unknown_bits
    }
}

/// Per-device settings carried only by the HID query packet
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSettings {
    pub(crate) serial: String,
    pub(crate) isotope: String,
    pub(crate) calibration_date: Option<NaiveDate>,
    pub(crate) contrast_raw: u8,
    pub(crate) count_duration: u32,
    pub(crate) backlight_duration: u32,
    pub(crate) datalog_interval: u32,
    pub(crate) alarm_is_set: bool,
    pub(crate) auto_averaging: bool,
    pub(crate) audible_beeps: bool,
    pub(crate) audible_clicks: bool,
    pub(crate) datalog_enabled: bool,
    pub(crate) datalog_circular: bool,
    pub(crate) efficiencies: [u16; 8],
}

/// Configuration snapshot returned in response to a query command
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub(crate) alarm_level: u32,
    pub(crate) deadtime_recip: u32,
    pub(crate) conversion_factor: u32,
    pub(crate) settings: Option<DeviceSettings>,
    #[serde(skip)]
    pub(crate) reserved_anomaly: bool,
}

impl Query {
    fn settings(&self, field: &'static str) -> Result<&DeviceSettings, NotAvailable> {
        self.settings.as_ref().ok_or(NotAvailable(field))
    }

    /// Alarm threshold in CPM, meaningful even while the alarm is disabled
    pub fn alarm_level(&self) -> u32 {
        self.alarm_level
    }

    /// Calibration conversion factor in CPM per mR/h.
    ///
    /// Divide a CPM reading by this to approximate a dose rate in mR/h.
    pub fn conversion_factor(&self) -> u32 {
        self.conversion_factor
    }

    /// Tube deadtime in seconds (the wire carries its reciprocal)
    pub fn deadtime(&self) -> f64 {
        1.0 / f64::from(self.deadtime_recip)
    }

    /// Device serial number (HID only)
    pub fn serial_number(&self) -> Result<&str, NotAvailable> {
        Ok(&self.settings("serial number")?.serial)
    }

    /// Name of the calibration isotope, e.g. "Co-60" (HID only)
    pub fn isotope(&self) -> Result<&str, NotAvailable> {
        Ok(&self.settings("isotope")?.isotope)
    }

    /// Date of last calibration, or `None` when never calibrated (HID only)
    pub fn calibration_date(&self) -> Result<Option<NaiveDate>, NotAvailable> {
        Ok(self.settings("calibration date")?.calibration_date)
    }

    /// LCD contrast as a fraction of the 0-64 raw range (HID only)
    pub fn contrast(&self) -> Result<f64, NotAvailable> {
        Ok(f64::from(self.settings("contrast")?.contrast_raw) / 64.0)
    }

    /// Timed-count duration in seconds (HID only)
    pub fn count_duration(&self) -> Result<u32, NotAvailable> {
        Ok(self.settings("count duration")?.count_duration)
    }

    /// Backlight-on duration in seconds (HID only)
    pub fn backlight_duration(&self) -> Result<u32, NotAvailable> {
        Ok(self.settings("backlight duration")?.backlight_duration)
    }

    /// Minutes between datalog samples (HID only)
    pub fn datalog_interval(&self) -> Result<u32, NotAvailable> {
        Ok(self.settings("datalog interval")?.datalog_interval)
    }

    /// Whether the radiation alarm is set (HID only)
    pub fn alarm_is_set(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("alarm flag")?.alarm_is_set)
    }

    /// Whether auto-averaging is enabled (HID only).
    ///
    /// Auto-averaging makes the device adjust its averaging time to recent
    /// radiation levels; with it disabled, averaging still happens but the
    /// window stays fixed.
    pub fn auto_averaging_enabled(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("auto averaging flag")?.auto_averaging)
    }

    /// Whether the device produces audible beeps (HID only)
    pub fn audible_beeps(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("audible beep flag")?.audible_beeps)
    }

    /// Whether the device clicks on each detection event (HID only)
    pub fn audible_clicks(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("audible click flag")?.audible_clicks)
    }

    /// Whether datalogging is enabled (HID only)
    pub fn datalog_enabled(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("datalog flag")?.datalog_enabled)
    }

    /// Whether the datalog buffer is circular (HID only)
    pub fn datalog_is_circular(&self) -> Result<bool, NotAvailable> {
        Ok(self.settings("datalog circular flag")?.datalog_circular)
    }

    /// Reciprocal detection efficiencies for the eight pre-programmed
    /// isotopes (HID only)
    pub fn isotope_efficiencies(&self) -> Result<&[u16; 8], NotAvailable> {
        Ok(&self.settings("isotope efficiencies")?.efficiencies)
    }
}

/// A decoded telemetry record of either kind
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Status(Status),
    Query(Query),
}

impl Record {
    /// True when a reserved field differed from its usually observed
    /// constant. Harmless, but worth a diagnostic line.
    pub fn reserved_anomaly(&self) -> bool {
        match self {
            Record::Status(status) => status.reserved_anomaly,
            Record::Query(query) => query.reserved_anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_priority_ordering() {
        // The state equals the highest-priority set flag
        assert_eq!(AlarmState::from_flags(false, false, false), AlarmState::Disabled);
        assert_eq!(AlarmState::from_flags(true, false, false), AlarmState::Set);
        assert_eq!(AlarmState::from_flags(true, true, false), AlarmState::Alerting);
        assert_eq!(AlarmState::from_flags(true, true, true), AlarmState::Silenced);
        assert!(AlarmState::Silenced > AlarmState::Alerting);
        assert!(AlarmState::Alerting > AlarmState::Set);
        assert!(AlarmState::Set > AlarmState::Disabled);
    }

    #[test]
    fn mode_table_is_total_and_invertible() {
        for raw in [0u16, 1, 2, 3, 20, 23] {
            let mode = DisplayMode::from_raw(raw).expect("known mode");
            assert_eq!(mode.raw(), raw);
            assert!(!mode.units().is_empty());
        }
        for raw in [4u16, 5, 19, 21, 22, 24, 0xFFFF] {
            assert_eq!(DisplayMode::from_raw(raw), None);
        }
    }

    #[test]
    fn mode_scaling() {
        assert_eq!(DisplayMode::Cpm.scale(1234.0), 1234.0);
        assert_eq!(DisplayMode::Cps.scale(125.0), 12.5);
        assert_eq!(DisplayMode::MicroSievertPerHour.scale(1500.0), 1.5);
        assert_eq!(DisplayMode::MilliRoentgenPerHour.scale(2000.0), 2.0);
    }
}
