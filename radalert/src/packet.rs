//! Packet decoders
//!
//! Pure byte-to-record mapping for the three frame layouts:
//!
//! - BLE frames are 16 bytes; a leading `FF FF FF FF` sentinel marks a query
//!   packet, anything else is a status packet.
//! - HID status reports are 15 bytes on the interrupt endpoint.
//! - HID query payloads are 64 bytes pulled via feature report.
//!
//! All integers are little-endian. Every decoder validates the plausible
//! ranges below and fails with [`DecodeError::OutOfRange`] on violation;
//! decoding has no side effects.

use chrono::NaiveDate;

use crate::error::DecodeError;
use crate::record::{AlarmState, DeviceSettings, DisplayMode, Query, Record, Status};

/// BLE frame length (status and query alike)
pub const BLE_FRAME_LEN: usize = 16;
/// HID status report length
pub const HID_STATUS_LEN: usize = 15;
/// HID query payload length
pub const HID_QUERY_LEN: usize = 64;

/// First four bytes of a BLE query packet
const QUERY_SENTINEL: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

// The manuals say the devices won't saturate in a field 100 times the
// maximum reading; the largest maximum CPS spec in the family is 7500
// (1000EC), so accept up to 100x that.
const MAX_CPS: u32 = 7500 * 100;
// Only three bytes carry CPM, so the 100x headroom cannot apply; bound it
// at the maximum spec rate times 60.
const MAX_CPM: u32 = 7500 * 60;
const MAX_ALARM: u32 = 235_400;
const MIN_CONVERSION: u32 = 200;
const MAX_CONVERSION: u32 = 7000;
const MAX_CONTRAST: u8 = 64;
const MAX_COUNT_DURATION: u32 = 24 * 60 * 60 - 1;
const MAX_BACKLIGHT: u32 = 30;
const MAX_DATALOG_INTERVAL: u32 = 60;

fn le_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn check_frame(frame: &[u8], expected: usize) -> Result<(), DecodeError> {
    if frame.len() < expected {
        return Err(DecodeError::FrameShort {
            expected,
            got: frame.len(),
        });
    }
    Ok(())
}

/// Decode a 16-byte BLE frame, discriminating between the two packet kinds
/// by the query sentinel.
pub fn decode_ble_frame(frame: &[u8]) -> Result<Record, DecodeError> {
    check_frame(frame, BLE_FRAME_LEN)?;
    let frame = &frame[..BLE_FRAME_LEN];
    if frame[0..4] == QUERY_SENTINEL {
        decode_ble_query(frame).map(Record::Query)
    } else {
        decode_ble_status(frame).map(Record::Status)
    }
}

/// BLE status layout: cps(4) value(4) mode(2) cpm-low(2) cpm-high(1)
/// reserved(1) status-bits(1) id(1)
fn decode_ble_status(frame: &[u8]) -> Result<Status, DecodeError> {
    let cps = le_u32(&frame[0..4]);
    let raw_value = le_u32(&frame[4..8]);
    let mode_raw = le_u16(&frame[8..10]);
    let cpm_lo = le_u16(&frame[10..12]);
    let cpm_hi = frame[12];
    let reserved = frame[13];
    let status_bits = frame[14];
    let id = frame[15];

    // The 24-bit CPM field is split across a word and a byte
    let cpm = u32::from(cpm_lo) | u32::from(cpm_hi) << 16;

    let power = status_bits & 0x07;
    let alarm_alerting = status_bits & 0x08 != 0;
    let alarm_set = status_bits & 0x10 != 0;
    let alarm_silenced = status_bits & 0x20 != 0;
    let unknown_bits = status_bits >> 6;

    if cps > MAX_CPS {
        return Err(DecodeError::OutOfRange {
            field: "cps",
            value: i64::from(cps),
        });
    }
    if cpm > MAX_CPM {
        return Err(DecodeError::OutOfRange {
            field: "cpm",
            value: i64::from(cpm),
        });
    }
    if power > 5 {
        return Err(DecodeError::OutOfRange {
            field: "power",
            value: i64::from(power),
        });
    }
    if alarm_alerting && !alarm_set {
        return Err(DecodeError::OutOfRange {
            field: "alarm flags (alerting without set)",
            value: i64::from(status_bits),
        });
    }
    if alarm_silenced && !alarm_alerting {
        return Err(DecodeError::OutOfRange {
            field: "alarm flags (silenced without alerting)",
            value: i64::from(status_bits),
        });
    }
    let mode = DisplayMode::from_raw(mode_raw).ok_or(DecodeError::OutOfRange {
        field: "mode",
        value: i64::from(mode_raw),
    })?;

    Ok(Status {
        cps,
        raw_value,
        mode,
        id,
        cpm: Some(cpm),
        power: Some(power),
        alarm: Some(AlarmState::from_flags(alarm_set, alarm_alerting, alarm_silenced)),
        unknown_bits,
        reserved_anomaly: unknown_bits != 0 || reserved != 0,
    })
}

/// BLE query layout: sentinel(4) alarm(2) reserved(2) deadtime-recip(2)
/// conversion(2) trailer(4). The trailer reads 0xFFFFFFFF on every unit
/// observed so far.
fn decode_ble_query(frame: &[u8]) -> Result<Query, DecodeError> {
    let alarm_level = u32::from(le_u16(&frame[4..6]));
    let reserved = le_u16(&frame[6..8]);
    let deadtime_recip = u32::from(le_u16(&frame[8..10]));
    let conversion_factor = u32::from(le_u16(&frame[10..12]));
    let trailer = le_u32(&frame[12..16]);

    validate_query_core(alarm_level, deadtime_recip, conversion_factor)?;

    Ok(Query {
        alarm_level,
        deadtime_recip,
        conversion_factor,
        settings: None,
        reserved_anomaly: reserved != 0 || trailer != 0xFFFF_FFFF,
    })
}

fn validate_query_core(alarm: u32, deadtime_recip: u32, conversion: u32) -> Result<(), DecodeError> {
    if alarm > MAX_ALARM {
        return Err(DecodeError::OutOfRange {
            field: "alarm level",
            value: i64::from(alarm),
        });
    }
    if deadtime_recip == 0 {
        return Err(DecodeError::OutOfRange {
            field: "deadtime reciprocal",
            value: 0,
        });
    }
    if !(MIN_CONVERSION..=MAX_CONVERSION).contains(&conversion) {
        return Err(DecodeError::OutOfRange {
            field: "conversion factor",
            value: i64::from(conversion),
        });
    }
    Ok(())
}

/// Decode a 15-byte HID status report and wrap it as a [`Record`].
///
/// The interrupt endpoint never carries query packets, so this is the whole
/// stream decoder for HID.
pub fn decode_hid_frame(frame: &[u8]) -> Result<Record, DecodeError> {
    decode_hid_status(frame).map(Record::Status)
}

/// HID status layout: cps(4) id(1) value(4) mode(1) unknown(1) unknown(4).
///
/// No cpm, power or alarm fields travel on this link.
pub fn decode_hid_status(frame: &[u8]) -> Result<Status, DecodeError> {
    check_frame(frame, HID_STATUS_LEN)?;
    if frame.len() > HID_STATUS_LEN {
        return Err(DecodeError::Malformed("status report is not 15 bytes"));
    }
    let cps = le_u32(&frame[0..4]);
    let id = frame[4];
    let raw_value = le_u32(&frame[5..9]);
    let mode_raw = u16::from(frame[9]);
    let unknown1 = frame[10];
    let unknown2 = le_u32(&frame[11..15]);

    if cps > MAX_CPS {
        return Err(DecodeError::OutOfRange {
            field: "cps",
            value: i64::from(cps),
        });
    }
    let mode = DisplayMode::from_raw(mode_raw).ok_or(DecodeError::OutOfRange {
        field: "mode",
        value: i64::from(mode_raw),
    })?;

    Ok(Status {
        cps,
        raw_value,
        mode,
        id,
        cpm: None,
        power: None,
        alarm: None,
        unknown_bits: unknown1,
        reserved_anomaly: unknown1 != 0 || unknown2 != 0,
    })
}

/// Decode the 64-byte HID query payload (feature report 0x00, report id
/// already stripped).
pub fn decode_hid_query(payload: &[u8]) -> Result<Query, DecodeError> {
    check_frame(payload, HID_QUERY_LEN)?;
    if payload.len() > HID_QUERY_LEN {
        return Err(DecodeError::Malformed("query payload is not 64 bytes"));
    }

    let serial = ascii_field(&payload[0..7]);
    let isotope = ascii_field(&payload[7..14]);
    let reserved_b = &payload[14..16];
    let status_bits = payload[16];
    let alarm_level = u32::from(le_u16(&payload[17..19]));
    let reserved_c = &payload[19..21];
    let day = payload[21];
    let reserved_d = &payload[22..24];
    let month = payload[24];
    let year = payload[25];
    let reserved_e = payload[26];
    let contrast_raw = payload[27];
    let deadtime_recip = u32::from(le_u16(&payload[28..30]));
    let mut efficiencies = [0u16; 8];
    for (i, entry) in efficiencies.iter_mut().enumerate() {
        *entry = le_u16(&payload[30 + 2 * i..32 + 2 * i]);
    }
    let count_duration = u32::from(le_u16(&payload[46..48]));
    let backlight_duration = u32::from(payload[48]);
    let conversion_factor = u32::from(le_u16(&payload[49..51]));
    let datalog_interval = u32::from(le_u16(&payload[51..53]));
    let padding = &payload[53..64];

    let auto_averaging = status_bits & 0x01 != 0;
    let datalog_circular = status_bits & 0x02 != 0;
    let alarm_is_set = status_bits & 0x04 != 0;
    let audible_clicks = status_bits & 0x08 != 0;
    let audible_beeps = status_bits & 0x10 != 0;
    let datalog_enabled = status_bits & 0x40 != 0;

    validate_query_core(alarm_level, deadtime_recip, conversion_factor)?;

    let calibration_date = NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .ok_or(DecodeError::OutOfRange {
            field: "calibration date",
            value: i64::from(year) * 10_000 + i64::from(month) * 100 + i64::from(day),
        })?;
    // The factory leaves the date at its epoch when a unit was never
    // calibrated
    let calibration_date = match NaiveDate::from_ymd_opt(2000, 1, 1) {
        Some(epoch) if calibration_date == epoch => None,
        _ => Some(calibration_date),
    };

    if contrast_raw > MAX_CONTRAST {
        return Err(DecodeError::OutOfRange {
            field: "contrast",
            value: i64::from(contrast_raw),
        });
    }
    if !(1..=MAX_COUNT_DURATION).contains(&count_duration) {
        return Err(DecodeError::OutOfRange {
            field: "count duration",
            value: i64::from(count_duration),
        });
    }
    if backlight_duration > MAX_BACKLIGHT {
        return Err(DecodeError::OutOfRange {
            field: "backlight duration",
            value: i64::from(backlight_duration),
        });
    }
    if !(1..=MAX_DATALOG_INTERVAL).contains(&datalog_interval) {
        return Err(DecodeError::OutOfRange {
            field: "datalog interval",
            value: i64::from(datalog_interval),
        });
    }

    let reserved_anomaly = reserved_b != [0, 0]
        || reserved_c != [0, 0]
        || reserved_d != [0x02, 0x17]
        || reserved_e != 0
        || status_bits & 0xA0 != 0
        || padding.iter().any(|&b| b != 0xFF);

    Ok(Query {
        alarm_level,
        deadtime_recip,
        conversion_factor,
        settings: Some(DeviceSettings {
            serial,
            isotope,
            calibration_date,
            contrast_raw,
            count_duration,
            backlight_duration,
            datalog_interval,
            alarm_is_set,
            auto_averaging,
            audible_beeps,
            audible_clicks,
            datalog_enabled,
            datalog_circular,
            efficiencies,
        }),
        reserved_anomaly,
    })
}

/// NUL-padded ASCII field to a trimmed string
fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches('\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AlarmState;

    fn encode_ble_status(cps: u32, value: u32, mode: u16, cpm: u32, status_bits: u8, id: u8) -> [u8; 16] {
        let mut frame = [0u8; 16];
        frame[0..4].copy_from_slice(&cps.to_le_bytes());
        frame[4..8].copy_from_slice(&value.to_le_bytes());
        frame[8..10].copy_from_slice(&mode.to_le_bytes());
        frame[10..12].copy_from_slice(&((cpm & 0xFFFF) as u16).to_le_bytes());
        frame[12] = (cpm >> 16) as u8;
        frame[14] = status_bits;
        frame[15] = id;
        frame
    }

    fn encode_ble_query(alarm: u16, dead: u16, conv: u16) -> [u8; 16] {
        let mut frame = [0u8; 16];
        frame[0..4].copy_from_slice(&[0xFF; 4]);
        frame[4..6].copy_from_slice(&alarm.to_le_bytes());
        frame[8..10].copy_from_slice(&dead.to_le_bytes());
        frame[10..12].copy_from_slice(&conv.to_le_bytes());
        frame[12..16].copy_from_slice(&[0xFF; 4]);
        frame
    }

    fn encode_hid_status(cps: u32, id: u8, value: u32, mode: u8) -> [u8; 15] {
        let mut frame = [0u8; 15];
        frame[0..4].copy_from_slice(&cps.to_le_bytes());
        frame[4] = id;
        frame[5..9].copy_from_slice(&value.to_le_bytes());
        frame[9] = mode;
        frame
    }

    fn status_bits_of(status: &crate::record::Status) -> u8 {
        let (set, alerting, silenced) = match status.alarm.unwrap() {
            AlarmState::Disabled => (false, false, false),
            AlarmState::Set => (true, false, false),
            AlarmState::Alerting => (true, true, false),
            AlarmState::Silenced => (true, true, true),
        };
        status.power.unwrap()
            | (u8::from(alerting)) << 3
            | (u8::from(set)) << 4
            | (u8::from(silenced)) << 5
            | status.unknown_bits << 6
    }

    #[test]
    fn ble_status_decode() {
        let frame = [
            0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x00, 0x00, 0x00,
            0x00, 0x42,
        ];
        let record = decode_ble_frame(&frame).unwrap();
        let status = match record {
            Record::Status(s) => s,
            other => panic!("Expected a status record, got {other:?}"),
        };
        assert_eq!(status.cps(), 10);
        assert_eq!(status.cpm().unwrap(), 0x30);
        assert_eq!(status.mode(), DisplayMode::Cpm);
        assert_eq!(status.display_value(), 0.0);
        assert_eq!(status.display_units(), "cpm");
        assert_eq!(status.power().unwrap(), 0);
        assert_eq!(status.battery_percent(), Some(0.0));
        assert!(!status.is_charging());
        assert_eq!(status.alarm_state().unwrap(), AlarmState::Disabled);
        assert_eq!(status.id(), 0x42);
    }

    #[test]
    fn ble_status_alarm_and_power_bits() {
        // power=5 (charging), alarm set but not alerting
        let frame = encode_ble_status(100, 2500, 0, 6000, 0x15, 7);
        let record = decode_ble_frame(&frame).unwrap();
        let status = match record {
            Record::Status(s) => s,
            other => panic!("Expected a status record, got {other:?}"),
        };
        assert!(status.is_charging());
        assert_eq!(status.battery_percent(), None);
        assert_eq!(status.alarm_state().unwrap(), AlarmState::Set);

        // all three flags: silenced wins
        let frame = encode_ble_status(100, 2500, 0, 6000, 0x3B, 8);
        match decode_ble_frame(&frame).unwrap() {
            Record::Status(s) => {
                assert_eq!(s.alarm_state().unwrap(), AlarmState::Silenced);
                assert_eq!(s.battery_percent(), Some(75.0));
            }
            other => panic!("Expected a status record, got {other:?}"),
        }
    }

    #[test]
    fn ble_query_decode() {
        let frame = [
            0xFF, 0xFF, 0xFF, 0xFF, 0x2E, 0x04, 0x00, 0x00, 0x67, 0x2B, 0x2E, 0x04, 0xFF, 0xFF,
            0xFF, 0xFF,
        ];
        let record = decode_ble_frame(&frame).unwrap();
        let query = match record {
            Record::Query(q) => q,
            other => panic!("Expected a query record, got {other:?}"),
        };
        assert_eq!(query.alarm_level(), 1070);
        assert_eq!(query.conversion_factor(), 1070);
        assert!((query.deadtime() - 9.0e-5).abs() < 1.0e-6);
        assert!(!query.reserved_anomaly);
        // BLE queries expose only the starred subset
        assert!(query.serial_number().is_err());
        assert!(query.calibration_date().is_err());
        assert!(query.datalog_enabled().is_err());
    }

    #[test]
    fn sentinel_discriminates_packet_kinds() {
        let query = encode_ble_query(1070, 11111, 1070);
        assert!(matches!(decode_ble_frame(&query).unwrap(), Record::Query(_)));

        // cps = 0xFFFFFFFE would be astronomical; the point is that the
        // first four bytes are not all ones, so it parses as (bad) status
        let mut not_query = query;
        not_query[0] = 0xFE;
        assert!(matches!(
            decode_ble_frame(&not_query),
            Err(DecodeError::OutOfRange { field: "cps", .. })
        ));
    }

    #[test]
    fn ble_status_validation_bounds() {
        // cps just above 100x the maximum spec rate
        let frame = encode_ble_status(750_001, 0, 0, 0, 0, 1);
        assert!(matches!(
            decode_ble_frame(&frame),
            Err(DecodeError::OutOfRange { field: "cps", .. })
        ));

        // cpm above the 24-bit-aware bound
        let frame = encode_ble_status(0, 0, 0, 450_001, 0, 1);
        assert!(matches!(
            decode_ble_frame(&frame),
            Err(DecodeError::OutOfRange { field: "cpm", .. })
        ));

        // power 6 and 7 are not known states
        let frame = encode_ble_status(0, 0, 0, 0, 0x06, 1);
        assert!(matches!(
            decode_ble_frame(&frame),
            Err(DecodeError::OutOfRange { field: "power", .. })
        ));

        // unknown mode
        let frame = encode_ble_status(0, 0, 7, 0, 0, 1);
        assert!(matches!(
            decode_ble_frame(&frame),
            Err(DecodeError::OutOfRange { field: "mode", .. })
        ));
    }

    #[test]
    fn ble_status_alarm_consistency() {
        // alerting without set
        let frame = encode_ble_status(0, 0, 0, 0, 0x08, 1);
        assert!(decode_ble_frame(&frame).is_err());

        // silenced without alerting
        let frame = encode_ble_status(0, 0, 0, 0, 0x30, 1);
        assert!(decode_ble_frame(&frame).is_err());
    }

    #[test]
    fn ble_query_validation_bounds() {
        // zero deadtime reciprocal would divide by zero
        let frame = encode_ble_query(1070, 0, 1070);
        assert!(matches!(
            decode_ble_frame(&frame),
            Err(DecodeError::OutOfRange { field: "deadtime reciprocal", .. })
        ));

        // conversion factor outside [200, 7000]
        let frame = encode_ble_query(1070, 11111, 199);
        assert!(decode_ble_frame(&frame).is_err());
        let frame = encode_ble_query(1070, 11111, 7001);
        assert!(decode_ble_frame(&frame).is_err());
    }

    #[test]
    fn ble_roundtrip() {
        // Re-packing every decoded field reproduces the input bytes
        let frames = [
            encode_ble_status(123, 456, 1, 7890, 0x02, 0x7F),
            encode_ble_status(0, 0, 23, 0x012345, 0x3B, 0xFF),
        ];
        for frame in frames {
            let status = match decode_ble_frame(&frame).unwrap() {
                Record::Status(s) => s,
                other => panic!("Expected a status record, got {other:?}"),
            };
            let repacked = encode_ble_status(
                status.cps,
                status.raw_value,
                status.mode.raw(),
                status.cpm.unwrap(),
                status_bits_of(&status),
                status.id,
            );
            assert_eq!(repacked, frame);
        }

        let frame = encode_ble_query(2000, 500, 3000);
        let query = match decode_ble_frame(&frame).unwrap() {
            Record::Query(q) => q,
            other => panic!("Expected a query record, got {other:?}"),
        };
        let repacked = encode_ble_query(
            query.alarm_level as u16,
            query.deadtime_recip as u16,
            query.conversion_factor as u16,
        );
        assert_eq!(repacked, frame);
    }

    #[test]
    fn hid_status_decode() {
        let frame = encode_hid_status(42, 0x10, 1500, 3);
        let status = decode_hid_status(&frame).unwrap();
        assert_eq!(status.cps(), 42);
        assert_eq!(status.id(), 0x10);
        assert_eq!(status.mode(), DisplayMode::MicroSievertPerHour);
        assert_eq!(status.display_value(), 1.5);
        assert_eq!(status.display_units(), "µSv/h");

        // Fields the HID link does not carry
        assert!(status.cpm().is_err());
        assert!(status.power().is_err());
        assert!(status.alarm_state().is_err());
        assert!(status.is_charging());
        assert_eq!(status.battery_percent(), None);
    }

    #[test]
    fn hid_status_rejects_bad_fields() {
        let frame = encode_hid_status(750_001, 0, 0, 0);
        assert!(decode_hid_status(&frame).is_err());

        let frame = encode_hid_status(10, 0, 0, 4);
        assert!(matches!(
            decode_hid_status(&frame),
            Err(DecodeError::OutOfRange { field: "mode", .. })
        ));
    }

    #[test]
    fn short_frames_ask_for_more_bytes() {
        assert!(matches!(
            decode_ble_frame(&[0u8; 10]),
            Err(DecodeError::FrameShort { expected: 16, got: 10 })
        ));
        assert!(matches!(
            decode_hid_status(&[0u8; 14]),
            Err(DecodeError::FrameShort { expected: 15, got: 14 })
        ));
        assert!(matches!(
            decode_hid_query(&[0u8; 63]),
            Err(DecodeError::FrameShort { expected: 64, got: 63 })
        ));
    }

    #[test]
    fn oversized_hid_reports_are_malformed() {
        assert!(matches!(
            decode_hid_status(&[0u8; 16]),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_hid_query(&[0u8; 65]),
            Err(DecodeError::Malformed(_))
        ));
    }

    /// 64-byte query payload as captured from a Monitor 200
    fn sample_hid_query() -> [u8; 64] {
        let mut payload = [0u8; 64];
        payload[0..7].copy_from_slice(b"\x00101948");
        payload[7..14].copy_from_slice(b"\x00\x00Co-60");
        // payload[14..16] reserved, zero
        payload[16] = 0x11; // auto-averaging + audible beeps
        payload[17..19].copy_from_slice(&1070u16.to_le_bytes());
        // payload[19..21] reserved, zero
        payload[21] = 14; // day
        payload[22..24].copy_from_slice(&[0x02, 0x17]);
        payload[24] = 7; // month
        payload[25] = 21; // year - 2000
        payload[27] = 25; // contrast
        payload[28..30].copy_from_slice(&11111u16.to_le_bytes());
        for i in 0..8 {
            payload[30 + 2 * i..32 + 2 * i].copy_from_slice(&0x2710u16.to_le_bytes());
        }
        payload[46..48].copy_from_slice(&600u16.to_le_bytes());
        payload[48] = 7; // backlight seconds
        payload[49..51].copy_from_slice(&1070u16.to_le_bytes());
        payload[51..53].copy_from_slice(&1u16.to_le_bytes());
        payload[53..64].fill(0xFF);
        payload
    }

    #[test]
    fn hid_query_decode() {
        let query = decode_hid_query(&sample_hid_query()).unwrap();
        assert_eq!(query.alarm_level(), 1070);
        assert_eq!(query.conversion_factor(), 1070);
        assert!((query.deadtime() - 9.0e-5).abs() < 1.0e-6);
        assert_eq!(query.serial_number().unwrap(), "101948");
        assert_eq!(query.isotope().unwrap(), "Co-60");
        assert_eq!(
            query.calibration_date().unwrap(),
            NaiveDate::from_ymd_opt(2021, 7, 14)
        );
        assert_eq!(query.contrast().unwrap(), 25.0 / 64.0);
        assert_eq!(query.count_duration().unwrap(), 600);
        assert_eq!(query.backlight_duration().unwrap(), 7);
        assert_eq!(query.datalog_interval().unwrap(), 1);
        assert!(query.auto_averaging_enabled().unwrap());
        assert!(query.audible_beeps().unwrap());
        assert!(!query.audible_clicks().unwrap());
        assert!(!query.alarm_is_set().unwrap());
        assert!(!query.datalog_enabled().unwrap());
        assert!(!query.datalog_is_circular().unwrap());
        assert_eq!(query.isotope_efficiencies().unwrap(), &[0x2710; 8]);
        assert!(!query.reserved_anomaly);
    }

    #[test]
    fn hid_query_epoch_date_means_uncalibrated() {
        let mut payload = sample_hid_query();
        payload[21] = 1;
        payload[24] = 1;
        payload[25] = 0;
        let query = decode_hid_query(&payload).unwrap();
        assert_eq!(query.calibration_date().unwrap(), None);
    }

    #[test]
    fn hid_query_validation_bounds() {
        let mut payload = sample_hid_query();
        payload[21] = 31;
        payload[24] = 2; // February 31st does not exist
        assert!(matches!(
            decode_hid_query(&payload),
            Err(DecodeError::OutOfRange { field: "calibration date", .. })
        ));

        let mut payload = sample_hid_query();
        payload[27] = 65;
        assert!(matches!(
            decode_hid_query(&payload),
            Err(DecodeError::OutOfRange { field: "contrast", .. })
        ));

        let mut payload = sample_hid_query();
        payload[46..48].copy_from_slice(&0u16.to_le_bytes());
        assert!(decode_hid_query(&payload).is_err());

        let mut payload = sample_hid_query();
        payload[48] = 31;
        assert!(decode_hid_query(&payload).is_err());

        let mut payload = sample_hid_query();
        payload[51..53].copy_from_slice(&61u16.to_le_bytes());
        assert!(decode_hid_query(&payload).is_err());
    }

    #[test]
    fn hid_query_flags_reserved_deviations() {
        let mut payload = sample_hid_query();
        payload[60] = 0x00; // padding byte not 0xFF
        let query = decode_hid_query(&payload).unwrap();
        assert!(query.reserved_anomaly);
    }
}
