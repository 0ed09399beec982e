//! Device clock representations
//!
//! Attendance timestamps count seconds from 2000-01-01T00:00:00Z. The
//! get-datetime command answers with six calendar bytes instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Unix time of the device epoch, 2000-01-01T00:00:00Z
pub const DEVICE_EPOCH_UNIX: i64 = 946_684_800;

/// Convert a device timestamp to UTC
pub fn from_device_seconds(seconds: u32) -> DateTime<Utc> {
    // Every u32 offset from 2000 is inside chrono's range.
    DateTime::from_timestamp(DEVICE_EPOCH_UNIX + i64::from(seconds), 0).unwrap_or_default()
}

/// Convert UTC to a device timestamp; `None` outside 2000..2136
pub fn to_device_seconds(at: DateTime<Utc>) -> Option<u32> {
    u32::try_from(at.timestamp() - DEVICE_EPOCH_UNIX).ok()
}

/// Decode the 6-byte clock payload: year offset from 2000, month, day,
/// hour, minute, second
pub fn decode_datetime(payload: &[u8]) -> Result<NaiveDateTime> {
    let [year, month, day, hour, minute, second] = payload
        .get(..6)
        .and_then(|raw| <[u8; 6]>::try_from(raw).ok())
        .ok_or(Error::ShortPayload {
            what: "clock",
            needed: 6,
            actual: payload.len(),
        })?;

    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| {
            date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        })
        .ok_or_else(|| Error::Parse(format!("invalid device clock {:02X?}", &payload[..6])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_device_epoch() {
        let epoch = from_device_seconds(0);
        assert_eq!(epoch.to_rfc3339(), "2000-01-01T00:00:00+00:00");
        assert_eq!(to_device_seconds(epoch), Some(0));
    }

    #[test]
    fn test_device_seconds_round_trip() {
        let at = from_device_seconds(86_400 + 3_661);
        assert_eq!(at.to_rfc3339(), "2000-01-02T01:01:01+00:00");
        assert_eq!(to_device_seconds(at), Some(86_400 + 3_661));
    }

    #[test]
    fn test_before_epoch_is_rejected() {
        let at = from_device_seconds(0) - chrono::Duration::seconds(1);
        assert_eq!(to_device_seconds(at), None);
    }

    #[test]
    fn test_decode_captured_clock() {
        let clock = decode_datetime(&[0x0E, 0x07, 0x0F, 0x0C, 0x10, 0x1C]).unwrap();
        assert_eq!(clock.year(), 2014);
        assert_eq!(clock.month(), 7);
        assert_eq!(clock.day(), 15);
        assert_eq!(clock.hour(), 12);
        assert_eq!(clock.minute(), 16);
        assert_eq!(clock.second(), 28);
    }

    #[test]
    fn test_decode_short_clock() {
        assert!(matches!(
            decode_datetime(&[0x0E, 0x07]),
            Err(Error::ShortPayload { actual: 2, .. })
        ));
    }

    #[test]
    fn test_decode_invalid_clock() {
        assert!(matches!(
            decode_datetime(&[0x0E, 13, 1, 0, 0, 0]),
            Err(Error::Parse(_))
        ));
    }
}
