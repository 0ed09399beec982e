//! Attendance punches

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};

use crate::clock;
use crate::record::WireRecord;

/// One attendance punch
///
/// # Layout (14 bytes)
///
/// ```text
/// offset  size  field
///      0     5  user code (BE)
///      5     4  seconds since 2000-01-01T00:00:00Z (BE)
///      9     1  backup code
///     10     1  record type
///     11     1  work type
///     12     2  padding
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceRecord {
    pub user_code: u64,
    pub timestamp: u32,
    pub backup_code: u8,
    pub record_type: u8,
    pub work_type: u8,
    pub padding: [u8; 2],
}

impl AttendanceRecord {
    /// Punch time in UTC
    pub fn recorded_at(&self) -> DateTime<Utc> {
        clock::from_device_seconds(self.timestamp)
    }
}

impl WireRecord for AttendanceRecord {
    const SIZE: usize = 14;

    fn decode(raw: &[u8]) -> Self {
        Self {
            user_code: BigEndian::read_uint(&raw[0..5], 5),
            timestamp: BigEndian::read_u32(&raw[5..9]),
            backup_code: raw[9],
            record_type: raw[10],
            work_type: raw[11],
            padding: [raw[12], raw[13]],
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut raw = [0u8; Self::SIZE];
        BigEndian::write_uint(&mut raw[0..5], self.user_code & 0xFF_FFFF_FFFF, 5);
        BigEndian::write_u32(&mut raw[5..9], self.timestamp);
        raw[9] = self.backup_code;
        raw[10] = self.record_type;
        raw[11] = self.work_type;
        raw[12..14].copy_from_slice(&self.padding);

        buf.put_slice(&raw);
    }
}

impl fmt::Display for AttendanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Punch[{} @ {} type={}]",
            self.user_code,
            self.recorded_at().format("%Y-%m-%d %H:%M:%S"),
            self.record_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_records;
    use pretty_assertions::assert_eq;

    const RAW: [u8; 14] = [
        0x00, 0x00, 0x00, 0x00, 0x07, // user 7
        0x00, 0x01, 0x51, 0x80, // 86400 s
        0x01, 0x02, 0x03, // backup, record type, work type
        0xAB, 0xCD, // padding
    ];

    #[test]
    fn test_decode_fields() {
        let punch = AttendanceRecord::decode(&RAW);

        assert_eq!(punch.user_code, 7);
        assert_eq!(punch.timestamp, 86_400);
        assert_eq!(punch.recorded_at().to_rfc3339(), "2000-01-02T00:00:00+00:00");
        assert_eq!(punch.backup_code, 1);
        assert_eq!(punch.record_type, 2);
        assert_eq!(punch.work_type, 3);
        assert_eq!(punch.padding, [0xAB, 0xCD]);
    }

    #[test]
    fn test_padding_preserved_on_encode() {
        let mut buf = BytesMut::new();
        AttendanceRecord::decode(&RAW).encode(&mut buf);
        assert_eq!(&buf[..], &RAW[..]);
    }

    #[test]
    fn test_window_decoding_is_idempotent() {
        let mut payload = vec![2u8];
        payload.extend_from_slice(&RAW);
        payload.extend_from_slice(&RAW);

        let first: Vec<AttendanceRecord> = decode_records(&payload);
        let second: Vec<AttendanceRecord> = decode_records(&payload);

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_display() {
        let punch = AttendanceRecord::decode(&RAW);
        assert_eq!(punch.to_string(), "Punch[7 @ 2000-01-02 00:00:00 type=2]");
    }
}
