//! Device information structures

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::error::{Error, Result};

/// Which information command produced a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKind {
    /// Basic information (firmware, comm settings)
    Basic,

    /// Extended information
    Extended,
}

/// Device information block
///
/// The layout differs between firmware revisions, so the bytes are passed
/// through uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfoBlock {
    pub kind: InfoKind,
    pub raw: Bytes,
}

impl DeviceInfoBlock {
    pub fn new(kind: InfoKind, raw: impl Into<Bytes>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub basic: DeviceInfoBlock,
    pub extended: DeviceInfoBlock,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[basic: {} bytes, extended: {} bytes]",
            self.basic.len(),
            self.extended.len()
        )
    }
}

/// Record counters reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordCounts {
    pub users: u32,
    pub fingerprints: u32,
    pub passwords: u32,
    pub cards: u32,
    pub all_records: u32,
    pub new_records: u32,
}

impl RecordCounts {
    /// Encoded size: six 3-byte counters
    pub const SIZE: usize = 18;

    /// Decode the record-count payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::SIZE {
            return Err(Error::ShortPayload {
                what: "record counts",
                needed: Self::SIZE,
                actual: payload.len(),
            });
        }

        let field = |i: usize| BigEndian::read_uint(&payload[i * 3..i * 3 + 3], 3) as u32;

        Ok(Self {
            users: field(0),
            fingerprints: field(1),
            passwords: field(2),
            cards: field(3),
            all_records: field(4),
            new_records: field(5),
        })
    }
}

impl fmt::Display for RecordCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} fp={} pwd={} cards={} records={} new={}",
            self.users,
            self.fingerprints,
            self.passwords,
            self.cards,
            self.all_records,
            self.new_records
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_counts() {
        let payload = [
            0x00, 0x00, 0x1E, // 30 users
            0x00, 0x00, 0x2D, // 45 fingerprints
            0x00, 0x00, 0x02, // 2 passwords
            0x00, 0x00, 0x00, // no cards
            0x01, 0x00, 0x00, // 65536 records
            0x00, 0x00, 0x32, // 50 new
        ];

        assert_eq!(
            RecordCounts::decode(&payload).unwrap(),
            RecordCounts {
                users: 30,
                fingerprints: 45,
                passwords: 2,
                cards: 0,
                all_records: 65_536,
                new_records: 50,
            }
        );
    }

    #[test]
    fn test_record_counts_short_payload() {
        assert!(matches!(RecordCounts::decode(&[0; 17]), Err(Error::ShortPayload { .. })));
    }

    #[test]
    fn test_info_block_passthrough() {
        let raw = vec![0x0F, 0x01, 0x80, 0x00];
        let block = DeviceInfoBlock::new(InfoKind::Extended, raw.clone());

        assert_eq!(block.raw.as_ref(), raw.as_slice());
        assert_eq!(block.len(), 4);
    }
}
