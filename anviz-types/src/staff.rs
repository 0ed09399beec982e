//! Enrolled staff records

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::fingerprint::FingerSlots;
use crate::record::WireRecord;

const NAME_LEN: usize = 10;

/// Staff record as stored on the device
///
/// # Layout (27 bytes)
///
/// ```text
/// offset  size  field
///      0     5  user code (BE)
///      5     3  password (high nibble of byte 0 = length)
///      8     3  card code (BE)
///     11    10  name (ASCII, zero padded)
///     21     1  department
///     22     1  group number
///     23     1  attendance mode
///     24     2  fingerprint slot bitmap (BE)
///     26     1  reserved
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StaffRecord {
    pub user_code: u64,
    pub password: [u8; 3],
    pub card_code: u32,
    pub name: [u8; NAME_LEN],
    pub department: u8,
    pub group: u8,
    pub attendance_mode: u8,
    pub fingerprints: FingerSlots,
    pub reserved: u8,
}

impl StaffRecord {
    /// Name field width
    pub const NAME_LEN: usize = NAME_LEN;

    /// Largest user code that fits five bytes
    pub const MAX_USER_CODE: u64 = 0xFF_FFFF_FFFF;

    /// Password field of a record without password
    pub const NO_PASSWORD: [u8; 3] = [0xFF; 3];

    /// Card code of a record without card
    pub const NO_CARD: u32 = 0xFF_FFFF;

    /// Create a record for upload
    ///
    /// Fields not given here take the values the firmware expects for a
    /// fresh enrollment: no password, no card, attendance mode `0xFF`, an
    /// unset fingerprint bitmap and reserved byte `0x01`.
    ///
    /// # Examples
    ///
    /// ```
    /// use anviz_types::StaffRecord;
    ///
    /// let staff = StaffRecord::new(1001, "ALICE").unwrap();
    /// assert_eq!(staff.name(), "ALICE");
    /// assert!(!staff.has_card());
    /// ```
    pub fn new(user_code: u64, name: &str) -> Result<Self> {
        if user_code > Self::MAX_USER_CODE {
            return Err(Error::UserCodeRange {
                code: user_code,
                max: Self::MAX_USER_CODE,
            });
        }

        Ok(Self {
            user_code,
            password: Self::NO_PASSWORD,
            card_code: Self::NO_CARD,
            name: encode_name(name)?,
            department: 0,
            group: 0,
            attendance_mode: 0xFF,
            fingerprints: FingerSlots::from_bits_retain(FingerSlots::UNSET),
            reserved: 0x01,
        })
    }

    pub fn with_department(mut self, department: u8) -> Self {
        self.department = department;
        self
    }

    pub fn with_group(mut self, group: u8) -> Self {
        self.group = group;
        self
    }

    /// Attach a card code (24 bits)
    pub fn with_card(mut self, card_code: u32) -> Result<Self> {
        if card_code >= Self::NO_CARD {
            return Err(Error::CardCodeRange(card_code));
        }
        self.card_code = card_code;
        Ok(self)
    }

    /// Name with padding removed
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .rposition(|&b| !matches!(b, 0x00 | 0xFF | b' '))
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Number of password digits, 0 when no password is set
    pub fn password_len(&self) -> u8 {
        if self.password == Self::NO_PASSWORD {
            0
        } else {
            self.password[0] >> 4
        }
    }

    pub fn has_card(&self) -> bool {
        self.card_code != Self::NO_CARD
    }
}

fn encode_name(name: &str) -> Result<[u8; NAME_LEN]> {
    if !name.is_ascii() || name.len() > NAME_LEN {
        return Err(Error::InvalidName(name.to_string()));
    }

    let mut raw = [0u8; NAME_LEN];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    Ok(raw)
}

impl WireRecord for StaffRecord {
    const SIZE: usize = 27;

    fn decode(raw: &[u8]) -> Self {
        let mut password = [0u8; 3];
        password.copy_from_slice(&raw[5..8]);
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&raw[11..21]);

        Self {
            user_code: BigEndian::read_uint(&raw[0..5], 5),
            password,
            card_code: BigEndian::read_uint(&raw[8..11], 3) as u32,
            name,
            department: raw[21],
            group: raw[22],
            attendance_mode: raw[23],
            fingerprints: FingerSlots::from_bits_retain(BigEndian::read_u16(&raw[24..26])),
            reserved: raw[26],
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut raw = [0u8; Self::SIZE];
        BigEndian::write_uint(&mut raw[0..5], self.user_code & Self::MAX_USER_CODE, 5);
        raw[5..8].copy_from_slice(&self.password);
        BigEndian::write_uint(&mut raw[8..11], u64::from(self.card_code & Self::NO_CARD), 3);
        raw[11..21].copy_from_slice(&self.name);
        raw[21] = self.department;
        raw[22] = self.group;
        raw[23] = self.attendance_mode;
        BigEndian::write_u16(&mut raw[24..26], self.fingerprints.bits());
        raw[26] = self.reserved;

        buf.put_slice(&raw);
    }
}

impl fmt::Debug for StaffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaffRecord")
            .field("user_code", &self.user_code)
            .field("name", &self.name())
            .field("card_code", &format!("0x{:06X}", self.card_code))
            .field("department", &self.department)
            .field("group", &self.group)
            .field("attendance_mode", &self.attendance_mode)
            .field("fingerprints", &self.fingerprints)
            .finish()
    }
}

impl fmt::Display for StaffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Staff[{}: {}]", self.user_code, self.name())
    }
}
