//! Fingerprint slots and templates

use bitflags::bitflags;
use bytes::Bytes;

use crate::error::{Error, Result};

bitflags! {
    /// Fingerprint slots enrolled for a staff member
    ///
    /// Unknown bits are retained so the bitmap round-trips unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FingerSlots: u16 {
        const FIRST = 0x0001;
        const SECOND = 0x0002;
    }
}

impl FingerSlots {
    /// Bitmap written by the firmware for a record that never enrolled
    pub const UNSET: u16 = 0xFFFF;

    /// Slots holding a template, in slot order
    pub fn enrolled(self) -> Vec<FingerSlot> {
        if self.bits() == Self::UNSET {
            return Vec::new();
        }

        let mut slots = Vec::with_capacity(2);
        if self.contains(Self::FIRST) {
            slots.push(FingerSlot::First);
        }
        if self.contains(Self::SECOND) {
            slots.push(FingerSlot::Second);
        }
        slots
    }
}

/// One of the two fingerprint slots a staff record can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FingerSlot {
    First = 1,
    Second = 2,
}

impl FingerSlot {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FingerSlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(Error::InvalidFingerSlot(other)),
        }
    }
}

/// Raw fingerprint template as stored on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintTemplate {
    pub user_code: u64,
    pub slot: FingerSlot,
    pub data: Bytes,
}
