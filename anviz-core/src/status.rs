//! Response status codes

use std::fmt;

/// Result code carried by every response frame
///
/// Codes outside the documented set are kept as [`Status::Unknown`] so the
/// caller still sees a typed, non-success outcome instead of a dropped frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Fail,
    Full,
    Empty,
    NoUser,
    TimeOut,
    UserOccupied,
    FingerOccupied,
    Unknown(u8),
}

impl Status {
    /// Wire value
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::Fail => 0x01,
            Self::Full => 0x04,
            Self::Empty => 0x05,
            Self::NoUser => 0x06,
            Self::TimeOut => 0x08,
            Self::UserOccupied => 0x0A,
            Self::FingerOccupied => 0x0B,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get status name
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "ACK_SUCCESS",
            Self::Fail => "ACK_FAIL",
            Self::Full => "ACK_FULL",
            Self::Empty => "ACK_EMPTY",
            Self::NoUser => "ACK_NO_USER",
            Self::TimeOut => "ACK_TIME_OUT",
            Self::UserOccupied => "ACK_USER_OCCUPIED",
            Self::FingerOccupied => "ACK_FINGER_OCCUPIED",
            Self::Unknown(_) => "ACK_UNKNOWN",
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::Fail,
            0x04 => Self::Full,
            0x05 => Self::Empty,
            0x06 => Self::NoUser,
            0x08 => Self::TimeOut,
            0x0A => Self::UserOccupied,
            0x0B => Self::FingerOccupied,
            other => Self::Unknown(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.code())
    }
}
