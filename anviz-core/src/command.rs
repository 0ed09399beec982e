//! Anviz protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Flag set on the command byte of every response frame
pub const RESPONSE_FLAG: u8 = 0x80;

/// Protocol command codes
///
/// The terminals accept a fixed command set; anything else is rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Photo store
    PhotoCount = 0x2A,
    PhotoHeads = 0x2B,

    // Device information
    BasicInfo = 0x30,
    ExtendedInfo = 0x32,
    GetDateTime = 0x38,
    RecordCounts = 0x3C,

    // Bulk transfers
    DownloadAttendance = 0x40,
    DownloadStaff = 0x42,
    UploadStaff = 0x43,
    FingerprintTemplate = 0x44,

    // Record maintenance
    ClearAllRecords = 0x4D,
    ClearNewRecords = 0x4E,
}

impl Command {
    /// Raw command code as sent in requests
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Code carried by the matching response frame
    pub fn response_code(self) -> u8 {
        self.code() | RESPONSE_FLAG
    }

    /// Recover the originating command from a response code
    pub fn from_response_code(code: u8) -> Result<Self> {
        if code & RESPONSE_FLAG == 0 {
            return Err(Error::NotAResponse(code));
        }
        Self::try_from(code - RESPONSE_FLAG)
    }

    /// Whether this command moves records in fixed-size windows
    pub fn is_chunked(self) -> bool {
        matches!(
            self,
            Self::DownloadAttendance | Self::DownloadStaff | Self::UploadStaff
        )
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::PhotoCount => "CMD_PHOTO_COUNT",
            Self::PhotoHeads => "CMD_PHOTO_HEADS",
            Self::BasicInfo => "CMD_INFO_BASIC",
            Self::ExtendedInfo => "CMD_INFO_EXTENDED",
            Self::GetDateTime => "CMD_GET_DATETIME",
            Self::RecordCounts => "CMD_RECORD_COUNTS",
            Self::DownloadAttendance => "CMD_DOWNLOAD_ATTENDANCE",
            Self::DownloadStaff => "CMD_DOWNLOAD_STAFF",
            Self::UploadStaff => "CMD_UPLOAD_STAFF",
            Self::FingerprintTemplate => "CMD_FP_TEMPLATE",
            Self::ClearAllRecords => "CMD_CLEAR_RECORDS",
            Self::ClearNewRecords => "CMD_CLEAR_NEW_RECORDS",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x2A => Ok(Self::PhotoCount),
            0x2B => Ok(Self::PhotoHeads),
            0x30 => Ok(Self::BasicInfo),
            0x32 => Ok(Self::ExtendedInfo),
            0x38 => Ok(Self::GetDateTime),
            0x3C => Ok(Self::RecordCounts),
            0x40 => Ok(Self::DownloadAttendance),
            0x42 => Ok(Self::DownloadStaff),
            0x43 => Ok(Self::UploadStaff),
            0x44 => Ok(Self::FingerprintTemplate),
            0x4D => Ok(Self::ClearAllRecords),
            0x4E => Ok(Self::ClearNewRecords),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u8::from(Command::DownloadStaff), 0x42);
        assert_eq!(Command::try_from(0x42).unwrap(), Command::DownloadStaff);
    }

    #[test]
    fn test_response_code_round_trip() {
        assert_eq!(Command::GetDateTime.response_code(), 0xB8);
        assert_eq!(
            Command::from_response_code(0xB8).unwrap(),
            Command::GetDateTime
        );
    }

    #[test]
    fn test_request_code_is_not_a_response() {
        assert!(matches!(
            Command::from_response_code(0x38),
            Err(Error::NotAResponse(0x38))
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            Command::try_from(0x39),
            Err(Error::UnknownCommand(0x39))
        ));
        assert!(Command::from_response_code(0xFF).is_err());
    }

    #[test]
    fn test_is_chunked() {
        assert!(Command::DownloadStaff.is_chunked());
        assert!(!Command::ClearAllRecords.is_chunked());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Command::RecordCounts.to_string(),
            "CMD_RECORD_COUNTS(0x3C)"
        );
    }
}
