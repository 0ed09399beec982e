//! Error types for anviz-core

/// Result type alias for anviz operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device id outside the range the firmware accepts
    #[error("Invalid device id: {0} (valid range 0 - 99999999)")]
    InvalidDeviceId(i64),

    /// Fewer bytes than the declared length requires
    #[error("Truncated frame: expected {expected} bytes, got {actual} bytes")]
    TruncatedFrame {
        expected: usize,
        actual: usize,
    },

    /// Buffer holds more bytes than the declared length
    #[error("Length mismatch: header declares {declared} payload bytes, buffer holds {actual}")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// First byte is not the start marker
    #[error("Invalid start marker: 0x{0:02X}")]
    InvalidStartMarker(u8),

    /// Code byte lacks the response flag
    #[error("Not a response code: 0x{0:02X}")]
    NotAResponse(u8),

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Payload too large
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
}

impl Error {
    /// Check if the error describes a damaged frame that should just be dropped
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            Self::TruncatedFrame { .. }
                | Self::LengthMismatch { .. }
                | Self::ChecksumMismatch { .. }
                | Self::InvalidStartMarker(_)
                | Self::NotAResponse(_)
                | Self::UnknownCommand(_)
                | Self::PayloadTooLarge { .. }
        )
    }
}
