//! Record validation and parse errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    /// User code wider than the record field
    #[error("User code {code} exceeds {max}")]
    UserCodeRange { code: u64, max: u64 },

    #[error("Invalid staff name {0:?}: ASCII only, at most 10 bytes")]
    InvalidName(String),

    #[error("Card code {0} does not fit 3 bytes")]
    CardCodeRange(u32),

    #[error("Fingerprint slot must be 1 or 2, got {0}")]
    InvalidFingerSlot(u8),

    /// A window carries its record count in one byte
    #[error("{count} records do not fit one window (max {max})")]
    TooManyRecords { count: usize, max: usize },

    /// Payload shorter than its fixed layout
    #[error("{what} needs {needed} bytes, got {actual}")]
    ShortPayload {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}
