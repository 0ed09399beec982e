//! Protocol constants

/// First byte of every frame
pub const START_MARKER: u8 = 0xA5;

/// Largest device id the firmware accepts
pub const MAX_DEVICE_ID: u32 = 99_999_999;

/// Default connection timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Delay before an unanswered window is sent again (milliseconds)
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;

/// Retransmissions allowed per window
pub const MAX_RETRIES: u32 = 3;

/// Hard limit for a single window, retries included (seconds)
pub const DEFAULT_WINDOW_DEADLINE: u64 = 10;

/// Records per window for each chunked command
pub mod windows {
    /// Staff records per download or upload window
    pub const STAFF: usize = 12;

    /// Attendance records per download window
    pub const ATTENDANCE: usize = 25;
}

/// First payload byte of chunked download requests
pub mod transfer_flags {
    /// Continue where the previous window stopped
    pub const CONTINUE: u8 = 0x00;

    /// First staff window
    pub const STAFF_START: u8 = 0x01;

    /// First attendance window
    pub const ATTENDANCE_START: u8 = 0x02;
}

/// Type byte for the clear-new-records command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClearKind {
    /// Clear the flag on every record
    All = 0x00,

    /// Clear the flag on the first `count` new records
    Count = 0x01,

    /// Clear the flag on all new records
    #[default]
    AllNew = 0x02,
}
