//! # anviz
//!
//! Rust client for Anviz time and attendance terminals.
//!
//! ## Features
//!
//! - Type-safe frame codec with CRC-16 validation
//! - Async/await API using Tokio
//! - Chunked staff and attendance transfers with per-window retries
//! - Concurrent operations on one connection, correlated by command code
//!
//! ## Quick Start
//!
//! ```no_run
//! use anviz::{Device, DeviceId};
//!
//! #[tokio::main]
//! async fn main() -> anviz::Result<()> {
//!     // Connect to device
//!     let mut device = Device::new("192.168.1.218", DeviceId::new(1)?);
//!     device.connect().await?;
//!
//!     // Read the clock
//!     let now = device.get_datetime().await?;
//!     println!("Device time: {}", now);
//!
//!     // Disconnect
//!     device.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod correlator;
pub mod device;
pub mod error;
pub mod transfer;

// Re-exports
pub use device::Device;
pub use error::{Error, Result};
pub use transfer::{RetryPolicy, UploadSummary};

// Re-export types
pub use anviz_core::{ClearKind, Command, DeviceId, Frame, Status};
pub use anviz_types::{
    AttendanceRecord, DeviceInfo, FingerSlot, FingerSlots, FingerprintTemplate, RecordCounts,
    StaffRecord,
};
