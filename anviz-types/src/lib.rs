//! Record types for anviz
//!
//! Fixed-width layouts exchanged with the terminals. Decoding is total:
//! fields the host does not interpret are kept as opaque values so a record
//! can be written back byte for byte.

pub mod attendance;
pub mod clock;
pub mod device_info;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod staff;

pub use attendance::AttendanceRecord;
pub use device_info::{DeviceInfo, DeviceInfoBlock, InfoKind, RecordCounts};
pub use error::{Error, Result};
pub use fingerprint::{FingerSlot, FingerSlots, FingerprintTemplate};
pub use record::{decode_records, encode_records, WireRecord};
pub use staff::StaffRecord;
