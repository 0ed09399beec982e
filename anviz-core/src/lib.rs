//! # anviz-core
//!
//! Core protocol implementation for Anviz time and attendance terminals.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC-16 checksum calculation
//! - Command and status definitions
//! - Byte accumulation for stream transports
//! - Protocol constants

pub mod buffer;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod status;

pub use buffer::FrameBuffer;
pub use command::Command;
pub use constants::ClearKind;
pub use error::{Error, Result};
pub use frame::{decode_response, encode_request, DeviceId, Frame, Request};
pub use status::Status;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default device port
pub const DEFAULT_PORT: u16 = 5010;

/// Maximum frame payload size
pub const MAX_PAYLOAD_SIZE: usize = frame::MAX_PAYLOAD_SIZE;
