//! Anviz frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{MAX_DEVICE_ID, START_MARKER},
    error::{Error, Result},
    status::Status,
};

/// Largest payload a frame may carry
pub const MAX_PAYLOAD_SIZE: usize = 400;

/// Trailing CRC-16 size
pub const CHECKSUM_SIZE: usize = 2;

/// Device identifier carried in every frame
///
/// The firmware accepts 0 through 99,999,999; anything else is rejected at
/// construction time so an invalid id never reaches the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Validate a device id
    ///
    /// # Examples
    ///
    /// ```
    /// use anviz_core::DeviceId;
    ///
    /// assert!(DeviceId::new(1).is_ok());
    /// assert!(DeviceId::new(-1).is_err());
    /// assert!(DeviceId::new(100_000_000).is_err());
    /// ```
    pub fn new(id: i64) -> Result<Self> {
        if (0..=i64::from(MAX_DEVICE_ID)).contains(&id) {
            Ok(Self(id as u32))
        } else {
            Err(Error::InvalidDeviceId(id))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DeviceId {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(i64::from(value))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request frame (host to device)
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬───────────┬─────────┬─────────┬───────────┬─────────┐
/// │  0xA5  │ Device ID │ Command │ Length  │  Payload  │  CRC16  │
/// │ 1 byte │  4 bytes  │ 1 byte  │ 2 bytes │  N bytes  │ 2 bytes │
/// │        │  (BE u32) │         │(BE u16) │           │(LE u16) │
/// └────────┴───────────┴─────────┴─────────┴───────────┴─────────┘
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    pub device_id: DeviceId,
    pub command: Command,
    pub payload: Bytes,
}

impl Request {
    /// Bytes before the payload
    pub const HEADER_SIZE: usize = 8;

    /// Create a request with empty payload
    pub fn new(device_id: DeviceId, command: Command) -> Self {
        Self {
            device_id,
            command,
            payload: Bytes::new(),
        }
    }

    /// Create a request with payload
    pub fn with_payload(device_id: DeviceId, command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            device_id,
            command,
            payload: payload.into(),
        }
    }

    /// Encode request to bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use anviz_core::{Command, DeviceId, Request};
    ///
    /// let request = Request::new(DeviceId::new(1).unwrap(), Command::ExtendedInfo);
    /// let bytes = request.encode().unwrap();
    /// assert_eq!(&bytes[..], &[0xA5, 0, 0, 0, 1, 0x32, 0, 0, 0x52, 0xB9]);
    /// ```
    pub fn encode(&self) -> Result<BytesMut> {
        check_payload_len(self.payload.len())?;

        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE);
        buf.put_u8(START_MARKER);
        buf.put_u32(self.device_id.get());
        buf.put_u8(self.command.code());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        put_checksum(&mut buf);

        Ok(buf)
    }

    /// Decode a request frame
    ///
    /// Hosts never receive requests; this exists for device simulators.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let body = checked_body(buf, Self::HEADER_SIZE)?;

        let mut cur = body;
        cur.advance(1);
        let device_id = DeviceId::try_from(cur.get_u32())?;
        let command = Command::try_from(cur.get_u8())?;
        cur.advance(2);

        Ok(Self {
            device_id,
            command,
            payload: Bytes::copy_from_slice(cur),
        })
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("device_id", &self.device_id.get())
            .field("command", &self.command)
            .field("payload", &preview(&self.payload))
            .finish()
    }
}

/// Encode a request straight from its parts
///
/// Fails with [`Error::InvalidDeviceId`] unless `0 <= device_id <= 99_999_999`.
pub fn encode_request(device_id: i64, command: Command, payload: &[u8]) -> Result<BytesMut> {
    let device_id = DeviceId::new(device_id)?;
    Request::with_payload(device_id, command, Bytes::copy_from_slice(payload)).encode()
}

/// Response frame (device to host)
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬───────────┬──────────┬────────┬─────────┬─────────┬─────────┐
/// │  0xA5  │ Device ID │ Cmd|0x80 │ Status │ Length  │ Payload │  CRC16  │
/// │ 1 byte │  4 bytes  │  1 byte  │ 1 byte │ 2 bytes │ N bytes │ 2 bytes │
/// └────────┴───────────┴──────────┴────────┴─────────┴─────────┴─────────┘
/// ```
///
/// The CRC covers every byte before it, start marker included.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Device that produced the frame
    pub device_id: DeviceId,

    /// Command this frame answers
    pub command: Command,

    /// Result code
    pub status: Status,

    /// Command-specific data
    pub payload: Bytes,
}

impl Frame {
    /// Bytes before the payload
    pub const HEADER_SIZE: usize = 9;

    /// Smallest possible frame (empty payload)
    pub const MIN_SIZE: usize = Self::HEADER_SIZE + CHECKSUM_SIZE;

    /// Create a response frame
    pub fn new(device_id: DeviceId, command: Command, status: Status, payload: impl Into<Bytes>) -> Self {
        Self {
            device_id,
            command,
            status,
            payload: payload.into(),
        }
    }

    /// Total encoded size announced by a buffered header
    ///
    /// Returns `None` until the header is complete.
    pub fn encoded_len(header: &[u8]) -> Option<usize> {
        if header.len() < Self::HEADER_SIZE {
            return None;
        }
        let declared = u16::from_be_bytes([header[7], header[8]]) as usize;
        Some(Self::HEADER_SIZE + declared + CHECKSUM_SIZE)
    }

    /// Encode with the response flag set on the command byte
    pub fn encode(&self) -> Result<BytesMut> {
        check_payload_len(self.payload.len())?;

        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE);
        buf.put_u8(START_MARKER);
        buf.put_u32(self.device_id.get());
        buf.put_u8(self.command.response_code());
        buf.put_u8(self.status.code());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        put_checksum(&mut buf);

        Ok(buf)
    }

    /// Decode a response frame
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - First byte is not `0xA5`
    /// - Buffer is shorter than the declared length requires
    /// - Declared length exceeds 400 bytes or disagrees with the buffer
    /// - Checksum verification fails
    /// - Code byte is not a known command with the response flag
    ///
    /// # Examples
    ///
    /// ```
    /// use anviz_core::{Command, Frame, Status};
    ///
    /// let raw = [
    ///     0xA5, 0x00, 0x00, 0x00, 0x01, 0xB8, 0x00, 0x00, 0x06,
    ///     0x0E, 0x07, 0x0F, 0x0C, 0x10, 0x1C, 0x71, 0x38,
    /// ];
    /// let frame = Frame::decode(&raw).unwrap();
    /// assert_eq!(frame.command, Command::GetDateTime);
    /// assert_eq!(frame.status, Status::Success);
    /// assert_eq!(frame.payload.len(), 6);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let body = checked_body(buf, Self::HEADER_SIZE)?;

        let mut cur = body;
        cur.advance(1);
        let device_id = DeviceId::try_from(cur.get_u32())?;
        let command = Command::from_response_code(cur.get_u8())?;
        let status = Status::from(cur.get_u8());
        cur.advance(2);

        Ok(Self {
            device_id,
            command,
            status,
            payload: Bytes::copy_from_slice(cur),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }
}

/// Decode one response frame
pub fn decode_response(buf: &[u8]) -> Result<Frame> {
    Frame::decode(buf)
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("device_id", &self.device_id.get())
            .field("command", &self.command)
            .field("status", &self.status)
            .field("payload", &preview(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](device={}, status={}, len={})",
            self.command,
            self.device_id,
            self.status,
            self.payload.len()
        )
    }
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

fn put_checksum(buf: &mut BytesMut) {
    let crc = checksum::calculate(&buf[..]);
    buf.put_u16_le(crc);
}

/// Validate marker, length and CRC; returns the bytes the CRC covers
fn checked_body(buf: &[u8], header_size: usize) -> Result<&[u8]> {
    if buf.len() < header_size + CHECKSUM_SIZE {
        return Err(Error::TruncatedFrame {
            expected: header_size + CHECKSUM_SIZE,
            actual: buf.len(),
        });
    }

    if buf[0] != START_MARKER {
        return Err(Error::InvalidStartMarker(buf[0]));
    }

    let declared = u16::from_be_bytes([buf[header_size - 2], buf[header_size - 1]]) as usize;
    check_payload_len(declared)?;

    let total = header_size + declared + CHECKSUM_SIZE;
    if buf.len() < total {
        return Err(Error::TruncatedFrame {
            expected: total,
            actual: buf.len(),
        });
    }
    if buf.len() > total {
        return Err(Error::LengthMismatch {
            declared,
            actual: buf.len() - header_size - CHECKSUM_SIZE,
        });
    }

    let body = &buf[..header_size + declared];
    let received = u16::from_le_bytes([buf[total - 2], buf[total - 1]]);
    let calculated = checksum::calculate(body);
    if calculated != received {
        return Err(Error::ChecksumMismatch {
            expected: calculated,
            received,
        });
    }

    Ok(body)
}

fn preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(16)];
    if payload.len() > shown.len() {
        format!("{}.. ({} bytes)", hex::encode(shown), payload.len())
    } else {
        hex::encode(shown)
    }
}
