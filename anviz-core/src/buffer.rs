//! Frame buffer for accumulating partial reads.
//!
//! One transport read is not one frame: a read may end halfway through a
//! frame or carry several of them. Bytes are kept in a single `BytesMut`
//! until the length announced by the header is available, exactly that slice
//! is decoded, and the remainder stays buffered for the next frame.

use bytes::{Buf, BytesMut};

use crate::{
    constants::START_MARKER,
    error::{Error, Result},
    frame::{Frame, MAX_PAYLOAD_SIZE},
};

/// Default buffer capacity
const DEFAULT_CAPACITY: usize = 4 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// # Examples
///
/// ```
/// use anviz_core::{Command, DeviceId, Frame, FrameBuffer, Status};
///
/// let frame = Frame::new(DeviceId::new(1).unwrap(), Command::BasicInfo, Status::Success, vec![1, 2, 3]);
/// let encoded = frame.encode().unwrap();
///
/// let mut buffer = FrameBuffer::new();
/// buffer.push(&encoded[..4]);
/// assert!(buffer.next_frame().is_none());
///
/// buffer.push(&encoded[4..]);
/// let decoded = buffer.next_frame().unwrap().unwrap();
/// assert_eq!(decoded, frame);
/// ```
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes read from the transport
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `None` if more data is needed
    /// - `Some(Ok(frame))` if a complete frame was extracted
    /// - `Some(Err(..))` if bytes were discarded; call again to continue
    ///
    /// Bytes ahead of a start marker are skipped. A complete frame that fails
    /// validation is dropped as a whole. A header announcing more than 400
    /// payload bytes cannot be a frame boundary, so only its marker byte is
    /// dropped before scanning resumes.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        let first = *self.buffer.first()?;

        if first != START_MARKER {
            let skip = self
                .buffer
                .iter()
                .position(|&b| b == START_MARKER)
                .unwrap_or(self.buffer.len());
            self.buffer.advance(skip);
            return Some(Err(Error::InvalidStartMarker(first)));
        }

        let total = Frame::encoded_len(&self.buffer)?;
        let declared = total - Frame::MIN_SIZE;
        if declared > MAX_PAYLOAD_SIZE {
            self.buffer.advance(1);
            return Some(Err(Error::PayloadTooLarge {
                size: declared,
                max: MAX_PAYLOAD_SIZE,
            }));
        }

        if self.buffer.len() < total {
            return None;
        }

        let raw = self.buffer.split_to(total);
        Some(Frame::decode(&raw))
    }

    /// Drain every complete frame currently buffered
    pub fn drain_frames(&mut self) -> Vec<Result<Frame>> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes waiting for the rest of their frame
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::Command, frame::DeviceId, status::Status};
    use pretty_assertions::assert_eq;

    fn frame(command: Command, payload: Vec<u8>) -> Frame {
        Frame::new(DeviceId::new(1).unwrap(), command, Status::Success, payload)
    }

    fn frames_only(results: Vec<Result<Frame>>) -> Vec<Frame> {
        results.into_iter().filter_map(|r| r.ok()).collect()
    }

    #[test]
    fn test_single_frame() {
        let f = frame(Command::RecordCounts, vec![0; 18]);
        let mut buffer = FrameBuffer::new();
        buffer.push(&f.encode().unwrap());

        assert_eq!(buffer.next_frame().unwrap().unwrap(), f);
        assert!(buffer.next_frame().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let f = frame(Command::DownloadStaff, vec![7; 28]);
        let encoded = f.encode().unwrap();
        let mut buffer = FrameBuffer::new();

        for (i, byte) in encoded.iter().enumerate() {
            buffer.push(&[*byte]);
            let result = buffer.next_frame();
            if i + 1 < encoded.len() {
                assert!(result.is_none(), "frame emitted early at byte {}", i);
            } else {
                assert_eq!(result.unwrap().unwrap(), f);
            }
        }
    }

    #[test]
    fn test_coalesced_frames_with_remainder() {
        let a = frame(Command::BasicInfo, vec![1, 2, 3]);
        let b = frame(Command::ExtendedInfo, vec![4, 5]);
        let c = frame(Command::GetDateTime, vec![0x0E, 7, 15, 12, 16, 28]);

        let mut wire = Vec::new();
        wire.extend_from_slice(&a.encode().unwrap());
        wire.extend_from_slice(&b.encode().unwrap());
        let c_bytes = c.encode().unwrap();
        wire.extend_from_slice(&c_bytes[..5]);

        let mut buffer = FrameBuffer::new();
        buffer.push(&wire);
        assert_eq!(frames_only(buffer.drain_frames()), vec![a, b]);
        assert_eq!(buffer.len(), 5);

        buffer.push(&c_bytes[5..]);
        assert_eq!(frames_only(buffer.drain_frames()), vec![c]);
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let f = frame(Command::ClearAllRecords, vec![]);
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0x00, 0x13, 0x37]);
        buffer.push(&f.encode().unwrap());

        let results = buffer.drain_frames();
        assert!(matches!(results[0], Err(Error::InvalidStartMarker(0x00))));
        assert_eq!(frames_only(results), vec![f]);
    }

    #[test]
    fn test_corrupt_frame_dropped_next_frame_survives() {
        let bad = frame(Command::BasicInfo, vec![1, 2, 3]);
        let good = frame(Command::ExtendedInfo, vec![9]);

        let mut bad_bytes = bad.encode().unwrap();
        bad_bytes[10] ^= 0xFF;

        let mut buffer = FrameBuffer::new();
        buffer.push(&bad_bytes);
        buffer.push(&good.encode().unwrap());

        let results = buffer.drain_frames();
        assert!(matches!(results[0], Err(Error::ChecksumMismatch { .. })));
        assert_eq!(frames_only(results), vec![good]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversize_header_drops_marker_only() {
        let good = frame(Command::BasicInfo, vec![1]);

        let mut buffer = FrameBuffer::new();
        // marker, id, code, status, length 0xFFFF
        buffer.push(&[0xA5, 0, 0, 0, 1, 0xB0, 0, 0xFF, 0xFF]);
        buffer.push(&good.encode().unwrap());

        let results = buffer.drain_frames();
        assert!(matches!(results[0], Err(Error::PayloadTooLarge { .. })));
        assert_eq!(frames_only(results), vec![good]);
    }

    #[test]
    fn test_partial_header_waits() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0xA5, 0, 0]);

        assert!(buffer.next_frame().is_none());
        assert_eq!(buffer.len(), 3);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
