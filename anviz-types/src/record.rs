//! Fixed-width record framing inside a transfer payload
//!
//! ```text
//! ┌─────────┬──────────┬──────────┬─────┬──────────┐
//! │  Count  │ Record 0 │ Record 1 │ ... │ Record N │
//! │ 1 byte  │  SIZE B  │  SIZE B  │     │  SIZE B  │
//! └─────────┴──────────┴──────────┴─────┴──────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// A record with a fixed wire size
pub trait WireRecord: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode one record; `raw` holds exactly `SIZE` bytes
    fn decode(raw: &[u8]) -> Self;

    /// Append the `SIZE`-byte encoding to `buf`
    fn encode(&self, buf: &mut BytesMut);
}

/// Decode the records of one window payload
///
/// Byte 0 is the count of valid records. At most that many records are
/// decoded from offset 1; trailing bytes too short for a full record are
/// ignored, which guards against a truncated final window.
///
/// # Examples
///
/// ```
/// use anviz_types::{decode_records, AttendanceRecord};
///
/// let mut payload = vec![1u8];
/// payload.extend_from_slice(&[0u8; 14]);
/// payload.extend_from_slice(&[0u8; 5]); // partial record
///
/// let records: Vec<AttendanceRecord> = decode_records(&payload);
/// assert_eq!(records.len(), 1);
/// ```
pub fn decode_records<R: WireRecord>(payload: &[u8]) -> Vec<R> {
    let Some((&count, body)) = payload.split_first() else {
        return Vec::new();
    };

    body.chunks_exact(R::SIZE)
        .take(usize::from(count))
        .map(R::decode)
        .collect()
}

/// Encode records as a count byte followed by each record
pub fn encode_records<R: WireRecord>(records: &[R]) -> Result<Bytes> {
    let count = u8::try_from(records.len()).map_err(|_| Error::TooManyRecords {
        count: records.len(),
        max: usize::from(u8::MAX),
    })?;

    let mut buf = BytesMut::with_capacity(1 + records.len() * R::SIZE);
    buf.put_u8(count);
    for record in records {
        record.encode(&mut buf);
    }

    Ok(buf.freeze())
}
