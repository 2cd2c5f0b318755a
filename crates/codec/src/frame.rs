//! Length-prefixed broker frame.
//!
//! Layout, all little-endian:
//!
//! ```text
//! i32 total_length | i32 queue_name_length | queue_name utf-8 | payload
//! ```
//!
//! `total_length` counts everything after itself, i.e.
//! `4 + queue_name_length + payload_length`. The broker answers each frame
//! with 4 bytes whose first three are `ACK`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Bytes the broker sends back after a frame. Only the prefix is checked.
pub const ACK_BYTES: &[u8; 3] = b"ACK";
/// The acknowledgement is always 4 bytes on the wire.
pub const ACK_LEN: usize = 4;

/// A decoded frame, used by tests and any broker-side tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub queue_name: String,
    pub payload: Vec<u8>,
}

/// Encode one frame for `queue_name` carrying `payload`.
pub fn encode_frame(queue_name: &str, payload: &[u8]) -> Bytes {
    let name = queue_name.as_bytes();
    let total = 4 + name.len() + payload.len();
    let mut buf = BytesMut::with_capacity(4 + total);
    buf.put_i32_le(total as i32);
    buf.put_i32_le(name.len() as i32);
    buf.put_slice(name);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode one frame from the front of `buf`, returning it along with the
/// number of bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
    if buf.len() < 8 {
        return Err(FrameError::TooShort {
            got: buf.len(),
            need: 8,
        });
    }
    let mut cursor = buf;
    let total = cursor.get_i32_le();
    let name_len = cursor.get_i32_le();
    if total < 4 || name_len < 0 {
        return Err(FrameError::LengthMismatch {
            declared: total.max(0) as usize,
            actual: buf.len().saturating_sub(4),
        });
    }
    let total = total as usize;
    let name_len = name_len as usize;
    if name_len + 4 > total {
        return Err(FrameError::LengthMismatch {
            declared: total,
            actual: name_len + 4,
        });
    }
    if buf.len() < 4 + total {
        return Err(FrameError::TooShort {
            got: buf.len(),
            need: 4 + total,
        });
    }
    let payload_len = total - 4 - name_len;
    let queue_name = std::str::from_utf8(&cursor[..name_len])
        .map_err(|_| FrameError::BadQueueName)?
        .to_string();
    let payload = cursor[name_len..name_len + payload_len].to_vec();
    Ok((
        Frame {
            queue_name,
            payload,
        },
        4 + total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let frame = encode_frame("realtime_data_queue", b"{\"records\":[]}");
        let (decoded, consumed) = decode_frame(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded.queue_name, "realtime_data_queue");
        assert_eq!(decoded.payload, b"{\"records\":[]}");
    }

    #[test]
    fn total_length_counts_everything_after_itself() {
        let frame = encode_frame("q", b"abc");
        let total = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(total as usize, 4 + 1 + 3);
        let name_len = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        assert_eq!(name_len, 1);
        assert_eq!(frame.len(), 4 + total as usize);
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let frame = encode_frame("queue", b"payload");
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 1]),
            Err(FrameError::TooShort { .. })
        ));
        assert!(matches!(
            decode_frame(&frame[..6]),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn decode_rejects_inconsistent_lengths() {
        let mut bad = BytesMut::new();
        bad.put_i32_le(4); // total says "no name, no payload"
        bad.put_i32_le(9); // but the name claims 9 bytes
        bad.put_slice(b"queuename");
        assert!(matches!(
            decode_frame(&bad),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_handles_back_to_back_frames() {
        let mut stream = encode_frame("a", b"1").to_vec();
        stream.extend_from_slice(&encode_frame("b", b"22"));
        let (first, used) = decode_frame(&stream).unwrap();
        assert_eq!(first.queue_name, "a");
        let (second, _) = decode_frame(&stream[used..]).unwrap();
        assert_eq!(second.queue_name, "b");
        assert_eq!(second.payload, b"22");
    }
}
