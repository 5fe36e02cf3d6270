//! Length-prefixed framing for byte streams.
//!
//! A subprocess pipe delivers bytes in arbitrary chunks. [`FrameDecoder`]
//! buffers partial reads and only yields a message once its whole frame has
//! arrived, so a read that stops mid-frame resumes correctly on the next one.

use super::{decode, encode_into, DecodingError, EncodingError, Message};
use bytes::{Buf, BufMut, BytesMut};

/// Default upper bound on a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Encode `message` as one frame: `u32` big-endian length, then the message.
///
/// # Errors
///
/// Returns [`EncodingError`] if the message cannot be encoded.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(64);
    out.put_u32(0);
    encode_into(message, &mut out)?;
    let len = out.len() - HEADER_LEN;
    let len = u32::try_from(len).map_err(|_| EncodingError::TooLong {
        kind: super::ValueKind::Seq,
        len,
        max: u32::MAX as usize,
    })?;
    out[..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    Ok(out)
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame: usize,
}

impl FrameDecoder {
    /// Create a decoder with [`DEFAULT_MAX_FRAME`].
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    /// Create a decoder with a custom frame limit.
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame,
        }
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete message.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A malformed frame is
    /// consumed and reported so the stream can continue with the next one.
    ///
    /// # Errors
    ///
    /// [`DecodingError::FrameTooLarge`] if the header announces more than the
    /// limit (the buffer is then cleared, as the stream cannot be resynced),
    /// or any decoding error of the frame body.
    pub fn next_message(&mut self) -> Result<Option<Message>, DecodingError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buffer[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame {
            self.buffer.clear();
            return Err(DecodingError::FrameTooLarge {
                len,
                max: self.max_frame,
            });
        }
        if self.buffer.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        let body = self.buffer.split_to(len);
        decode(&body).map(Some)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
