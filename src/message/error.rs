//! Encoding and decoding errors.

use super::ValueKind;
use thiserror::Error;

/// A value could not be represented on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// A string, byte string, sequence or map exceeds the `u32` length prefix.
    #[error("{kind} of length {len} exceeds the wire limit of {max}")]
    TooLong {
        /// Kind of the oversized value.
        kind: ValueKind,
        /// Its length.
        len: usize,
        /// The maximum representable length.
        max: usize,
    },

    /// Values are nested deeper than the decoder would accept.
    #[error("value nesting exceeds {max} levels")]
    TooDeep {
        /// The depth limit.
        max: usize,
    },
}

/// Bytes could not be decoded into a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodingError {
    /// Input ended before a value was complete.
    #[error("truncated input: need {need} bytes at offset {offset}, {available} available")]
    Truncated {
        /// Byte offset where the read started.
        offset: usize,
        /// Bytes required.
        need: usize,
        /// Bytes remaining.
        available: usize,
    },

    /// A type tag that this decoder does not know.
    #[error("unknown value tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// The tag byte.
        tag: u8,
        /// Its offset.
        offset: usize,
    },

    /// A string value was not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string payload.
        offset: usize,
    },

    /// Nesting exceeded the decoder limit.
    #[error("value nesting exceeds {max} levels")]
    TooDeep {
        /// The depth limit.
        max: usize,
    },

    /// The top-level value is not a sequence headed by a name string.
    #[error("not a message: {0}")]
    NotAMessage(&'static str),

    /// Bytes remained after the message ended.
    #[error("{count} trailing bytes after message")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// A frame header announced more bytes than the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}
