//! Message Envelope: named, positional, self-describing payloads.
//!
//! Every actor in the runtime speaks [`Message`]. The same bytes produced by
//! [`encode`] travel between threads and across the subprocess boundary, so
//! a decoder never needs a schema to inspect or skip fields.
//!
//! # Wire format
//!
//! ```text
//! value   := tag payload
//! 0x01    false
//! 0x02    true
//! 0x03    i64 (8 bytes, big endian)
//! 0x04    f64 (8 bytes, big endian)
//! 0x05    u32 length + raw bytes
//! 0x06    u32 length + UTF-8 bytes
//! 0x07    u32 count  + values
//! 0x08    u32 count  + (key value) pairs
//!
//! message := 0x07 count name:0x06.. args..
//! frame   := u32 length + message
//! ```

mod codec;
mod error;
mod frame;
mod value;

pub use codec::{decode, encode, encode_into, MAX_DEPTH};
pub use error::{DecodingError, EncodingError};
pub use frame::{encode_frame, FrameDecoder, DEFAULT_MAX_FRAME};
pub use value::{Value, ValueKind};

use std::fmt;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Inner {
    name: String,
    values: Vec<Value>,
}

/// An immutable named message.
///
/// Cloning is cheap: the payload is shared, which makes broadcasting to a
/// link set or a subscriber list free of deep copies.
#[derive(Clone, PartialEq)]
pub struct Message(Arc<Inner>);

impl Message {
    /// Build a message from a name and its positional values.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self(Arc::new(Inner {
            name: name.into(),
            values,
        }))
    }

    /// A message with no arguments.
    pub fn signal(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// The message name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// All positional values.
    pub fn values(&self) -> &[Value] {
        &self.0.values
    }

    /// The value at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.0.values.get(index)
    }

    /// Convenience: the string at `index`.
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.arg(index).and_then(Value::as_str)
    }

    /// Convenience: the integer at `index`.
    pub fn int_arg(&self, index: usize) -> Option<i64> {
        self.arg(index).and_then(Value::as_int)
    }

    /// Whether the name is `name`.
    pub fn is(&self, name: &str) -> bool {
        self.0.name == name
    }

    /// The part of the name before the first `.`, or the whole name.
    pub fn namespace(&self) -> &str {
        self.0.name.split_once('.').map_or(&self.0.name, |(ns, _)| ns)
    }

    /// A copy of this message under a different name, same values.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.0.values.clone())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message")
            .field(&self.0.name)
            .field(&self.0.values)
            .finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)?;
        f.write_str("(")?;
        for (i, v) in self.0.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

/// Build a [`Message`] from a name and any values convertible into [`Value`].
///
/// ```
/// use keel::message;
/// let m = message!("buffer.open", "src/main.rs", 42);
/// assert_eq!(m.name(), "buffer.open");
/// assert_eq!(m.int_arg(1), Some(42));
/// ```
#[macro_export]
macro_rules! message {
    ($name:expr) => {
        $crate::message::Message::signal($name)
    };
    ($name:expr, $($value:expr),+ $(,)?) => {
        $crate::message::Message::new(
            $name,
            vec![$($crate::message::Value::from($value)),+],
        )
    };
}
