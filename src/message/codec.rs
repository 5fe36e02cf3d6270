//! Tagged binary codec for [`Message`] and [`Value`].

use super::{DecodingError, EncodingError, Message, Value, ValueKind};
use bytes::BufMut;

/// Maximum nesting depth accepted by both encoder and decoder.
pub const MAX_DEPTH: usize = 64;

const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_STR: u8 = 0x06;
const TAG_SEQ: u8 = 0x07;
const TAG_MAP: u8 = 0x08;

const MAX_LEN: usize = u32::MAX as usize;

/// Encode a message into a fresh buffer.
///
/// # Errors
///
/// Returns [`EncodingError`] if a value exceeds the wire length limit or the
/// nesting limit. Nothing is returned on failure.
pub fn encode(message: &Message) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(64);
    encode_into(message, &mut out)?;
    Ok(out)
}

/// Encode a message, appending to `out`.
///
/// On failure `out` is truncated back to its original length.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_into(message: &Message, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    let start = out.len();
    let result = write_message(message, out);
    if result.is_err() {
        out.truncate(start);
    }
    result
}

fn write_message(message: &Message, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    let count = check_len(ValueKind::Seq, message.values().len() + 1)?;
    out.put_u8(TAG_SEQ);
    out.put_u32(count);
    write_str(message.name(), out)?;
    for value in message.values() {
        write_value(value, out, 1)?;
    }
    Ok(())
}

fn check_len(kind: ValueKind, len: usize) -> Result<u32, EncodingError> {
    u32::try_from(len).map_err(|_| EncodingError::TooLong {
        kind,
        len,
        max: MAX_LEN,
    })
}

fn write_str(s: &str, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    let len = check_len(ValueKind::Str, s.len())?;
    out.put_u8(TAG_STR);
    out.put_u32(len);
    out.put_slice(s.as_bytes());
    Ok(())
}

fn write_value(value: &Value, out: &mut Vec<u8>, depth: usize) -> Result<(), EncodingError> {
    if depth > MAX_DEPTH {
        return Err(EncodingError::TooDeep { max: MAX_DEPTH });
    }
    match value {
        Value::Bool(false) => out.put_u8(TAG_FALSE),
        Value::Bool(true) => out.put_u8(TAG_TRUE),
        Value::Int(i) => {
            out.put_u8(TAG_INT);
            out.put_i64(*i);
        }
        Value::Float(x) => {
            out.put_u8(TAG_FLOAT);
            out.put_f64(*x);
        }
        Value::Bytes(b) => {
            let len = check_len(ValueKind::Bytes, b.len())?;
            out.put_u8(TAG_BYTES);
            out.put_u32(len);
            out.put_slice(b);
        }
        Value::Str(s) => write_str(s, out)?,
        Value::Seq(items) => {
            let len = check_len(ValueKind::Seq, items.len())?;
            out.put_u8(TAG_SEQ);
            out.put_u32(len);
            for item in items {
                write_value(item, out, depth + 1)?;
            }
        }
        Value::Map(pairs) => {
            let len = check_len(ValueKind::Map, pairs.len())?;
            out.put_u8(TAG_MAP);
            out.put_u32(len);
            for (k, v) in pairs {
                write_value(k, out, depth + 1)?;
                write_value(v, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Decode exactly one message from `input`.
///
/// # Errors
///
/// Returns [`DecodingError`] on truncated or malformed input, or when bytes
/// remain after the message.
pub fn decode(input: &[u8]) -> Result<Message, DecodingError> {
    let mut reader = Reader { input, pos: 0 };

    let tag = reader.u8()?;
    if tag != TAG_SEQ {
        return Err(DecodingError::NotAMessage("top-level value is not a sequence"));
    }
    let count = reader.len()?;
    if count == 0 {
        return Err(DecodingError::NotAMessage("empty sequence has no name"));
    }
    let Value::Str(name) = reader.value(1)? else {
        return Err(DecodingError::NotAMessage("first element is not a name string"));
    };
    let mut values = Vec::with_capacity((count - 1).min(reader.remaining()));
    for _ in 1..count {
        values.push(reader.value(1)?);
    }

    if reader.remaining() > 0 {
        return Err(DecodingError::TrailingBytes {
            count: reader.remaining(),
        });
    }
    Ok(Message::new(name, values))
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodingError> {
        if self.remaining() < n {
            return Err(DecodingError::Truncated {
                offset: self.pos,
                need: n,
                available: self.remaining(),
            });
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodingError> {
        Ok(self.take(1)?[0])
    }

    fn array8(&mut self) -> Result<[u8; 8], DecodingError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(buf)
    }

    fn len(&mut self) -> Result<usize, DecodingError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf) as usize)
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodingError> {
        if depth > MAX_DEPTH {
            return Err(DecodingError::TooDeep { max: MAX_DEPTH });
        }
        let offset = self.pos;
        match self.u8()? {
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_INT => Ok(Value::Int(i64::from_be_bytes(self.array8()?))),
            TAG_FLOAT => Ok(Value::Float(f64::from_be_bytes(self.array8()?))),
            TAG_BYTES => {
                let len = self.len()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            TAG_STR => {
                let len = self.len()?;
                let start = self.pos;
                let raw = self.take(len)?;
                std::str::from_utf8(raw)
                    .map(|s| Value::Str(s.to_string()))
                    .map_err(|_| DecodingError::InvalidUtf8 { offset: start })
            }
            TAG_SEQ => {
                let count = self.len()?;
                // Every item needs at least one byte; cap the allocation hint.
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Ok(Value::Seq(items))
            }
            TAG_MAP => {
                let count = self.len()?;
                let mut pairs = Vec::with_capacity(count.min(self.remaining() / 2));
                for _ in 0..count {
                    let k = self.value(depth + 1)?;
                    let v = self.value(depth + 1)?;
                    pairs.push((k, v));
                }
                Ok(Value::Map(pairs))
            }
            tag => Err(DecodingError::UnknownTag { tag, offset }),
        }
    }
}
