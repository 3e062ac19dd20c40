//! Typed argument values.
//!
//! Every argument occupies a whole number of 32-bit words:
//!
//! | Kind       | Wire form                                   |
//! |------------|---------------------------------------------|
//! | int / uint | 4 bytes                                     |
//! | fixed      | 4 bytes, raw 24.8 value                     |
//! | string     | u32 byte length, ASCII bytes, zero padding  |
//! | array      | u32 byte length, raw bytes, zero padding    |
//! | object     | u32 id, 0 = null                            |
//! | new_id     | u32 id chosen by the allocating side        |
//! | null       | 4 zero bytes (absent nullable argument)     |

use bytes::{BufMut, Bytes};

use super::Fixed;
use crate::protocol::{align4, ObjectId};
use crate::resource::Resource;

/// A single argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    /// Unsigned view of the int kind.
    Uint(u32),
    Fixed(Fixed),
    String(String),
    Array(Bytes),
    /// Reference to an existing object.
    Object(ObjectId),
    /// Id of an object introduced by this message.
    NewId(ObjectId),
    /// Absent nullable object, string or array.
    Null,
}

impl Arg {
    /// Number of bytes this argument occupies on the wire.
    pub fn encoded_size(&self) -> usize {
        match self {
            Arg::String(s) => 4 + align4(s.len()),
            Arg::Array(a) => 4 + align4(a.len()),
            _ => 4,
        }
    }

    /// Append the wire form to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Arg::Int(v) => buf.put_i32_le(*v),
            Arg::Uint(v) => buf.put_u32_le(*v),
            Arg::Fixed(v) => buf.put_i32_le(v.raw()),
            Arg::String(s) => put_padded(buf, s.as_bytes()),
            Arg::Array(a) => put_padded(buf, a),
            Arg::Object(id) | Arg::NewId(id) => buf.put_u32_le(*id),
            Arg::Null => buf.put_u32_le(0),
        }
    }

    /// Signature character for this argument kind.
    pub fn signature(&self) -> char {
        match self {
            Arg::Int(_) => 'i',
            Arg::Uint(_) => 'u',
            Arg::Fixed(_) => 'f',
            Arg::String(_) => 's',
            Arg::Array(_) => 'a',
            Arg::Object(_) => 'o',
            Arg::NewId(_) => 'n',
            Arg::Null => '?',
        }
    }
}

fn put_padded<B: BufMut>(buf: &mut B, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
    buf.put_bytes(0, align4(data.len()) - data.len());
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Uint(value)
    }
}

impl From<Fixed> for Arg {
    fn from(value: Fixed) -> Self {
        Arg::Fixed(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::String(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::String(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Array(value)
    }
}

impl From<&Resource> for Arg {
    fn from(value: &Resource) -> Self {
        Arg::Object(value.id())
    }
}

impl From<Option<&Resource>> for Arg {
    fn from(value: Option<&Resource>) -> Self {
        match value {
            Some(resource) => Arg::Object(resource.id()),
            None => Arg::Null,
        }
    }
}
