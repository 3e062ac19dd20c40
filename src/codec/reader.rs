//! Argument reader for inbound frames.
//!
//! [`ArgsReader`] walks a frame payload word by word. Object arguments are
//! resolved against the connection's object table through [`ObjectLookup`].
//! Strings and arrays consume the padding the encoder inserted, so the next
//! argument always starts on a word boundary.

use bytes::Bytes;

use super::{Arg, Fixed};
use crate::error::{Result, WestfieldError};
use crate::protocol::{align4, ObjectId, NULL_ID};
use crate::resource::Resource;

/// Resolves object ids to live resources.
pub trait ObjectLookup {
    /// Get the live resource for `id`.
    fn lookup(&self, id: ObjectId) -> Option<Resource>;
}

/// Cursor over the arguments of one frame.
pub struct ArgsReader<'a> {
    payload: Bytes,
    position: usize,
    objects: &'a dyn ObjectLookup,
}

impl<'a> ArgsReader<'a> {
    /// Create a reader over a frame payload.
    pub fn new(payload: Bytes, objects: &'a dyn ObjectLookup) -> Self {
        Self {
            payload,
            position: 0,
            objects,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.position
    }

    /// Check that every payload byte was consumed.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WestfieldError::Framing(format!(
                "{} unconsumed bytes after arguments",
                n
            ))),
        }
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(WestfieldError::Framing(format!(
                "Argument needs {} bytes, {} remaining",
                len,
                self.remaining()
            )));
        }
        let bytes = self.payload.slice(self.position..self.position + len);
        self.position += len;
        Ok(bytes)
    }

    fn read_word(&mut self) -> Result<[u8; 4]> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Length-prefixed, padded byte run.
    fn read_padded(&mut self) -> Result<Bytes> {
        let len = self.read_uint()? as usize;
        if len > self.remaining() {
            return Err(WestfieldError::Framing(format!(
                "Length prefix {} exceeds {} remaining bytes",
                len,
                self.remaining()
            )));
        }
        let padded = align4(len);
        let bytes = self.take(padded)?;
        Ok(bytes.slice(..len))
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_word()?))
    }

    pub fn read_uint(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_word()?))
    }

    pub fn read_fixed(&mut self) -> Result<Fixed> {
        Ok(Fixed::from_raw(self.read_int()?))
    }

    /// Read an ASCII string. Non-ASCII bytes are rejected.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_padded()?;
        if !bytes.is_ascii() {
            return Err(WestfieldError::InvalidString(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        // ASCII is valid UTF-8
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// Read a nullable string; a zero length means absent.
    pub fn read_string_opt(&mut self) -> Result<Option<String>> {
        let s = self.read_string()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    /// Read a byte array (zero-copy slice of the frame).
    pub fn read_array(&mut self) -> Result<Bytes> {
        self.read_padded()
    }

    /// Read a nullable array; a zero length means absent.
    pub fn read_array_opt(&mut self) -> Result<Option<Bytes>> {
        let a = self.read_array()?;
        Ok(if a.is_empty() { None } else { Some(a) })
    }

    /// Read an object reference that must resolve to a live resource.
    pub fn read_object(&mut self) -> Result<Resource> {
        let id = self.read_uint()?;
        self.objects
            .lookup(id)
            .ok_or(WestfieldError::UnknownObject(id))
    }

    /// Read a nullable object reference; id 0 means absent.
    pub fn read_object_opt(&mut self) -> Result<Option<Resource>> {
        let id = self.read_uint()?;
        if id == NULL_ID {
            return Ok(None);
        }
        self.objects
            .lookup(id)
            .map(Some)
            .ok_or(WestfieldError::UnknownObject(id))
    }

    /// Read the id of an object the peer is introducing.
    pub fn read_new_id(&mut self) -> Result<ObjectId> {
        self.read_uint()
    }

    /// Decode arguments against a signature string.
    ///
    /// Characters: `i` int, `u` uint, `f` fixed, `s` string, `a` array,
    /// `o` object, `n` new_id. A `?` prefix marks the next argument nullable;
    /// absent values decode as [`Arg::Null`]. Whitespace is ignored.
    pub fn read_args(&mut self, signature: &str) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        let mut nullable = false;

        for c in signature.chars().filter(|c| !c.is_whitespace()) {
            if c == '?' {
                nullable = true;
                continue;
            }
            let arg = match (c, nullable) {
                ('i', _) => Arg::Int(self.read_int()?),
                ('u', _) => Arg::Uint(self.read_uint()?),
                ('f', _) => Arg::Fixed(self.read_fixed()?),
                ('n', _) => Arg::NewId(self.read_new_id()?),
                ('s', false) => Arg::String(self.read_string()?),
                ('s', true) => self.read_string_opt()?.map_or(Arg::Null, Arg::String),
                ('a', false) => Arg::Array(self.read_array()?),
                ('a', true) => self.read_array_opt()?.map_or(Arg::Null, Arg::Array),
                ('o', false) => Arg::Object(self.read_object()?.id()),
                ('o', true) => self
                    .read_object_opt()?
                    .map_or(Arg::Null, |r| Arg::Object(r.id())),
                (other, _) => {
                    return Err(WestfieldError::Framing(format!(
                        "Unknown signature character '{}'",
                        other
                    )))
                }
            };
            args.push(arg);
            nullable = false;
        }

        Ok(args)
    }
}
