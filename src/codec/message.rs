//! Outbound message builder.
//!
//! A [`Message`] is an ordered argument list addressed to an object and
//! opcode. Encoding computes the total size, writes the header and appends
//! every argument.
//!
//! # Example
//!
//! ```
//! use westfield_server::codec::Message;
//!
//! let bytes = Message::new(1, 1)
//!     .arg(7u32)
//!     .arg("wl_output")
//!     .arg(2u32)
//!     .encode()
//!     .unwrap();
//! assert_eq!(bytes.len(), 8 + 4 + 4 + 12 + 4);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::Arg;
use crate::error::{Result, WestfieldError};
use crate::protocol::{Header, ObjectId, HEADER_SIZE, MAX_MESSAGE_SIZE};

/// An event or request ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    object_id: ObjectId,
    opcode: u16,
    args: Vec<Arg>,
}

impl Message {
    /// Create an empty message for `object_id` and `opcode`.
    pub fn new(object_id: ObjectId, opcode: u16) -> Self {
        Self {
            object_id,
            opcode,
            args: Vec::new(),
        }
    }

    /// Create a message from an already built argument list.
    pub fn with_args(object_id: ObjectId, opcode: u16, args: Vec<Arg>) -> Self {
        Self {
            object_id,
            opcode,
            args,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a new_id argument.
    pub fn new_id(mut self, id: ObjectId) -> Self {
        self.args.push(Arg::NewId(id));
        self
    }

    /// Append an object reference by id (0 = null).
    pub fn object(mut self, id: ObjectId) -> Self {
        self.args.push(Arg::Object(id));
        self
    }

    #[inline]
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    #[inline]
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    #[inline]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Total frame size, header included.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.args.iter().map(Arg::encoded_size).sum::<usize>()
    }

    /// Encode into a standalone frame.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoded frame to `buf`.
    ///
    /// Nothing is written when the message is rejected.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let size = self.encoded_size();
        if size > MAX_MESSAGE_SIZE {
            return Err(WestfieldError::MessageTooLarge(size));
        }
        for arg in &self.args {
            if let Arg::String(s) = arg {
                if !s.is_ascii() {
                    return Err(WestfieldError::InvalidString(s.clone()));
                }
            }
        }

        buf.reserve(size);
        buf.put_slice(&Header::new(self.object_id, size as u16, self.opcode).encode());
        for arg in &self.args {
            arg.encode(buf);
        }
        Ok(())
    }
}
