//! One request or event on the wire.
//!
//! A [`Frame`] pairs a decoded header with its argument bytes. Payloads are
//! `Bytes` slices, so every frame split from one transport message shares
//! that message's buffer.
//!
//! # Example
//!
//! ```
//! use westfield_server::protocol::{Frame, Header};
//! use bytes::Bytes;
//!
//! let header = Header::new(5, 12, 1);
//! let frame = Frame::new(header, Bytes::from_static(&[7, 0, 0, 0]));
//!
//! assert_eq!(frame.object_id(), 5);
//! assert_eq!(frame.payload(), &[7, 0, 0, 0]);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, ObjectId, HEADER_SIZE};

/// A request or event addressed to one object.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Argument bytes following the header.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Encoded arguments.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the addressed object id.
    #[inline]
    pub fn object_id(&self) -> ObjectId {
        self.header.object_id
    }

    /// Get the opcode.
    #[inline]
    pub fn opcode(&self) -> u16 {
        self.header.opcode
    }
}

/// Concatenate a header and an already-encoded payload.
///
/// The header's `size` field is written as given; callers keep it consistent
/// with the payload.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
