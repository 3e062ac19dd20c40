//! Splits one transport message into frames.
//!
//! A binary transport message carries one or more whole frames back to back.
//! Each frame is located by its declared size; payloads are zero-copy slices
//! of the message.
//!
//! # Example
//!
//! ```
//! use westfield_server::protocol::{build_frame, FrameReader, Header};
//! use bytes::Bytes;
//!
//! let mut message = build_frame(&Header::new(1, 8, 1), &[]);
//! message.extend(build_frame(&Header::new(2, 12, 1), &[1, 0, 0, 0]));
//!
//! let frames: Vec<_> = FrameReader::new(Bytes::from(message))
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(frames.len(), 2);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};
use super::Frame;
use crate::error::{Result, WestfieldError};

/// Iterator over the frames of one transport message.
///
/// Yields an error for the first malformed frame and then stops; the bytes
/// after it cannot be resynchronised.
pub struct FrameReader {
    /// The whole transport message.
    message: Bytes,
    /// Offset of the next frame.
    offset: usize,
    /// Set once an error was yielded.
    failed: bool,
}

impl FrameReader {
    /// Create a reader over a transport message.
    pub fn new(message: Bytes) -> Self {
        Self {
            message,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.message.len() - self.offset
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let rest = &self.message[self.offset..];
        let header = Header::decode(rest).ok_or_else(|| {
            WestfieldError::Framing(format!(
                "Trailing {} bytes do not hold a frame header",
                rest.len()
            ))
        })?;
        header.validate(rest.len())?;

        let start = self.offset + HEADER_SIZE;
        let end = self.offset + header.size as usize;
        let payload = self.message.slice(start..end);
        self.offset = end;

        Ok(Frame::new(header, payload))
    }
}

impl Iterator for FrameReader {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining() == 0 {
            return None;
        }
        let frame = self.next_frame();
        if frame.is_err() {
            self.failed = true;
        }
        Some(frame)
    }
}
