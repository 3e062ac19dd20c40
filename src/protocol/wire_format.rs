//! Wire format encoding and decoding.
//!
//! Implements the 8-byte frame header:
//! ```text
//! ┌────────────┬────────────┬──────────┬──────────────────┐
//! │ Object ID  │ Total size │ Opcode   │ Arguments        │
//! │ uint32 LE  │ uint16 LE  │ uint16 LE│ word aligned     │
//! └────────────┴────────────┴──────────┴──────────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. `total size` counts the header.

use crate::error::{Result, WestfieldError};

/// Protocol object identifier.
pub type ObjectId = u32;

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Largest frame the 16-bit size field can describe.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Null object reference.
pub const NULL_ID: ObjectId = 0;

/// Id of the registry object every connection starts with.
pub const REGISTRY_ID: ObjectId = 1;

/// Highest id a client may allocate.
pub const CLIENT_ID_MAX: ObjectId = 0xFEFF_FFFF;

/// First id of the server allocation range.
pub const SERVER_ID_BASE: ObjectId = 0xFF00_0000;

/// Opcode reserved for the runtime error event. Never a request.
pub const ERROR_OPCODE: u16 = 0;

/// Check if an id belongs to the client allocation range.
#[inline]
pub fn is_client_id(id: ObjectId) -> bool {
    id != NULL_ID && id <= CLIENT_ID_MAX
}

/// Check if an id belongs to the server allocation range.
#[inline]
pub fn is_server_id(id: ObjectId) -> bool {
    id >= SERVER_ID_BASE
}

/// Round up to the next multiple of 4.
#[inline]
pub fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Addressed object.
    pub object_id: ObjectId,
    /// Total frame size in bytes, header included.
    pub size: u16,
    /// Request or event index (1-based, 0 = error event).
    pub opcode: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(object_id: ObjectId, size: u16, opcode: u16) -> Self {
        Self {
            object_id,
            size,
            opcode,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use westfield_server::protocol::Header;
    ///
    /// let header = Header::new(1, 20, 1);
    /// let bytes = header.encode();
    /// assert_eq!(bytes, [1, 0, 0, 0, 20, 0, 1, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.object_id.to_le_bytes());
        buf[4..6].copy_from_slice(&self.size.to_le_bytes());
        buf[6..8].copy_from_slice(&self.opcode.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            object_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            size: u16::from_le_bytes([buf[4], buf[5]]),
            opcode: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }

    /// Validate the declared size against the bytes actually available.
    ///
    /// Checks:
    /// - Size covers at least the header
    /// - Size is word aligned
    /// - Size does not run past the end of the transport message
    pub fn validate(&self, available: usize) -> Result<()> {
        let size = self.size as usize;

        if size < HEADER_SIZE {
            return Err(WestfieldError::Framing(format!(
                "Declared size {} is smaller than the header",
                size
            )));
        }

        if size % 4 != 0 {
            return Err(WestfieldError::Framing(format!(
                "Declared size {} is not word aligned",
                size
            )));
        }

        if size > available {
            return Err(WestfieldError::Framing(format!(
                "Declared size {} exceeds available {} bytes",
                size, available
            )));
        }

        Ok(())
    }

    /// Payload length (size minus header).
    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }

    /// Check if this frame carries the runtime error event.
    #[inline]
    pub fn is_error_event(&self) -> bool {
        self.opcode == ERROR_OPCODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(0xFF00_0001, 24, 2);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_little_endian_byte_order() {
        let header = Header::new(0x0403_0201, 0x0605, 0x0807);
        let bytes = header.encode();

        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 7];
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_validate_size_below_header() {
        let header = Header::new(1, 4, 1);
        let err = header.validate(64).unwrap_err();
        assert!(err.to_string().contains("smaller than the header"));
    }

    #[test]
    fn test_validate_misaligned_size() {
        let header = Header::new(1, 10, 1);
        let err = header.validate(64).unwrap_err();
        assert!(err.to_string().contains("not word aligned"));
    }

    #[test]
    fn test_validate_size_past_end() {
        let header = Header::new(1, 16, 1);
        assert!(header.validate(16).is_ok());
        let err = header.validate(12).unwrap_err();
        assert!(err.to_string().contains("exceeds available"));
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(Header::new(1, 8, 1).payload_len(), 0);
        assert_eq!(Header::new(1, 20, 1).payload_len(), 12);
    }

    #[test]
    fn test_id_ranges() {
        assert!(!is_client_id(NULL_ID));
        assert!(is_client_id(REGISTRY_ID));
        assert!(is_client_id(CLIENT_ID_MAX));
        assert!(!is_client_id(SERVER_ID_BASE));
        assert!(is_server_id(SERVER_ID_BASE));
        assert!(is_server_id(u32::MAX));
        assert!(!is_server_id(CLIENT_ID_MAX));
    }

    #[test]
    fn test_align4() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(3), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(5), 8);
    }

    #[test]
    fn test_error_event_opcode() {
        assert!(Header::new(1, 8, ERROR_OPCODE).is_error_event());
        assert!(!Header::new(1, 8, 1).is_error_event());
    }
}
