//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary framing shared by every peer:
//! - 8-byte header encoding/decoding
//! - Object id ranges for client and server allocators
//! - Splitting a transport message into frames

mod frame;
mod frame_reader;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_reader::FrameReader;
pub use wire_format::{
    align4, is_client_id, is_server_id, Header, ObjectId, CLIENT_ID_MAX, ERROR_OPCODE,
    HEADER_SIZE, MAX_MESSAGE_SIZE, NULL_ID, REGISTRY_ID, SERVER_ID_BASE,
};
