//! Error types for westfield-server.

use thiserror::Error;

use crate::protocol::ObjectId;

/// Error codes posted to the peer before a connection is torn down.
pub mod codes {
    /// Frame addressed a missing object, or an object argument did not resolve.
    pub const INVALID_OBJECT: u32 = 0;
    /// Opcode out of range, malformed arguments or bad framing.
    pub const INVALID_METHOD: u32 = 1;
    /// Id space or object table exhausted.
    pub const NO_MEMORY: u32 = 2;
    /// Anything the runtime could not classify.
    pub const IMPLEMENTATION: u32 = 3;
}

/// Main error type for all westfield operations.
#[derive(Debug, Error)]
pub enum WestfieldError {
    /// I/O error reported by a transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Truncated, misaligned or over/under-consumed frame.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Frame or argument referenced an object id that is not live.
    #[error("Unknown object id: {0}")]
    UnknownObject(ObjectId),

    /// Opcode not present in the addressed object's request table.
    #[error("Unknown opcode {opcode} for object {object_id}")]
    UnknownOpcode { object_id: ObjectId, opcode: u16 },

    /// Bind request named a global that is not registered.
    #[error("Unknown global name: {0}")]
    UnknownGlobal(u32),

    /// Object id already in use, or outside the range its allocator may use.
    #[error("Object id collision: {0}")]
    IdCollision(ObjectId),

    /// String argument was not plain ASCII.
    #[error("Invalid string argument: {0}")]
    InvalidString(String),

    /// Encoded frame does not fit the 16-bit size field.
    #[error("Message size {0} exceeds maximum")]
    MessageTooLarge(usize),

    /// Bind asked for a version the global does not provide.
    #[error("Unsupported version {requested} for {interface} (max {supported})")]
    UnsupportedVersion {
        interface: String,
        requested: u32,
        supported: u32,
    },

    /// Server-side id counter ran past the top of the id space.
    #[error("Server object ids exhausted")]
    IdsExhausted,

    /// Per-connection object table is full.
    #[error("Object limit of {0} reached")]
    ResourceLimit(usize),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection is closing or closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl WestfieldError {
    /// Whether this error is a protocol violation by the peer.
    ///
    /// Every protocol violation is fatal to the connection it happened on.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            WestfieldError::Framing(_)
                | WestfieldError::UnknownObject(_)
                | WestfieldError::UnknownOpcode { .. }
                | WestfieldError::UnknownGlobal(_)
                | WestfieldError::IdCollision(_)
                | WestfieldError::InvalidString(_)
                | WestfieldError::MessageTooLarge(_)
                | WestfieldError::UnsupportedVersion { .. }
                | WestfieldError::IdsExhausted
                | WestfieldError::ResourceLimit(_)
        )
    }

    /// Error code carried by the error event sent to the peer.
    pub fn error_code(&self) -> u32 {
        match self {
            WestfieldError::UnknownObject(_) | WestfieldError::IdCollision(_) => {
                codes::INVALID_OBJECT
            }
            WestfieldError::Framing(_)
            | WestfieldError::UnknownOpcode { .. }
            | WestfieldError::UnknownGlobal(_)
            | WestfieldError::InvalidString(_)
            | WestfieldError::MessageTooLarge(_)
            | WestfieldError::UnsupportedVersion { .. } => codes::INVALID_METHOD,
            WestfieldError::IdsExhausted | WestfieldError::ResourceLimit(_) => codes::NO_MEMORY,
            WestfieldError::Io(_)
            | WestfieldError::Json(_)
            | WestfieldError::InvalidConfig(_)
            | WestfieldError::ConnectionClosed => codes::IMPLEMENTATION,
        }
    }
}

/// Result type alias using WestfieldError.
pub type Result<T> = std::result::Result<T, WestfieldError>;
