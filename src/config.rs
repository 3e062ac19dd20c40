//! Server configuration.
//!
//! Every field has a default, so a config file only needs to name the
//! values it changes:
//!
//! ```
//! use westfield_server::ServerConfig;
//!
//! let config = ServerConfig::from_json(r#"{ "max_objects_per_connection": 128 }"#).unwrap();
//! assert_eq!(config.max_objects_per_connection, 128);
//! assert_eq!(config.max_message_size, ServerConfig::default().max_message_size);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WestfieldError};

/// Default maximum size of one inbound transport message (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default maximum number of live objects per connection.
pub const DEFAULT_MAX_OBJECTS: usize = 65536;

/// Default capacity of a session's event channel.
pub const DEFAULT_SESSION_CHANNEL_CAPACITY: usize = 1024;

/// Limits applied to every connection of a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest inbound transport message accepted. A message may hold
    /// several frames, so this can exceed the 64 KiB frame limit.
    pub max_message_size: usize,
    /// Most objects one connection may hold at once.
    pub max_objects_per_connection: usize,
    /// Capacity of the event channel created by `Server::open_session`.
    pub session_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_objects_per_connection: DEFAULT_MAX_OBJECTS,
            session_channel_capacity: DEFAULT_SESSION_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits no connection could work under.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("max_message_size", self.max_message_size),
            ("max_objects_per_connection", self.max_objects_per_connection),
            ("session_channel_capacity", self.session_channel_capacity),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((field, _)) => Err(WestfieldError::InvalidConfig(format!(
                "{} must be at least 1",
                field
            ))),
            None => Ok(()),
        }
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_message_size, 1024 * 1024);
        assert_eq!(config.max_objects_per_connection, 65536);
        assert_eq!(config.session_channel_capacity, 1024);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = ServerConfig::from_json(r#"{"max_message_size": 4096}"#).unwrap();
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.max_objects_per_connection, DEFAULT_MAX_OBJECTS);
    }

    #[test]
    fn test_malformed_document() {
        let err = ServerConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, WestfieldError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::from_file("/nonexistent/westfield.json").unwrap_err();
        assert!(matches!(err, WestfieldError::Io(_)));
    }

    #[test]
    fn test_zero_limits_rejected() {
        for field in [
            "max_message_size",
            "max_objects_per_connection",
            "session_channel_capacity",
        ] {
            let json = format!(r#"{{"{}": 0}}"#, field);
            let err = ServerConfig::from_json(&json).unwrap_err();
            assert!(
                matches!(&err, WestfieldError::InvalidConfig(msg) if msg.contains(field)),
                "{}: {}",
                field,
                err
            );
        }
    }
}
