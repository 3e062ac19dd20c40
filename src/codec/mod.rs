//! Codec module - argument encoding and decoding.
//!
//! - [`Fixed`] - signed 24.8 fixed-point numbers
//! - [`Arg`] - typed argument values with their wire size
//! - [`Message`] - ordered argument list encoded into a frame
//! - [`ArgsReader`] - decodes a frame payload, resolving object references
//!
//! # Example
//!
//! ```
//! use westfield_server::codec::{Arg, Message};
//!
//! let message = Message::new(1, 2).arg(4u32);
//! assert_eq!(message.args(), &[Arg::Uint(4)]);
//! assert_eq!(message.encoded_size(), 12);
//! ```

mod arg;
mod fixed;
mod message;
mod reader;

pub use arg::Arg;
pub use fixed::Fixed;
pub use message::Message;
pub use reader::{ArgsReader, ObjectLookup};
