//! Transport module - the seam between connections and the byte pipe.
//!
//! The runtime never owns a socket. A transport adapter feeds inbound
//! messages to [`Connection::on_message`](crate::Connection::on_message)
//! and hands outbound batches back through a [`Sender`].
//!
//! Adapters report what happened on the wire as [`TransportEvent`]s; see
//! [`session::run`](crate::session::run) for the loop that consumes them.

mod channel;

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Outbound half of a transport.
pub trait Sender: Send + Sync {
    /// Write one binary message to the peer.
    fn send(&self, message: Bytes) -> Result<()>;
}

impl<S: Sender + ?Sized> Sender for Arc<S> {
    fn send(&self, message: Bytes) -> Result<()> {
        (**self).send(message)
    }
}

/// Something that happened on the inbound side of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A binary message carrying one or more frames.
    Binary(Bytes),
    /// A text message. Not part of the protocol; ignored.
    Text(String),
    /// The transport failed.
    Error(String),
    /// The peer went away.
    Closed,
}
