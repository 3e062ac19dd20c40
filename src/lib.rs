//! # westfield-server
//!
//! Server-side runtime for the westfield object protocol: Wayland-style
//! RPC between a server and browser clients, carried over WebSocket
//! binary messages.
//!
//! ## Architecture
//!
//! - **Wire** ([`protocol`], [`codec`]): 8-byte frame headers and
//!   word-aligned arguments
//! - **Objects** ([`Resource`], [`handler`]): per-connection object tables
//!   with opcode-indexed request dispatch
//! - **Discovery** ([`registry`]): globals advertised to every connection
//!   and bound by clients through the registry object (id 1)
//! - **Sessions** ([`Server`], [`session`]): connection bookkeeping and a
//!   driver loop fed by any transport
//!
//! ## Example
//!
//! ```ignore
//! use westfield_server::{Global, Resource, Server};
//!
//! #[tokio::main]
//! async fn main() -> westfield_server::Result<()> {
//!     let server = Server::builder()
//!         .global(Global::new("example_clock", 1, |connection: &Connection, id, version| {
//!             Resource::builder(connection, id, version)
//!                 .interface("example_clock")
//!                 .register()
//!         }))
//!         .build();
//!
//!     let (session, mut outbound) = server.open_session()?;
//!     // Hand `outbound` to the socket writer and feed inbound
//!     // messages to `session.binary(..)`.
//!     session.join().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

mod connection;
mod resource;
mod server;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use codec::{Arg, ArgsReader, Fixed, Message};
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{Result, WestfieldError};
pub use handler::RequestTable;
pub use registry::{Bind, Global, Registry, RegistryRequests, RegistryResource};
pub use resource::{DestroyListenerId, Resource, ResourceBuilder};
pub use server::{Server, ServerBuilder, SUBPROTOCOL};
pub use session::SessionHandle;
pub use transport::{Sender, TransportEvent};

/// Lock a mutex, ignoring poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
