//! Server builder and connection bookkeeping.
//!
//! The [`Server`] owns the [`Registry`] and the set of open connections.
//! Transport adapters call [`Server::create`] for every accepted peer and
//! feed inbound messages to the returned [`Connection`].
//!
//! # Example
//!
//! ```ignore
//! use westfield_server::{Global, Server};
//!
//! let server = Server::builder()
//!     .max_objects_per_connection(4096)
//!     .global(Global::new("example_compositor", 4, bind_compositor))
//!     .build();
//!
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let connection = server.create(tx)?;
//! connection.on_message(frame_bytes)?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::lock;
use crate::registry::{Global, Registry};
use crate::transport::Sender;

/// WebSocket subprotocol the runtime speaks.
pub const SUBPROTOCOL: &str = "westfield";

pub(crate) struct ServerInner {
    registry: Registry,
    connections: Mutex<HashMap<u64, Connection>>,
    last_connection_id: AtomicU64,
    config: ServerConfig,
}

impl ServerInner {
    /// Forget a connection that started closing.
    pub(crate) fn connection_closed(&self, connection_id: u64) {
        self.registry.detach(connection_id);
        lock(&self.connections).remove(&connection_id);
    }
}

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    globals: Vec<Global>,
}

impl ServerBuilder {
    /// Create a builder with default limits.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            globals: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the largest inbound transport message accepted.
    ///
    /// Default: 1 MiB
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the most objects one connection may hold.
    ///
    /// Default: 65536
    pub fn max_objects_per_connection(mut self, limit: usize) -> Self {
        self.config.max_objects_per_connection = limit;
        self
    }

    /// Set the capacity of session event channels.
    ///
    /// Default: 1024
    pub fn session_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.session_channel_capacity = capacity;
        self
    }

    /// Register a global when the server is built.
    pub fn global(mut self, global: Global) -> Self {
        self.globals.push(global);
        self
    }

    /// Build the server and register the collected globals in order.
    pub fn build(self) -> Server {
        let server = Server::with_config(self.config);
        for global in &self.globals {
            server.registry().register(global);
        }
        server
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running server. Cloning yields another handle.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Create a server with default limits and no globals.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                registry: Registry::new(),
                connections: Mutex::new(HashMap::new()),
                last_connection_id: AtomicU64::new(0),
                config,
            }),
        }
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Whether a client offering `protocol` should be accepted.
    pub fn accepts_subprotocol(&self, protocol: &str) -> bool {
        protocol == SUBPROTOCOL
    }

    /// Set up a connection for a newly accepted peer.
    ///
    /// The connection gets its registry object at id 1, and the current
    /// globals are sent through `sender` before this returns.
    pub fn create(&self, sender: impl Sender + 'static) -> Result<Connection> {
        let id = self.inner.last_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
        let connection = Connection::new(
            id,
            Box::new(sender),
            &self.inner.config,
            Arc::downgrade(&self.inner),
        );

        lock(&self.inner.connections).insert(id, connection.clone());

        if let Err(e) = self.inner.registry.attach(&connection) {
            tracing::error!("Failed to attach registry to connection {}: {}", id, e);
            connection.close();
            return Err(e);
        }

        tracing::info!("Connection {} opened", id);
        Ok(connection)
    }

    /// Open connection by id.
    pub fn connection(&self, id: u64) -> Option<Connection> {
        lock(&self.inner.connections).get(&id).cloned()
    }

    /// Snapshot of the open connections.
    pub fn connections(&self) -> Vec<Connection> {
        lock(&self.inner.connections).values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.inner.connections).len()
    }

    /// Close every open connection.
    pub fn close_all(&self) {
        for connection in self.connections() {
            connection.close();
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
