//! Server-side protocol objects.
//!
//! A [`Resource`] is one live object on one connection: an id, the version
//! the client bound, the request table of its interface, and the user
//! implementation requests are delegated to. Handles are cheap to clone;
//! all clones refer to the same object.
//!
//! # Example
//!
//! ```ignore
//! let requests = RequestTable::new().request("destroy", |resource, _args| {
//!     resource.destroy();
//!     Ok(())
//! });
//!
//! let surface = Resource::builder(&connection, id, version)
//!     .interface("example_surface")
//!     .implementation(Surface::default())
//!     .requests(requests)
//!     .register()?;
//!
//! surface.send(1, vec![Arg::Uint(42)])?;
//! ```

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;

use crate::codec::{Arg, ArgsReader, Message, ObjectLookup};
use crate::connection::{Connection, ConnectionInner};
use crate::error::{Result, WestfieldError};
use crate::handler::RequestTable;
use crate::lock;
use crate::protocol::ObjectId;

type DestroyListener = Box<dyn FnOnce(&Resource) + Send + 'static>;

/// Token returned by [`Resource::add_destroy_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestroyListenerId(u64);

struct ResourceInner {
    id: ObjectId,
    version: u32,
    interface: String,
    connection: Weak<ConnectionInner>,
    implementation: Arc<dyn Any + Send + Sync>,
    requests: RequestTable,
    destroyed: AtomicBool,
    destroy_listeners: Mutex<Vec<(DestroyListenerId, DestroyListener)>>,
    last_listener_id: AtomicU64,
}

/// Handle to a live protocol object.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Resource {
    /// Start building a resource for `id` on `connection`.
    pub fn builder(connection: &Connection, id: ObjectId, version: u32) -> ResourceBuilder<'_> {
        ResourceBuilder {
            connection,
            id,
            version,
            interface: String::new(),
            implementation: Arc::new(()),
            requests: RequestTable::new(),
        }
    }

    /// Object id on the owning connection.
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Version the client bound this object at.
    #[inline]
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Interface name, used in logs.
    #[inline]
    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    /// Owning connection, if it is still alive.
    pub fn connection(&self) -> Option<Connection> {
        self.inner.connection.upgrade().map(Connection::from_inner)
    }

    /// The user implementation, downcast to `T`.
    pub fn implementation<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner.implementation).downcast::<T>().ok()
    }

    /// Request table of this object's interface.
    #[inline]
    pub fn requests(&self) -> &RequestTable {
        &self.inner.requests
    }

    /// Queue an event on this object.
    ///
    /// The event is written to the peer on the next flush of the connection.
    pub fn send(&self, opcode: u16, args: Vec<Arg>) -> Result<()> {
        self.send_message(&Message::with_args(self.id(), opcode, args))
    }

    /// Queue a pre-built message.
    pub fn send_message(&self, message: &Message) -> Result<()> {
        let connection = self.connection().ok_or(WestfieldError::ConnectionClosed)?;
        connection.queue(message)
    }

    /// Report a protocol error concerning this object to the peer.
    ///
    /// Callers are expected to close the connection afterwards.
    pub fn post_error(&self, code: u32, message: &str) -> Result<()> {
        let connection = self.connection().ok_or(WestfieldError::ConnectionClosed)?;
        connection.post_error(self.id(), code, message)
    }

    /// Destroy the object.
    ///
    /// Removes it from the connection's object table and runs the destroy
    /// listeners once. Calling this again is a no-op.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(connection) = self.connection() {
            connection.unregister(self);
        }

        let listeners = std::mem::take(&mut *lock(&self.inner.destroy_listeners));
        for (_, listener) in listeners {
            listener(self);
        }
    }

    /// Run `listener` when the object is destroyed.
    ///
    /// Runs immediately if the object is already destroyed.
    pub fn add_destroy_listener<F>(&self, listener: F) -> DestroyListenerId
    where
        F: FnOnce(&Resource) + Send + 'static,
    {
        let id = self.inner.last_listener_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = DestroyListenerId(id);
        {
            let mut listeners = lock(&self.inner.destroy_listeners);
            if !self.inner.destroyed.load(Ordering::Acquire) {
                listeners.push((id, Box::new(listener)));
                return id;
            }
        }
        listener(self);
        id
    }

    /// Drop a listener before it runs.
    ///
    /// Returns false if it already ran or was removed.
    pub fn remove_destroy_listener(&self, id: DestroyListenerId) -> bool {
        let mut listeners = lock(&self.inner.destroy_listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Whether [`destroy`](Self::destroy) has run.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Decode a request payload and hand it to the request handler.
    ///
    /// Fails if the handler leaves arguments unconsumed.
    pub(crate) fn dispatch(
        &self,
        opcode: u16,
        payload: Bytes,
        objects: &dyn ObjectLookup,
    ) -> Result<()> {
        if self.is_destroyed() {
            return Err(WestfieldError::UnknownObject(self.id()));
        }

        tracing::debug!(
            "Dispatching {}@{}.{}",
            self.interface(),
            self.id(),
            self.requests().name(opcode).unwrap_or("?")
        );

        let mut args = ArgsReader::new(payload, objects);
        self.inner.requests.dispatch(self, opcode, &mut args)?;
        args.finish()
    }

    pub(crate) fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && Weak::ptr_eq(&self.inner.connection, &other.inner.connection)
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.inner.connection.as_ptr() as usize).hash(state);
        self.id().hash(state);
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id())
            .field("interface", &self.interface())
            .field("version", &self.version())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Builder returned by [`Resource::builder`].
pub struct ResourceBuilder<'c> {
    connection: &'c Connection,
    id: ObjectId,
    version: u32,
    interface: String,
    implementation: Arc<dyn Any + Send + Sync>,
    requests: RequestTable,
}

impl ResourceBuilder<'_> {
    /// Set the interface name.
    pub fn interface(mut self, interface: &str) -> Self {
        self.interface = interface.to_string();
        self
    }

    /// Set the implementation requests are delegated to.
    pub fn implementation<T: Any + Send + Sync>(mut self, implementation: T) -> Self {
        self.implementation = Arc::new(implementation);
        self
    }

    /// Set an implementation that is shared with other owners.
    pub fn shared_implementation<T: Any + Send + Sync>(mut self, implementation: Arc<T>) -> Self {
        self.implementation = implementation;
        self
    }

    /// Set the request table.
    pub fn requests(mut self, requests: RequestTable) -> Self {
        self.requests = requests;
        self
    }

    /// Insert the resource into the connection's object table.
    ///
    /// Fails with [`WestfieldError::IdCollision`] if the id is null or taken,
    /// and with [`WestfieldError::ConnectionClosed`] if the connection is no
    /// longer open.
    pub fn register(self) -> Result<Resource> {
        let resource = Resource {
            inner: Arc::new(ResourceInner {
                id: self.id,
                version: self.version,
                interface: self.interface,
                connection: self.connection.downgrade(),
                implementation: self.implementation,
                requests: self.requests,
                destroyed: AtomicBool::new(false),
                destroy_listeners: Mutex::new(Vec::new()),
                last_listener_id: AtomicU64::new(0),
            }),
        };

        self.connection.register(&resource)?;
        Ok(resource)
    }
}
