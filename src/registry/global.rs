//! Advertised globals.

use std::fmt;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::ObjectId;
use crate::resource::Resource;

/// Creates the per-client resource when a client binds a global.
pub trait Bind: Send + Sync {
    /// Construct and register a resource at `id` on `connection`.
    fn bind_client(&self, connection: &Connection, id: ObjectId, version: u32) -> Result<Resource>;
}

impl<F> Bind for F
where
    F: Fn(&Connection, ObjectId, u32) -> Result<Resource> + Send + Sync,
{
    fn bind_client(&self, connection: &Connection, id: ObjectId, version: u32) -> Result<Resource> {
        self(connection, id, version)
    }
}

struct GlobalInner {
    interface: String,
    version: u32,
    binder: Box<dyn Bind>,
}

/// A server-wide singleton object that clients discover and bind.
///
/// Cloning yields another handle to the same global. The name clients see
/// is assigned by each [`Registry`](super::Registry) it is registered with.
#[derive(Clone)]
pub struct Global {
    inner: Arc<GlobalInner>,
}

impl Global {
    /// Create a global advertising `interface` up to `version`.
    ///
    /// `version` must be at least 1.
    pub fn new(interface: &str, version: u32, binder: impl Bind + 'static) -> Self {
        debug_assert!(version >= 1, "global versions start at 1");
        Self {
            inner: Arc::new(GlobalInner {
                interface: interface.to_string(),
                version,
                binder: Box::new(binder),
            }),
        }
    }

    #[inline]
    pub fn interface(&self) -> &str {
        &self.inner.interface
    }

    /// Highest version offered.
    #[inline]
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Run the bind hook for one client.
    pub fn bind_client(&self, connection: &Connection, id: ObjectId, version: u32) -> Result<Resource> {
        self.inner.binder.bind_client(connection, id, version)
    }
}

impl PartialEq for Global {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Global {}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("interface", &self.interface())
            .field("version", &self.version())
            .finish()
    }
}
