//! The registry interface: object 1 on every connection.
//!
//! Requests:
//! - `bind(id: new_id, name: uint, version: uint)` (opcode 1)
//!
//! Events:
//! - `global(name: uint, interface: string, version: uint)` (opcode 1)
//! - `global_remove(name: uint)` (opcode 2)

use std::sync::Arc;

use crate::codec::Arg;
use crate::connection::Connection;
use crate::error::Result;
use crate::handler::RequestTable;
use crate::protocol::ObjectId;
use crate::resource::Resource;

/// Requests a registry implementation must handle.
pub trait RegistryRequests: Send + Sync {
    /// Bind the global `name` at `version` to the new object `id`.
    fn bind(&self, resource: &RegistryResource, id: ObjectId, name: u32, version: u32) -> Result<()>;
}

/// Typed handle over the registry object of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResource(Resource);

impl RegistryResource {
    pub const INTERFACE: &'static str = "wl_registry";
    pub const VERSION: u32 = 1;

    pub const BIND: u16 = 1;
    pub const GLOBAL: u16 = 1;
    pub const GLOBAL_REMOVE: u16 = 2;

    /// Register a registry object at `id` on `connection`.
    pub fn create(
        connection: &Connection,
        id: ObjectId,
        implementation: Arc<dyn RegistryRequests>,
    ) -> Result<Self> {
        let requests = RequestTable::new().request("bind", move |resource, args| {
            let id = args.read_new_id()?;
            let name = args.read_uint()?;
            let version = args.read_uint()?;
            implementation.bind(&RegistryResource(resource.clone()), id, name, version)
        });

        let resource = Resource::builder(connection, id, Self::VERSION)
            .interface(Self::INTERFACE)
            .requests(requests)
            .register()?;

        Ok(Self(resource))
    }

    #[inline]
    pub fn resource(&self) -> &Resource {
        &self.0
    }

    /// Announce a global.
    pub fn global(&self, name: u32, interface: &str, version: u32) -> Result<()> {
        self.0.send(
            Self::GLOBAL,
            vec![Arg::Uint(name), Arg::from(interface), Arg::Uint(version)],
        )
    }

    /// Announce that a global is gone.
    pub fn global_remove(&self, name: u32) -> Result<()> {
        self.0.send(Self::GLOBAL_REMOVE, vec![Arg::Uint(name)])
    }
}
