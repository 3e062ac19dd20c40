//! Registry module - global discovery and binding.
//!
//! The [`Registry`] holds every advertised [`Global`] and the registry
//! object of every open connection. Registering or unregistering a global
//! broadcasts the change to all connections; a new connection receives the
//! current set when it is attached.
//!
//! Each registry numbers its globals from its own counter, starting at 1.
//! A name is never reused, so a global registered again after removal is
//! announced under a new name.
//!
//! # Example
//!
//! ```ignore
//! let seat = Global::new("example_seat", 2, |connection: &Connection, id, version| {
//!     Resource::builder(connection, id, version)
//!         .interface("example_seat")
//!         .implementation(Seat::default())
//!         .requests(seat_requests())
//!         .register()
//! });
//!
//! let name = server.registry().register(&seat);
//! ```

mod global;
mod resource;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};

use crate::connection::Connection;
use crate::error::{Result, WestfieldError};
use crate::lock;
use crate::protocol::{is_client_id, ObjectId, REGISTRY_ID};

pub use global::{Bind, Global};
pub use resource::{RegistryRequests, RegistryResource};

#[derive(Default)]
struct RegistryState {
    globals: BTreeMap<u32, Global>,
    /// Registry object per connection id.
    resources: HashMap<u64, RegistryResource>,
    last_name: u32,
}

impl RegistryState {
    fn name_of(&self, global: &Global) -> Option<u32> {
        self.globals
            .iter()
            .find(|(_, registered)| *registered == global)
            .map(|(name, _)| *name)
    }
}

struct RegistryInner {
    state: Mutex<RegistryState>,
}

/// Server-wide set of globals.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Advertise `global` to every connection and return its name.
    ///
    /// Names come from this registry's own counter. Registering a global
    /// that is already advertised here returns its current name; one that
    /// was unregistered gets a fresh name.
    pub fn register(&self, global: &Global) -> u32 {
        let (name, targets) = {
            let mut state = lock(&self.inner.state);

            if let Some(name) = state.name_of(global) {
                return name;
            }

            state.last_name += 1;
            let name = state.last_name;
            state.globals.insert(name, global.clone());

            tracing::debug!(
                "Registered global {} v{} as {}",
                global.interface(),
                global.version(),
                name
            );

            let targets = broadcast(&state, |registry| {
                registry.global(name, global.interface(), global.version())
            });
            (name, targets)
        };

        flush_all(targets);
        name
    }

    /// Withdraw `global` from every connection.
    ///
    /// Returns false if it was not registered. Existing bound objects stay
    /// alive.
    pub fn unregister(&self, global: &Global) -> bool {
        let targets = {
            let mut state = lock(&self.inner.state);
            let Some(name) = state.name_of(global) else {
                return false;
            };
            state.globals.remove(&name);

            tracing::debug!("Unregistered global {} ({})", global.interface(), name);

            broadcast(&state, |registry| registry.global_remove(name))
        };

        flush_all(targets);
        true
    }

    /// Name `global` is currently advertised under.
    pub fn name_of(&self, global: &Global) -> Option<u32> {
        lock(&self.inner.state).name_of(global)
    }

    /// Global registered under `name`.
    pub fn global(&self, name: u32) -> Option<Global> {
        lock(&self.inner.state).globals.get(&name).cloned()
    }

    /// All registered globals in name order.
    pub fn globals(&self) -> Vec<Global> {
        lock(&self.inner.state).globals.values().cloned().collect()
    }

    /// Number of connections with a registry object.
    pub fn attached_count(&self) -> usize {
        lock(&self.inner.state).resources.len()
    }

    /// Create the registry object for `connection` and announce every
    /// current global on it.
    pub(crate) fn attach(&self, connection: &Connection) -> Result<RegistryResource> {
        let binder: Arc<dyn RegistryRequests> = Arc::new(Binder(Arc::downgrade(&self.inner)));

        let registry = {
            let mut state = lock(&self.inner.state);
            let registry = RegistryResource::create(connection, REGISTRY_ID, binder)?;

            for (name, global) in &state.globals {
                registry.global(*name, global.interface(), global.version())?;
            }
            state.resources.insert(connection.id(), registry.clone());
            registry
        };

        connection.flush()?;
        Ok(registry)
    }

    pub(crate) fn detach(&self, connection_id: u64) {
        lock(&self.inner.state).resources.remove(&connection_id);
    }

    fn bind(&self, registry: &RegistryResource, id: ObjectId, name: u32, version: u32) -> Result<()> {
        let connection = registry
            .resource()
            .connection()
            .ok_or(WestfieldError::ConnectionClosed)?;

        if !is_client_id(id) || connection.get(id).is_some() {
            return Err(WestfieldError::IdCollision(id));
        }

        let global = self.global(name).ok_or(WestfieldError::UnknownGlobal(name))?;

        if version == 0 || version > global.version() {
            return Err(WestfieldError::UnsupportedVersion {
                interface: global.interface().to_string(),
                requested: version,
                supported: global.version(),
            });
        }

        let bound = global.bind_client(&connection, id, version)?;
        if connection.get(id).as_ref() != Some(&bound) {
            tracing::error!(
                "Bind hook for {} did not register object {}",
                global.interface(),
                id
            );
            return Err(WestfieldError::UnknownObject(id));
        }

        tracing::debug!(
            "Connection {} bound {} v{} as {}",
            connection.id(),
            global.interface(),
            version,
            id
        );
        Ok(())
    }
}

/// Bind handler installed on registry objects.
///
/// Holds the registry weakly so registry objects do not keep it alive.
struct Binder(Weak<RegistryInner>);

impl RegistryRequests for Binder {
    fn bind(&self, resource: &RegistryResource, id: ObjectId, name: u32, version: u32) -> Result<()> {
        let inner = self.0.upgrade().ok_or(WestfieldError::UnknownGlobal(name))?;
        Registry { inner }.bind(resource, id, name, version)
    }
}

/// Queue an event on every attached registry object and return the
/// connections that need a flush.
fn broadcast<F>(state: &RegistryState, send: F) -> Vec<Connection>
where
    F: Fn(&RegistryResource) -> Result<()>,
{
    state
        .resources
        .values()
        .filter_map(|registry| match send(registry) {
            Ok(()) => registry.resource().connection(),
            Err(e) => {
                tracing::debug!("Skipping registry {:?}: {}", registry.resource(), e);
                None
            }
        })
        .collect()
}

fn flush_all(connections: Vec<Connection>) {
    for connection in connections {
        if let Err(e) = connection.flush() {
            tracing::warn!("Failed to flush connection {}: {}", connection.id(), e);
        }
    }
}
