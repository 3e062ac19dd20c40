//! Request table mapping opcodes to decode-and-delegate handlers.
//!
//! Each handler pulls its arguments from an [`ArgsReader`] and forwards them
//! to the resource's implementation. The table is 1-indexed and contiguous:
//! the n-th registered request answers opcode n.

use std::sync::Arc;

use crate::codec::ArgsReader;
use crate::error::{Result, WestfieldError};
use crate::resource::Resource;

/// Handler invoked for one request opcode.
pub type RequestHandler =
    Arc<dyn Fn(&Resource, &mut ArgsReader<'_>) -> Result<()> + Send + Sync + 'static>;

/// Entry for a registered request.
#[derive(Clone)]
struct RequestEntry {
    /// Request name, used in logs.
    name: String,
    /// The handler function.
    handler: RequestHandler,
}

/// Opcode-indexed request handlers of one interface.
#[derive(Clone, Default)]
pub struct RequestTable {
    /// Entry `i` serves opcode `i + 1`.
    entries: Vec<RequestEntry>,
}

impl RequestTable {
    /// Create an empty table (an object without requests).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next request and return its opcode.
    pub fn register<F>(&mut self, name: &str, handler: F) -> u16
    where
        F: Fn(&Resource, &mut ArgsReader<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.entries.push(RequestEntry {
            name: name.to_string(),
            handler: Arc::new(handler),
        });
        self.entries.len() as u16
    }

    /// Builder form of [`register`](Self::register).
    pub fn request<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Resource, &mut ArgsReader<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    fn entry(&self, opcode: u16) -> Option<&RequestEntry> {
        (opcode as usize)
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    /// Get a handler by opcode.
    pub fn get(&self, opcode: u16) -> Option<&RequestHandler> {
        self.entry(opcode).map(|e| &e.handler)
    }

    /// Get request name by opcode.
    pub fn name(&self, opcode: u16) -> Option<&str> {
        self.entry(opcode).map(|e| e.name.as_str())
    }

    /// Get opcode by request name.
    pub fn opcode(&self, name: &str) -> Option<u16> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|index| index as u16 + 1)
    }

    /// Number of requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispatch a request to the handler for `opcode`.
    pub fn dispatch(
        &self,
        resource: &Resource,
        opcode: u16,
        args: &mut ArgsReader<'_>,
    ) -> Result<()> {
        let handler = self.get(opcode).ok_or(WestfieldError::UnknownOpcode {
            object_id: resource.id(),
            opcode,
        })?;

        handler(resource, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Resource, _: &mut ArgsReader<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_opcode_assignment_sequential() {
        let mut table = RequestTable::new();

        assert_eq!(table.register("first", noop), 1);
        assert_eq!(table.register("second", noop), 2);
        assert_eq!(table.register("third", noop), 3);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_opcode_zero_is_reserved() {
        let table = RequestTable::new().request("only", noop);

        assert!(table.get(0).is_none());
        assert!(table.name(0).is_none());
        assert!(table.get(1).is_some());
    }

    #[test]
    fn test_out_of_range_opcode() {
        let table = RequestTable::new().request("only", noop);
        assert!(table.get(2).is_none());
        assert!(table.get(u16::MAX).is_none());
    }

    #[test]
    fn test_lookup_by_name() {
        let table = RequestTable::new().request("bind", noop).request("sync", noop);

        assert_eq!(table.opcode("sync"), Some(2));
        assert_eq!(table.name(1), Some("bind"));
        assert_eq!(table.opcode("missing"), None);
    }

    #[test]
    fn test_empty_table() {
        let table = RequestTable::new();
        assert!(table.is_empty());
        assert!(table.get(1).is_none());
    }
}
