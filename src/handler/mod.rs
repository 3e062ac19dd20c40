//! Handler module - opcode-indexed request dispatch.
//!
//! Provides [`RequestTable`], built once when a resource is constructed.
//! Opcodes are assigned sequentially starting from 1 (0 is reserved).
//!
//! # Example
//!
//! ```
//! use westfield_server::handler::RequestTable;
//!
//! let table = RequestTable::new()
//!     .request("destroy", |resource, _args| {
//!         resource.destroy();
//!         Ok(())
//!     })
//!     .request("set_title", |_resource, args| {
//!         let _title = args.read_string()?;
//!         Ok(())
//!     });
//!
//! assert_eq!(table.opcode("set_title"), Some(2));
//! ```

mod table;

pub use table::{RequestHandler, RequestTable};
