//! Warehouse adapter protocol for SQLMason.
//!
//! The registry owns all named connections and drives the transaction state
//! machine; adapters supply the dialect-specific pieces; compiled SQL runs
//! through the operation-marker interpreter segment by segment.

pub mod adapter;
pub mod connection;
pub mod error;
pub mod execute;
pub mod operation;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Adapter, AnsiAdapter, Credentials, Cursor, DriverHandle};
pub use connection::{Connection, ConnectionRegistry, ConnectionState, MASTER_CONNECTION};
pub use error::{AdapterError, AdapterResult};
pub use execute::RelationKind;
pub use operation::{split_wrapped_sql, Operation, Segment};
