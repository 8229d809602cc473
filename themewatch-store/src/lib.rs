//! # themewatch-store
//!
//! Append-only SQLite log of observed theme changes.
//!
//! [`EventStore::append`] is the only write path besides the bulk
//! [`EventStore::clear`]; [`EventStore::query`] and [`EventStore::export_csv`]
//! serve the UI collaborator. [`export::read_csv`] parses an export back.

pub mod error;
pub mod export;
pub mod query;
pub mod store;

pub use error::StorageError;
pub use query::{EventFilter, EventQuery, SortKey, SortOrder};
pub use store::EventStore;
