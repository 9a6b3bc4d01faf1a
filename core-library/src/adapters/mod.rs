//! Database adapter implementations
//!
//! Concrete [`DatabaseAdapter`](bridge_traits::database::DatabaseAdapter)
//! implementations shipped with the core.

pub mod sqlite_native;

pub use sqlite_native::SqliteAdapter;
