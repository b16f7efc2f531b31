//! Persistence layer: WAL, snapshots, and the on-disk collection.

pub mod collection;
pub mod serialization;
pub mod snapshot;
pub mod wal;

pub use collection::{PersistentCollection, PersistentCollectionConfig};
