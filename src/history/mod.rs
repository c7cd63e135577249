//! Durable scan history.
//!
//! - [`entry`]: `HistoryEntry` and its `EntryId`
//! - [`storage`]: the `KeyValueStore` seam with memory and file backends
//! - [`store`]: `HistoryStore`, the newest-first collection

pub mod entry;
pub mod storage;
pub mod store;

pub use entry::{EntryId, HistoryEntry};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::HistoryStore;
