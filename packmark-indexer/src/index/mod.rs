//! Local persistent order index

mod storage;

pub use storage::{IndexEntry, IndexStats, IndexStorage, StorageError, StorageResult};
