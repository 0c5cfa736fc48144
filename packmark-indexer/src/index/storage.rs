//! redb-based order index
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders_index` | `routing_code` | `IndexEntry` | Scan-time order lookup |
//! | `exploded_positions` | `(routing_code, line_no)` | `ExplodedLine` | Flattened bill of materials |
//!
//! # Contracts
//!
//! Blank routing codes make every operation a no-op. `done` moves
//! false→true only and is never reset, not even by a later upsert.
//! Position rows are replaced as a whole set inside one write
//! transaction; readers never observe a partial mix of old and new rows.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use shared::ExplodedLine;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Index entries: key = routing code, value = JSON-serialized IndexEntry
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders_index");

/// Line rows: key = (routing code, line number), value = JSON-serialized ExplodedLine
const POSITIONS_TABLE: TableDefinition<(&str, u32), &[u8]> =
    TableDefinition::new("exploded_positions");

/// One indexed order, keyed by its routing code
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct IndexEntry {
    pub routing_code: String,
    pub order_id: String,
    pub order_name: String,
    pub moment: Option<String>,
    /// Units requiring a serialized marking code, recomputed whole on
    /// every sync
    pub expected_units: f64,
    pub done: bool,
    pub done_at: Option<String>,
    pub updated_at: String,
}

/// Index counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub orders: u64,
    pub position_rows: u64,
    pub open_orders: u64,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order index backed by redb
#[derive(Clone)]
pub struct IndexStorage {
    db: Arc<Database>,
}

impl IndexStorage {
    /// Open or create the index at the given path
    ///
    /// redb commits with `Durability::Immediate` by default; the index
    /// file is always in a consistent state even across power loss.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(POSITIONS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory index (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(POSITIONS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or fully overwrite the mutable fields of an entry
    ///
    /// `done` is merged monotonically: an entry that is already done
    /// stays done whatever the caller passes.
    pub fn upsert_order(
        &self,
        routing_code: &str,
        order_id: &str,
        order_name: &str,
        moment: Option<&str>,
        expected_units: f64,
        done: bool,
    ) -> StorageResult<()> {
        let Some(key) = valid_key(routing_code) else {
            return Ok(());
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;

            // Read and clone first to avoid borrow conflict
            let existing: Option<IndexEntry> = match table.get(key)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            let done = done || existing.as_ref().is_some_and(|e| e.done);
            let done_at = existing
                .as_ref()
                .and_then(|e| e.done_at.clone())
                .or_else(|| done.then(shared::util::now_moment));

            let entry = IndexEntry {
                routing_code: key.to_string(),
                order_id: order_id.to_string(),
                order_name: order_name.to_string(),
                moment: moment.map(str::to_string),
                expected_units,
                done,
                done_at,
                updated_at: shared::util::now_moment(),
            };
            let value = serde_json::to_vec(&entry)?;
            table.insert(key, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Replace all line rows for a routing code with the given set
    ///
    /// Delete-then-insert inside a single write transaction; there are
    /// no partial-merge semantics.
    pub fn replace_positions(
        &self,
        routing_code: &str,
        lines: &[ExplodedLine],
    ) -> StorageResult<()> {
        let Some(key) = valid_key(routing_code) else {
            return Ok(());
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POSITIONS_TABLE)?;

            let range_start = (key, 0u32);
            let range_end = (key, u32::MAX);
            let mut stale: Vec<u32> = Vec::new();
            for result in table.range(range_start..=range_end)? {
                let (row_key, _) = result?;
                stale.push(row_key.value().1);
            }
            for line_no in stale {
                table.remove((key, line_no))?;
            }

            for (i, line) in lines.iter().enumerate() {
                let value = serde_json::to_vec(line)?;
                table.insert((key, (i + 1) as u32), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Mark an entry done; idempotent, never clears
    pub fn mark_done(&self, routing_code: &str) -> StorageResult<()> {
        let Some(key) = valid_key(routing_code) else {
            return Ok(());
        };

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;

            let entry: Option<IndexEntry> = match table.get(key)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match entry {
                Some(mut entry) if !entry.done => {
                    entry.done = true;
                    entry.done_at = Some(shared::util::now_moment());
                    entry.updated_at = shared::util::now_moment();
                    let value = serde_json::to_vec(&entry)?;
                    table.insert(key, value.as_slice())?;
                }
                // Unknown key or already done: nothing to do
                _ => {}
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Point read of an entry by routing code
    pub fn lookup_order(&self, routing_code: &str) -> StorageResult<Option<IndexEntry>> {
        let Some(key) = valid_key(routing_code) else {
            return Ok(None);
        };
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Line rows for a routing code, in line-number order
    pub fn lookup_positions(&self, routing_code: &str) -> StorageResult<Vec<ExplodedLine>> {
        let Some(key) = valid_key(routing_code) else {
            return Ok(Vec::new());
        };
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POSITIONS_TABLE)?;

        let mut lines = Vec::new();
        for result in table.range((key, 0u32)..=(key, u32::MAX))? {
            let (_, value) = result?;
            lines.push(serde_json::from_slice(value.value())?);
        }
        Ok(lines)
    }

    /// Entries not yet done, most recent moment first
    pub fn list_open_orders(&self, limit: usize) -> StorageResult<Vec<IndexEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut entries: Vec<IndexEntry> = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let entry: IndexEntry = serde_json::from_slice(value.value())?;
            if !entry.done {
                entries.push(entry);
            }
        }
        // Moment format sorts lexicographically; entries without a
        // moment go last
        entries.sort_by(|a, b| b.moment.cmp(&a.moment));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Index counters
    pub fn stats(&self) -> StorageResult<IndexStats> {
        let read_txn = self.db.begin_read()?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let positions_table = read_txn.open_table(POSITIONS_TABLE)?;

        let mut open_orders = 0;
        for result in orders_table.iter()? {
            let (_, value) = result?;
            let entry: IndexEntry = serde_json::from_slice(value.value())?;
            if !entry.done {
                open_orders += 1;
            }
        }

        Ok(IndexStats {
            orders: orders_table.len()?,
            position_rows: positions_table.len()?,
            open_orders,
        })
    }
}

/// Trimmed routing code, `None` for blanks
fn valid_key(routing_code: &str) -> Option<&str> {
    let key = routing_code.trim();
    (!key.is_empty()).then_some(key)
}
