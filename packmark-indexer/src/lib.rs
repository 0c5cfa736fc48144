//! Packmark Indexer - local order index for marking-code workflows
//!
//! # Overview
//!
//! Maintains a persistent local index of open sales orders, keyed by
//! their scanned routing code, so that packing stations can resolve a
//! scan instantly even when the upstream order service is slow or
//! rate-limited. The index is populated by a periodic sync pass:
//!
//! - **Explosion** (`explode`): flattens kit positions into atomic unit
//!   lines and computes how many units need a serialized marking code
//! - **Index** (`index`): embedded redb storage, crash-safe
//! - **Sync** (`sync`): bounded pull from upstream with cool-down and
//!   per-candidate error isolation
//!
//! # Module structure
//!
//! ```text
//! packmark-indexer/src/
//! ├── core/          # Configuration
//! ├── explode.rs     # Kit explosion and marking math
//! ├── index/         # redb order index
//! ├── sync.rs        # Sync orchestration
//! └── utils/         # Logger setup
//! ```

pub mod core;
pub mod explode;
pub mod index;
pub mod sync;
pub mod utils;

pub use self::core::Config;
pub use explode::{ExplodeOptions, ExplosionReport, KitSource, explode_positions};
pub use index::{IndexEntry, IndexStats, IndexStorage, StorageError, StorageResult};
pub use sync::{
    SyncError, SyncOptions, SyncOrchestrator, SyncReport, SyncResult, SyncSource, SyncState,
    Trigger,
};

pub use utils::logger::{init_logger, init_logger_with_file};
