//! StrataDB - a buffer-pool-managed storage core with a disk-backed
//! extendible hash index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           StrataDB                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   DiskExtendibleHashTable: header → directory → bucket   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ page guards                      │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + LRU-K replacer + stats     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ DiskScheduler                    │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   PageStore: DiskManager | MemoryStore, page formats     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and LRU-K eviction
//! - [`storage`] - Backing stores, the disk scheduler and page formats
//! - [`index`] - Extendible hash index
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use stratadb::buffer::BufferPoolManager;
//! use stratadb::index::hash::{Crc32Hasher, HashTableOptions, IntComparator, IntHashTable};
//! use stratadb::storage::DiskManager;
//!
//! let dm = DiskManager::open_or_create("my_database.db").unwrap();
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));
//!
//! let table = IntHashTable::new("pk", bpm, IntComparator, Crc32Hasher, HashTableOptions::default())
//!     .unwrap();
//! table.insert(&42, &7).unwrap();
//! assert_eq!(table.get_value(&42).unwrap(), vec![7]);
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::hash::DiskExtendibleHashTable;
pub use storage::page::{Page, PageType};
pub use storage::{DiskManager, MemoryStore};
