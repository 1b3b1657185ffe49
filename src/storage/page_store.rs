//! Backing-store abstraction.
//!
//! ```text
//! +---------------+
//! | DiskScheduler |  <- owns the store on its worker thread
//! +---------------+
//!         |
//!         v
//! +-----------------+
//! | PageStore trait |
//! +-----------------+
//!      /       \
//!     v         v
//! +-------------+ +-------------+
//! | DiskManager | | MemoryStore |
//! +-------------+ +-------------+
//! ```

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Synchronous fixed-size page I/O keyed by page id.
///
/// Page ids are allocated by the buffer pool, not by the store. A store must
/// accept a write to any id and return a zeroed page for an id that was never
/// written.
pub trait PageStore: Send {
    /// Fill `page` with the stored contents of `page_id`.
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Persist `page` as the contents of `page_id`.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// One past the highest page id the store holds.
    fn page_count(&self) -> u32;
}
