//! Error types for StrataDB.

use crate::common::{FrameId, PageId};
use crate::storage::page::PageType;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the buffer pool, the disk scheduler and the hash table.
///
/// Capacity exhaustion of a hash directory is *not* an error: `insert`
/// reports it as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the backing store, delivered through the scheduler.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The page id was never allocated by this buffer pool.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// The page is not currently held in any frame.
    #[error("{0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    /// Frame id outside the replacer's range.
    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(FrameId),

    /// The replacer has never seen an access for this frame.
    #[error("{0} has no recorded accesses")]
    UnknownFrame(FrameId),

    /// `set_evictable` was called with the frame's current state.
    #[error("{frame} is already marked evictable={evictable}")]
    EvictableUnchanged { frame: FrameId, evictable: bool },

    /// `remove` was called on a frame that is not evictable.
    #[error("{0} is not evictable")]
    FrameNotEvictable(FrameId),

    /// A page was opened as the wrong hash table page format.
    #[error("expected {expected:?} page, found {found:?}")]
    PageTypeMismatch { expected: PageType, found: PageType },

    /// The disk scheduler's worker is gone.
    #[error("disk scheduler has shut down")]
    SchedulerShutdown,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `verify_integrity` found a broken directory invariant.
    #[error("corrupt hash directory: {0}")]
    CorruptDirectory(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidPageId(PageId::new(42));
        assert_eq!(format!("{}", err), "Invalid page ID: Page(42)");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::EvictableUnchanged {
            frame: FrameId::new(3),
            evictable: true,
        };
        assert_eq!(format!("{}", err), "Frame(3) is already marked evictable=true");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
