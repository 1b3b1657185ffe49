//! RAII guards for page access.
//!
//! These guards provide safe access to pages in the buffer pool:
//! - [`BasicPageGuard`] - Holds a pin only; latches briefly per access
//! - [`PageReadGuard`] - Holds a pin plus the shared page latch
//! - [`PageWriteGuard`] - Holds a pin plus the exclusive page latch
//!
//! Every guard unpins its page exactly once: on drop, or earlier through
//! `drop_guard()`. A released guard is empty and further releases are
//! no-ops. Upgrading a basic guard moves its pin into the latched guard
//! without touching the pin count.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;
use super::frame::Frame;

const RELEASED: &str = "page guard accessed after release";

/// The pin a guard owns.
struct PinnedPage<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a Frame,
    page_id: PageId,
    is_dirty: bool,
}

/// Guard holding a pin on a page, without a latch.
///
/// [`data`](Self::data) and [`data_mut`](Self::data_mut) latch the page for
/// the lifetime of the returned lock guard only.
///
/// # Example
/// ```
/// use stratadb::buffer::BufferPoolManager;
/// use stratadb::storage::MemoryStore;
///
/// let bpm = BufferPoolManager::new(4, 2, MemoryStore::new());
/// let mut guard = bpm.new_page_guarded().unwrap();
/// let page_id = guard.page_id();
/// guard.data_mut().as_mut_slice()[0] = 7;
/// drop(guard);
///
/// assert_eq!(bpm.get_pin_count(page_id), Some(0));
/// ```
pub struct BasicPageGuard<'a> {
    pinned: Option<PinnedPage<'a>>,
}

impl<'a> BasicPageGuard<'a> {
    /// Wrap a page that `fetch_page`/`new_page` already pinned.
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a Frame, page_id: PageId) -> Self {
        Self {
            pinned: Some(PinnedPage {
                bpm,
                frame,
                page_id,
                is_dirty: false,
            }),
        }
    }

    fn pinned(&self) -> &PinnedPage<'a> {
        match &self.pinned {
            Some(pinned) => pinned,
            None => panic!("{}", RELEASED),
        }
    }

    /// # Panics
    /// Panics if the guard was released.
    pub fn page_id(&self) -> PageId {
        self.pinned().page_id
    }

    /// True once the guard has been released or upgraded.
    pub fn is_empty(&self) -> bool {
        self.pinned.is_none()
    }

    /// Latch the page for reading.
    ///
    /// The latch borrows the guard, so it cannot outlive the pin:
    /// ```compile_fail
    /// use stratadb::buffer::BufferPoolManager;
    /// use stratadb::storage::MemoryStore;
    ///
    /// let bpm = BufferPoolManager::new(1, 2, MemoryStore::new());
    /// let guard = bpm.new_page_guarded().unwrap();
    /// let page = guard.data();
    /// drop(guard);
    /// assert_eq!(page.as_slice()[0], 0);
    /// ```
    pub fn data(&self) -> RwLockReadGuard<'_, Page> {
        self.pinned().frame.page()
    }

    /// Latch the page for writing and record the guard as dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Page> {
        self.mark_dirty();
        self.pinned().frame.page_mut()
    }

    /// Report the page dirty when the guard is released.
    pub fn mark_dirty(&mut self) {
        match &mut self.pinned {
            Some(pinned) => pinned.is_dirty = true,
            None => panic!("{}", RELEASED),
        }
    }

    /// Move this guard's pin into a read guard, taking the shared latch.
    pub fn upgrade_read(mut self) -> PageReadGuard<'a> {
        PageReadGuard::latch(Self {
            pinned: self.pinned.take(),
        })
    }

    /// Move this guard's pin into a write guard, taking the exclusive latch.
    pub fn upgrade_write(mut self) -> PageWriteGuard<'a> {
        PageWriteGuard::latch(Self {
            pinned: self.pinned.take(),
        })
    }

    /// Unpin the page now. Later calls, and the eventual drop, do nothing.
    pub fn drop_guard(&mut self) {
        if let Some(pinned) = self.pinned.take() {
            pinned.bpm.unpin_page(pinned.page_id, pinned.is_dirty);
        }
    }
}

impl Drop for BasicPageGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard for shared access to a page.
///
/// Many read guards can latch the same page at once.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let header = HashTableHeaderPage::open(guard.as_slice())?;
/// // guard drops here: latch released, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    latch: Option<RwLockReadGuard<'a, Page>>,
    guard: BasicPageGuard<'a>,
}

impl<'a> PageReadGuard<'a> {
    fn latch(guard: BasicPageGuard<'a>) -> Self {
        let frame: Option<&'a Frame> = guard.pinned.as_ref().map(|pinned| pinned.frame);
        let latch = frame.map(Frame::page);
        Self { latch, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// Release the latch, then unpin. Idempotent.
    pub fn drop_guard(&mut self) {
        self.latch.take();
        self.guard.drop_guard();
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        match &self.latch {
            Some(latch) => &**latch,
            None => panic!("{}", RELEASED),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard for exclusive access to a page.
///
/// Mutable access through `DerefMut` marks the guard dirty, so the page is
/// reported dirty when the guard is released.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;
/// // guard drops here: latch released, page unpinned as dirty
/// ```
pub struct PageWriteGuard<'a> {
    latch: Option<RwLockWriteGuard<'a, Page>>,
    guard: BasicPageGuard<'a>,
}

impl<'a> PageWriteGuard<'a> {
    fn latch(guard: BasicPageGuard<'a>) -> Self {
        let frame: Option<&'a Frame> = guard.pinned.as_ref().map(|pinned| pinned.frame);
        let latch = frame.map(Frame::page_mut);
        Self { latch, guard }
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// Release the latch, then unpin. Idempotent.
    pub fn drop_guard(&mut self) {
        self.latch.take();
        self.guard.drop_guard();
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        match &self.latch {
            Some(latch) => &**latch,
            None => panic!("{}", RELEASED),
        }
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.guard.mark_dirty();
        match &mut self.latch {
            Some(latch) => &mut **latch,
            None => panic!("{}", RELEASED),
        }
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
