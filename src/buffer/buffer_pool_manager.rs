//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between the backing store and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and flush
//! - LRU-K victim selection
//! - Page id allocation

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use crate::buffer::replacer::LruKReplacer;
use crate::buffer::{BasicPageGuard, BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::{DiskRequest, DiskScheduler, PageStore};

/// State protected by the pool latch.
struct PoolState {
    /// Maps resident page IDs to frame IDs.
    page_table: HashMap<PageId, FrameId>,

    /// Frames holding no page, handed out oldest first.
    free_list: VecDeque<FrameId>,

    /// Next page id to hand out. Never decremented.
    next_page_id: u32,
}

/// Manages a pool of buffer frames for caching pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────┐  ┌──────────────────────────────┐ │
/// │  │ state: Mutex         │  │     frames: Vec<Frame>       │ │
/// │  │  page_table PageId→F │─▶│ [Frame0] [Frame1] [Frame2].. │ │
/// │  │  free_list           │  └──────────────────────────────┘ │
/// │  │  next_page_id        │  ┌──────────────┐ ┌─────────────┐ │
/// │  └──────────────────────┘  │ LruKReplacer │ │DiskScheduler│ │
/// │                            └──────────────┘ └─────────────┘ │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one `Mutex` held for the whole of every operation that reads
///   or changes residency, pins or the replacer, including the wait for any
///   page fault or eviction write-back it issues
/// - `replacer`: internally latched; only called with `state` held
/// - `frames`: no lock, fixed size; each frame latches its own page
/// - `stats`: no lock, all atomic counters
///
/// Lock order is `state` then `replacer`. Page latches are never taken while
/// `state` is held, except on unpinned frames, which nobody else can latch.
///
/// # Usage
/// ```
/// use stratadb::buffer::BufferPoolManager;
/// use stratadb::storage::MemoryStore;
///
/// let bpm = BufferPoolManager::new(10, 2, MemoryStore::new());
///
/// let page_id = {
///     let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
///     guard.as_mut_slice()[0] = 0xAB;
///     guard.page_id()
/// };
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    /// Eviction policy for selecting victim frames.
    replacer: LruKReplacer,

    /// Serializes all I/O against the backing store.
    scheduler: DiskScheduler,

    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Arguments
    /// * `pool_size` - Number of frames in the pool
    /// * `replacer_k` - History depth of the LRU-K replacer
    /// * `store` - Backing store, moved onto the disk scheduler's worker
    ///
    /// Page ids continue after the highest page already in `store`.
    ///
    /// # Panics
    /// Panics if `pool_size` or `replacer_k` is 0.
    pub fn new<S: PageStore + 'static>(pool_size: usize, replacer_k: usize, store: S) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let next_page_id = store.page_count();
        let frames = (0..pool_size).map(|i| Frame::new(FrameId::new(i))).collect();
        let free_list = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                next_page_id,
            }),
            replacer: LruKReplacer::new(pool_size, replacer_k),
            scheduler: DiskScheduler::new(Box::new(store)),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: raw pin/unpin interface
    // ========================================================================

    /// Allocate a fresh page id and pin a zeroed frame for it.
    ///
    /// The caller owns one pin and must release it with
    /// [`unpin_page`](Self::unpin_page).
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from writing back an evicted dirty page
    pub fn new_page(&self) -> Result<(PageId, &Frame)> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.0];
        frame.set_page_id(Some(page_id));
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;

        trace!("allocated {} in {}", page_id, frame_id);
        Ok((page_id, frame))
    }

    /// Pin a page, loading it from the backing store if it is not resident.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` if this pool never allocated `page_id`
    /// - `Error::NoFreeFrames` if the page is not resident and all frames are pinned
    /// - I/O errors from the read, or from writing back an evicted dirty page
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        let mut state = self.state.lock();
        if !page_id.is_valid() || page_id.0 >= state.next_page_id {
            return Err(Error::InvalidPageId(page_id));
        }

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            self.pin_resident(frame)?;
            self.replacer.record_access(frame_id)?;
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!("cache hit for {} in {}", page_id, frame_id);
            return Ok(frame);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        if let Err(e) = self.read_into(frame, page_id) {
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(Some(page_id));
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;

        trace!("cache miss for {}, loaded into {}", page_id, frame_id);
        Ok(frame)
    }

    /// Release one pin on a page, merging in `is_dirty`.
    ///
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            warn!("unpin of non-resident {}", page_id);
            return false;
        };

        let frame = &self.frames[frame_id.0];
        let Some(remaining) = frame.unpin() else {
            warn!("unpin of {} with pin count 0", page_id);
            return false;
        };

        if is_dirty {
            frame.mark_dirty();
        }
        if remaining == 0 {
            let result = self.replacer.set_evictable(frame_id, true);
            if let Err(e) = &result {
                error!("replacer rejected unpin of {}: {}", page_id, e);
            }
            debug_assert!(result.is_ok(), "replacer out of sync with pin counts");
        }
        true
    }

    // ========================================================================
    // Public API: guarded interface
    // ========================================================================

    /// [`fetch_page`](Self::fetch_page) wrapped in a guard that unpins on drop.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(BasicPageGuard::new(self, frame, page_id))
    }

    /// Fetch a page and take its shared latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetch a page and take its exclusive latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// [`new_page`](Self::new_page) wrapped in a guard that unpins on drop.
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard<'_>> {
        let (page_id, frame) = self.new_page()?;
        Ok(BasicPageGuard::new(self, frame, page_id))
    }

    // ========================================================================
    // Public API: flush and delete
    // ========================================================================

    /// Write a resident page to the backing store, dirty or not, and clear
    /// its dirty flag.
    ///
    /// The page is pinned for the duration of the write and the pool latch is
    /// released before the page latch is taken. A flush is not an access and
    /// leaves the page's LRU-K history alone.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - I/O errors from the write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame = {
            let state = self.state.lock();
            let &frame_id = state
                .page_table
                .get(&page_id)
                .ok_or(Error::PageNotResident(page_id))?;
            let frame = &self.frames[frame_id.0];
            self.pin_resident(frame)?;
            frame
        };

        let result = self.write_back(frame, page_id);
        self.unpin_page(page_id, false);
        result
    }

    /// Flush every resident page.
    ///
    /// Pages evicted while the flush runs were already written back and are
    /// skipped.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();

        for page_id in resident {
            match self.flush_page(page_id) {
                Ok(()) | Err(Error::PageNotResident(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Drop a page from the pool and logically deallocate its id.
    ///
    /// Returns true if the page is gone afterwards (including when it was
    /// never resident), false if it is pinned. Ids are not reused.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            if frame.is_pinned() {
                return false;
            }
            let result = self.replacer.remove(frame_id);
            if let Err(e) = &result {
                error!("replacer rejected delete of {}: {}", page_id, e);
            }
            debug_assert!(result.is_ok(), "replacer out of sync with pin counts");
            if result.is_err() {
                return false;
            }

            state.page_table.remove(&page_id);
            frame.reset();
            state.free_list.push_back(frame_id);
        }

        BufferPoolStats::bump(&self.stats.pages_deleted);
        debug!("deallocated {}", page_id);
        true
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of frames the replacer may currently evict.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Pin count of a resident page, `None` if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Dirty flag of a resident page, `None` if not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.0].is_dirty())
    }

    // ========================================================================
    // Internal: pinning and frame allocation (pool latch held)
    // ========================================================================

    /// Add a pin to a resident frame, withdrawing it from eviction on the
    /// first pin. Callers that count this as an access record it themselves.
    fn pin_resident(&self, frame: &Frame) -> Result<()> {
        if frame.pin() == 1 {
            if let Err(e) = self.replacer.set_evictable(frame.frame_id(), false) {
                frame.unpin();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Take a frame from the free list, or evict a victim.
    ///
    /// The returned frame is empty, zeroed and unpinned.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        // The victim is only claimed once its write-back succeeded, so a
        // failed write leaves its history and evictability as they were.
        let frame_id = self.replacer.victim().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                self.write_back(frame, old_page_id)?;
            }
            state.page_table.remove(&old_page_id);
            trace!("evicted {} from {}", old_page_id, frame_id);
        }
        self.replacer.remove(frame_id)?;

        frame.reset();
        BufferPoolStats::bump(&self.stats.evictions);
        Ok(frame_id)
    }

    // ========================================================================
    // Internal: I/O through the scheduler
    // ========================================================================

    /// Copy a frame's page under its read latch and write the copy.
    ///
    /// The dirty flag is cleared with the copy taken, and set again if the
    /// write fails.
    fn write_back(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let mut staging = Page::new();
        {
            let page = frame.page();
            staging.copy_from(&page);
            frame.clear_dirty();
        }

        let result = self.submit(true, page_id, staging).map(|_| ());
        match &result {
            Ok(()) => BufferPoolStats::bump(&self.stats.pages_written),
            Err(_) => frame.mark_dirty(),
        }
        result
    }

    /// Read `page_id` into a frame nobody else can see yet.
    fn read_into(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let staging = self.submit(false, page_id, Page::new())?;
        frame.page_mut().copy_from(&staging.lock());
        BufferPoolStats::bump(&self.stats.pages_read);
        Ok(())
    }

    /// Schedule one request and block until it completes.
    fn submit(&self, is_write: bool, page_id: PageId, page: Page) -> Result<Arc<Mutex<Page>>> {
        let data = Arc::new(Mutex::new(page));
        let (callback, future) = DiskScheduler::create_promise();
        self.scheduler.schedule(DiskRequest {
            is_write,
            data: Arc::clone(&data),
            page_id,
            callback,
        })?;
        future.wait()?;
        Ok(data)
    }
}
