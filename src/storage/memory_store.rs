//! In-memory [`PageStore`] used by tests and benchmarks.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageStore;

#[derive(Default)]
struct MemoryInner {
    pages: HashMap<PageId, Box<Page>>,
    reads: u64,
    writes: u64,
    fail_reads: bool,
    fail_writes: bool,
}

/// Page store backed by a hash map.
///
/// Clones share the same pages, so a test can hand one clone to a buffer
/// pool and keep another to inspect what reached the "disk".
///
/// # Example
/// ```
/// use stratadb::common::PageId;
/// use stratadb::storage::page::Page;
/// use stratadb::storage::{MemoryStore, PageStore};
///
/// let store = MemoryStore::new();
/// let mut handle = store.clone();
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 7;
/// handle.write_page(PageId::new(0), &page).unwrap();
///
/// assert_eq!(store.write_count(), 1);
/// assert_eq!(store.page_bytes(PageId::new(0)).unwrap()[0], 7);
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful reads served.
    pub fn read_count(&self) -> u64 {
        self.inner.lock().reads
    }

    /// Number of successful writes accepted.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Copy of the stored bytes for a page, `None` if it was never written.
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .pages
            .get(&page_id)
            .map(|page| page.as_slice().to_vec())
    }

    /// Make every subsequent read fail with an I/O error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }
}

impl PageStore for MemoryStore {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_reads {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure").into());
        }
        match inner.pages.get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        inner.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure").into());
        }
        inner
            .pages
            .entry(page_id)
            .or_insert_with(|| Box::new(Page::new()))
            .copy_from(page);
        inner.writes += 1;
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.inner
            .lock()
            .pages
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0)
    }
}
