//! Disk Manager - file-backed [`PageStore`].
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Growing the database file as new page ids are written

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageStore;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. A page id handed out by
/// the buffer pool but never flushed lies past the end of the file and reads
/// back as zeroes. Writing it extends the file; any gap reads as zeroes too.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. It is owned by the disk scheduler's
/// worker, which serializes every request.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of pages the file currently spans.
    page_count: u32,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = file_size.div_ceil(PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    #[inline]
    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }
}

impl PageStore for DiskManager {
    fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            trace!("{} past end of file, returning zeroed page", page_id);
            page.reset();
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        self.page_count = self.page_count.max(page_id.0 + 1);
        Ok(())
    }

    #[inline]
    fn page_count(&self) -> u32 {
        self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskManager::open(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_read_past_end_is_zeroed() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAA;
        dm.read_page(PageId::new(5), &mut page).unwrap();
        assert_eq!(page.as_slice()[0], 0);
        assert_eq!(dm.page_count(), 0);
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[100] = 0xCD;
        page.as_mut_slice()[4095] = 0xEF;
        dm.write_page(PageId::new(0), &page).unwrap();

        let mut read_back = Page::new();
        dm.read_page(PageId::new(0), &mut read_back).unwrap();
        assert_eq!(read_back.as_slice()[0], 0xAB);
        assert_eq!(read_back.as_slice()[100], 0xCD);
        assert_eq!(read_back.as_slice()[4095], 0xEF);
    }

    #[test]
    fn test_write_extends_file_with_gap() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 3;
        dm.write_page(PageId::new(3), &page).unwrap();
        assert_eq!(dm.page_count(), 4);
        assert_eq!(dm.file_size(), 4 * PAGE_SIZE as u64);

        // Pages 0..3 were never written and read back as zeroes.
        let mut gap = Page::new();
        dm.read_page(PageId::new(1), &mut gap).unwrap();
        assert!(gap.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            let mut page = Page::new();
            page.as_mut_slice()[0] = 0x42;
            dm.write_page(PageId::new(1), &page).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path).unwrap();
            assert_eq!(dm.page_count(), 2);

            let mut page = Page::new();
            dm.read_page(PageId::new(1), &mut page).unwrap();
            assert_eq!(page.as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 0);
            dm.write_page(PageId::new(0), &Page::new()).unwrap();
        }

        {
            let dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 1);
        }
    }
}
