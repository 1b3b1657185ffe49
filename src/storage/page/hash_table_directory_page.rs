//! Directory page of the disk extendible hash table.
//!
//! A directory maps the low `global_depth` bits of a hash to a bucket page.
//! Slots whose bucket has a smaller local depth share that bucket with their
//! buddies (slots agreeing on the low `local_depth` bits).

use std::collections::HashMap;

use crate::common::config::{HTABLE_DIRECTORY_ARRAY_SIZE, HTABLE_DIRECTORY_MAX_DEPTH};
use crate::common::{Error, PageId, Result};

use super::page_type::PageType;
use super::{read_u32, write_u32};

/// View over a directory page.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (HashTableDirectory)
/// 1       3     reserved
/// 4       4     max_depth
/// 8       4     global_depth
/// 12      512   local_depths[512] (u8)
/// 524     2048  bucket_page_ids[512] (PageId, little-endian)
/// ```
pub struct HashTableDirectoryPage<B> {
    data: B,
}

impl HashTableDirectoryPage<()> {
    pub const OFFSET_MAX_DEPTH: usize = 4;
    pub const OFFSET_GLOBAL_DEPTH: usize = 8;
    pub const OFFSET_LOCAL_DEPTHS: usize = 12;
    pub const OFFSET_BUCKET_IDS: usize = Self::OFFSET_LOCAL_DEPTHS + HTABLE_DIRECTORY_ARRAY_SIZE;
    /// Bytes used by the directory format.
    pub const SIZE: usize = Self::OFFSET_BUCKET_IDS + HTABLE_DIRECTORY_ARRAY_SIZE * PageId::SIZE;
}

type Layout = HashTableDirectoryPage<()>;

#[inline]
fn bucket_id_offset(bucket_idx: u32) -> usize {
    Layout::OFFSET_BUCKET_IDS + bucket_idx as usize * PageId::SIZE
}

#[inline]
fn local_depth_offset(bucket_idx: u32) -> usize {
    Layout::OFFSET_LOCAL_DEPTHS + bucket_idx as usize
}

impl<B: AsRef<[u8]>> HashTableDirectoryPage<B> {
    /// Interpret an existing directory page.
    ///
    /// # Errors
    /// `PageTypeMismatch` if the page is not a directory page.
    pub fn open(data: B) -> Result<Self> {
        PageType::HashTableDirectory.expect_in(data.as_ref())?;
        Ok(Self { data })
    }

    pub fn max_depth(&self) -> u32 {
        read_u32(self.data.as_ref(), Layout::OFFSET_MAX_DEPTH)
    }

    pub fn global_depth(&self) -> u32 {
        read_u32(self.data.as_ref(), Layout::OFFSET_GLOBAL_DEPTH)
    }

    /// Number of slots logically in use (`2^global_depth`).
    pub fn size(&self) -> u32 {
        1 << self.global_depth()
    }

    /// Largest size the directory may grow to (`2^max_depth`).
    pub fn max_size(&self) -> u32 {
        1 << self.max_depth()
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1 << self.global_depth()) - 1
    }

    pub fn local_depth_mask(&self, bucket_idx: u32) -> u32 {
        (1 << self.local_depth(bucket_idx)) - 1
    }

    /// Slot for a hash: its low `global_depth` bits.
    pub fn hash_to_bucket_index(&self, hash: u32) -> u32 {
        hash & self.global_depth_mask()
    }

    /// # Panics
    /// Panics if `bucket_idx >= size()`.
    pub fn bucket_page_id(&self, bucket_idx: u32) -> PageId {
        self.check_index(bucket_idx);
        PageId(read_u32(self.data.as_ref(), bucket_id_offset(bucket_idx)))
    }

    /// # Panics
    /// Panics if `bucket_idx >= size()`.
    pub fn local_depth(&self, bucket_idx: u32) -> u32 {
        self.check_index(bucket_idx);
        u32::from(self.data.as_ref()[local_depth_offset(bucket_idx)])
    }

    /// The slot that differs from `bucket_idx` only in the top bit of the
    /// current global depth.
    pub fn split_image_index(&self, bucket_idx: u32) -> u32 {
        let depth = self.global_depth();
        if depth == 0 {
            0
        } else {
            bucket_idx ^ (1 << (depth - 1))
        }
    }

    /// True when no slot's local depth equals the global depth.
    pub fn can_shrink(&self) -> bool {
        let global = self.global_depth();
        if global == 0 {
            return false;
        }
        (0..self.size()).all(|idx| self.local_depth(idx) < global)
    }

    /// Check the directory's structural invariants.
    ///
    /// 1. Every local depth is at most the global depth.
    /// 2. All slots pointing at one bucket agree on its local depth.
    /// 3. A bucket with local depth `ld` is referenced by exactly
    ///    `2^(global_depth - ld)` slots.
    ///
    /// Slots without a bucket are skipped.
    ///
    /// # Errors
    /// `CorruptDirectory` describing the first violation found.
    pub fn verify_integrity(&self) -> Result<()> {
        let global = self.global_depth();
        let mut buckets: HashMap<PageId, (u32, u32)> = HashMap::new();

        for idx in 0..self.size() {
            let page_id = self.bucket_page_id(idx);
            if !page_id.is_valid() {
                continue;
            }
            let local = self.local_depth(idx);
            if local > global {
                return Err(Error::CorruptDirectory(format!(
                    "slot {} has local depth {} above global depth {}",
                    idx, local, global
                )));
            }

            let entry = buckets.entry(page_id).or_insert((local, 0));
            if entry.0 != local {
                return Err(Error::CorruptDirectory(format!(
                    "{} has local depths {} and {}",
                    page_id, entry.0, local
                )));
            }
            entry.1 += 1;
        }

        for (page_id, (local, count)) in buckets {
            let expected = 1u32 << (global - local);
            if count != expected {
                return Err(Error::CorruptDirectory(format!(
                    "{} referenced by {} slots, expected {}",
                    page_id, count, expected
                )));
            }
        }

        Ok(())
    }

    fn check_index(&self, bucket_idx: u32) {
        assert!(
            bucket_idx < self.size(),
            "bucket index {} out of range for directory of size {}",
            bucket_idx,
            self.size()
        );
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HashTableDirectoryPage<B> {
    /// Format `data` as a directory of global depth 0 with no buckets.
    ///
    /// # Errors
    /// `InvalidConfig` if `max_depth > HTABLE_DIRECTORY_MAX_DEPTH`.
    pub fn init(mut data: B, max_depth: u32) -> Result<Self> {
        if max_depth > HTABLE_DIRECTORY_MAX_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "directory max_depth {} exceeds {}",
                max_depth, HTABLE_DIRECTORY_MAX_DEPTH
            )));
        }

        let bytes = data.as_mut();
        bytes[..Layout::SIZE].fill(0);
        PageType::HashTableDirectory.write_to(bytes);
        write_u32(bytes, Layout::OFFSET_MAX_DEPTH, max_depth);
        for idx in 0..HTABLE_DIRECTORY_ARRAY_SIZE as u32 {
            write_u32(bytes, bucket_id_offset(idx), PageId::INVALID.0);
        }

        Ok(Self { data })
    }

    /// # Panics
    /// Panics if `bucket_idx >= size()`.
    pub fn set_bucket_page_id(&mut self, bucket_idx: u32, bucket_page_id: PageId) {
        self.check_index(bucket_idx);
        write_u32(self.data.as_mut(), bucket_id_offset(bucket_idx), bucket_page_id.0);
    }

    /// # Panics
    /// Panics if `bucket_idx >= size()` or `local_depth > max_depth()`.
    pub fn set_local_depth(&mut self, bucket_idx: u32, local_depth: u32) {
        self.check_index(bucket_idx);
        assert!(
            local_depth <= self.max_depth(),
            "local depth {} exceeds max depth {}",
            local_depth,
            self.max_depth()
        );
        self.data.as_mut()[local_depth_offset(bucket_idx)] = local_depth as u8;
    }

    pub fn incr_local_depth(&mut self, bucket_idx: u32) {
        let depth = self.local_depth(bucket_idx);
        self.set_local_depth(bucket_idx, depth + 1);
    }

    /// # Panics
    /// Panics if the local depth is already 0.
    pub fn decr_local_depth(&mut self, bucket_idx: u32) {
        let depth = self.local_depth(bucket_idx);
        assert!(depth > 0, "local depth of slot {} is already 0", bucket_idx);
        self.set_local_depth(bucket_idx, depth - 1);
    }

    /// Double the directory. Slot `i` of the new upper half copies the bucket
    /// and local depth of slot `i - old_size`.
    ///
    /// # Panics
    /// Panics if the global depth already equals `max_depth()`.
    pub fn incr_global_depth(&mut self) {
        let global = self.global_depth();
        assert!(
            global < self.max_depth(),
            "global depth {} already at max depth",
            global
        );

        let old_size = 1u32 << global;
        let bytes = self.data.as_mut();
        for idx in old_size..old_size * 2 {
            let src = idx - old_size;
            bytes[local_depth_offset(idx)] = bytes[local_depth_offset(src)];
            let page_id = read_u32(bytes, bucket_id_offset(src));
            write_u32(bytes, bucket_id_offset(idx), page_id);
        }
        write_u32(bytes, Layout::OFFSET_GLOBAL_DEPTH, global + 1);
    }

    /// Halve the directory, clearing the slots that fall out of use.
    ///
    /// # Panics
    /// Panics if the global depth is already 0.
    pub fn decr_global_depth(&mut self) {
        let global = self.global_depth();
        assert!(global > 0, "global depth is already 0");

        let new_size = 1u32 << (global - 1);
        let bytes = self.data.as_mut();
        for idx in new_size..new_size * 2 {
            bytes[local_depth_offset(idx)] = 0;
            write_u32(bytes, bucket_id_offset(idx), PageId::INVALID.0);
        }
        write_u32(bytes, Layout::OFFSET_GLOBAL_DEPTH, global - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::Page;

    fn directory(page: &mut Page, max_depth: u32) -> HashTableDirectoryPage<&mut [u8]> {
        HashTableDirectoryPage::init(page.as_mut_slice(), max_depth).unwrap()
    }

    #[test]
    fn test_directory_fits_in_page() {
        assert!(Layout::SIZE <= Page::size());
    }

    #[test]
    fn test_directory_init() {
        let mut page = Page::new();
        let dir = directory(&mut page, 3);

        assert_eq!(dir.max_depth(), 3);
        assert_eq!(dir.global_depth(), 0);
        assert_eq!(dir.size(), 1);
        assert_eq!(dir.max_size(), 8);
        assert_eq!(dir.bucket_page_id(0), PageId::INVALID);
        assert_eq!(dir.local_depth(0), 0);
        assert!(!dir.can_shrink());
    }

    #[test]
    fn test_directory_rejects_large_depth() {
        let mut page = Page::new();
        let result = HashTableDirectoryPage::init(page.as_mut_slice(), 10);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_hash_to_bucket_index_uses_low_bits() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 3);
        dir.set_bucket_page_id(0, PageId::new(1));

        assert_eq!(dir.hash_to_bucket_index(0xFFFF_FFFF), 0);
        dir.incr_global_depth();
        dir.incr_global_depth();
        assert_eq!(dir.global_depth_mask(), 0b11);
        assert_eq!(dir.hash_to_bucket_index(0b1110), 0b10);
        assert_eq!(dir.hash_to_bucket_index(0xFFFF_FFFF), 0b11);
    }

    #[test]
    fn test_incr_global_depth_copies_lower_half() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 3);
        dir.set_bucket_page_id(0, PageId::new(10));
        dir.incr_global_depth();
        dir.set_local_depth(0, 1);
        dir.set_bucket_page_id(1, PageId::new(11));
        dir.set_local_depth(1, 1);

        dir.incr_global_depth();

        assert_eq!(dir.size(), 4);
        assert_eq!(dir.bucket_page_id(2), PageId::new(10));
        assert_eq!(dir.bucket_page_id(3), PageId::new(11));
        assert_eq!(dir.local_depth(2), 1);
        assert_eq!(dir.local_depth(3), 1);
        assert!(dir.verify_integrity().is_ok());
    }

    #[test]
    fn test_split_image_index() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 3);
        assert_eq!(dir.split_image_index(0), 0);

        dir.incr_global_depth();
        assert_eq!(dir.split_image_index(0), 1);
        assert_eq!(dir.split_image_index(1), 0);

        dir.incr_global_depth();
        assert_eq!(dir.split_image_index(1), 3);
        assert_eq!(dir.split_image_index(2), 0);
    }

    #[test]
    fn test_local_depth_mask() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 3);
        dir.incr_global_depth();
        dir.incr_global_depth();
        dir.set_local_depth(1, 2);
        dir.incr_local_depth(0);
        assert_eq!(dir.local_depth_mask(1), 0b11);
        assert_eq!(dir.local_depth_mask(0), 0b1);
        dir.decr_local_depth(0);
        assert_eq!(dir.local_depth_mask(0), 0);
    }

    #[test]
    fn test_can_shrink() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 2);
        dir.set_bucket_page_id(0, PageId::new(5));
        dir.incr_global_depth();

        // Both slots still share page 5 at local depth 0.
        assert!(dir.can_shrink());

        dir.set_local_depth(0, 1);
        assert!(!dir.can_shrink());

        dir.set_local_depth(0, 0);
        dir.decr_global_depth();
        assert_eq!(dir.global_depth(), 0);
        assert!(!dir.can_shrink());
    }

    #[test]
    fn test_decr_global_depth_clears_upper_half() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 2);
        dir.set_bucket_page_id(0, PageId::new(5));
        dir.incr_global_depth();
        dir.decr_global_depth();
        dir.incr_global_depth();
        // Re-grown slot 1 is a fresh copy of slot 0.
        assert_eq!(dir.bucket_page_id(1), PageId::new(5));

        let raw = &page.as_slice()[bucket_id_offset(1)..bucket_id_offset(1) + 4];
        assert_eq!(raw, &5u32.to_le_bytes());
    }

    #[test]
    fn test_verify_integrity_detects_bad_reference_count() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 2);
        dir.set_bucket_page_id(0, PageId::new(5));
        dir.incr_global_depth();
        // Slot 1 points at a new bucket but slot 0 still claims depth 0.
        dir.set_bucket_page_id(1, PageId::new(6));
        dir.set_local_depth(1, 1);

        assert!(matches!(
            dir.verify_integrity(),
            Err(Error::CorruptDirectory(_))
        ));

        dir.set_local_depth(0, 1);
        assert!(dir.verify_integrity().is_ok());
    }

    #[test]
    fn test_verify_integrity_detects_inconsistent_depths() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 2);
        dir.set_bucket_page_id(0, PageId::new(5));
        dir.incr_global_depth();
        dir.set_local_depth(1, 1);

        assert!(dir.verify_integrity().is_err());
    }

    #[test]
    fn test_open_reads_back_state() {
        let mut page = Page::new();
        {
            let mut dir = directory(&mut page, 4);
            dir.set_bucket_page_id(0, PageId::new(9));
            dir.incr_global_depth();
        }
        let dir = HashTableDirectoryPage::open(page.as_slice()).unwrap();
        assert_eq!(dir.global_depth(), 1);
        assert_eq!(dir.bucket_page_id(1), PageId::new(9));

        let blank = Page::new();
        assert!(HashTableDirectoryPage::open(blank.as_slice()).is_err());
    }

    #[test]
    #[should_panic(expected = "already at max depth")]
    fn test_incr_global_depth_past_max_panics() {
        let mut page = Page::new();
        let mut dir = directory(&mut page, 1);
        dir.incr_global_depth();
        dir.incr_global_depth();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bucket_index_out_of_range_panics() {
        let mut page = Page::new();
        let dir = directory(&mut page, 3);
        dir.bucket_page_id(1);
    }
}
