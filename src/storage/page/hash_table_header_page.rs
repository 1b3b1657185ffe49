//! Header page of the disk extendible hash table.
//!
//! The header is the root of the index. It routes the top `max_depth` bits
//! of a key's hash to a directory page.

use crate::common::config::{HTABLE_HEADER_ARRAY_SIZE, HTABLE_HEADER_MAX_DEPTH};
use crate::common::{Error, PageId, Result};

use super::page_type::PageType;
use super::{read_u32, write_u32};

/// View over a header page.
///
/// `B` is the page buffer: `&[u8]` from a read guard, `&mut [u8]` from a
/// write guard.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (HashTableHeader)
/// 1       3     reserved
/// 4       4     max_depth
/// 8       2048  directory_page_ids[512] (PageId, little-endian)
/// ```
pub struct HashTableHeaderPage<B> {
    data: B,
}

impl HashTableHeaderPage<()> {
    pub const OFFSET_MAX_DEPTH: usize = 4;
    pub const OFFSET_DIRECTORY_IDS: usize = 8;
    /// Bytes used by the header format.
    pub const SIZE: usize = Self::OFFSET_DIRECTORY_IDS + HTABLE_HEADER_ARRAY_SIZE * PageId::SIZE;
}

type Layout = HashTableHeaderPage<()>;

impl<B: AsRef<[u8]>> HashTableHeaderPage<B> {
    /// Interpret an existing header page.
    ///
    /// # Errors
    /// `PageTypeMismatch` if the page is not a header page.
    pub fn open(data: B) -> Result<Self> {
        PageType::HashTableHeader.expect_in(data.as_ref())?;
        Ok(Self { data })
    }

    /// Number of hash bits used to pick a directory.
    pub fn max_depth(&self) -> u32 {
        read_u32(self.data.as_ref(), Layout::OFFSET_MAX_DEPTH)
    }

    /// Number of directory slots in use (`2^max_depth`).
    pub fn max_size(&self) -> u32 {
        1 << self.max_depth()
    }

    /// Directory slot for a hash: its top `max_depth` bits.
    pub fn hash_to_directory_index(&self, hash: u32) -> u32 {
        let depth = self.max_depth();
        if depth == 0 {
            0
        } else {
            hash >> (32 - depth)
        }
    }

    /// Directory page id stored in a slot, [`PageId::INVALID`] if none.
    ///
    /// # Panics
    /// Panics if `directory_idx >= max_size()`.
    pub fn directory_page_id(&self, directory_idx: u32) -> PageId {
        assert!(
            directory_idx < self.max_size(),
            "directory index {} out of range",
            directory_idx
        );
        let offset = Layout::OFFSET_DIRECTORY_IDS + directory_idx as usize * PageId::SIZE;
        PageId(read_u32(self.data.as_ref(), offset))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HashTableHeaderPage<B> {
    /// Format `data` as an empty header page.
    ///
    /// # Errors
    /// `InvalidConfig` if `max_depth > HTABLE_HEADER_MAX_DEPTH`.
    pub fn init(mut data: B, max_depth: u32) -> Result<Self> {
        if max_depth > HTABLE_HEADER_MAX_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "header max_depth {} exceeds {}",
                max_depth, HTABLE_HEADER_MAX_DEPTH
            )));
        }

        let bytes = data.as_mut();
        bytes[..Layout::SIZE].fill(0);
        PageType::HashTableHeader.write_to(bytes);
        write_u32(bytes, Layout::OFFSET_MAX_DEPTH, max_depth);
        for idx in 0..HTABLE_HEADER_ARRAY_SIZE {
            let offset = Layout::OFFSET_DIRECTORY_IDS + idx * PageId::SIZE;
            write_u32(bytes, offset, PageId::INVALID.0);
        }

        Ok(Self { data })
    }

    /// # Panics
    /// Panics if `directory_idx >= max_size()`.
    pub fn set_directory_page_id(&mut self, directory_idx: u32, directory_page_id: PageId) {
        assert!(
            directory_idx < self.max_size(),
            "directory index {} out of range",
            directory_idx
        );
        let offset = Layout::OFFSET_DIRECTORY_IDS + directory_idx as usize * PageId::SIZE;
        write_u32(self.data.as_mut(), offset, directory_page_id.0);
    }
}
