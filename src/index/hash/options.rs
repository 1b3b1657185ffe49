//! Sizing options for a disk-backed extendible hash table.

use crate::common::config::{
    htable_bucket_array_size, HTABLE_DIRECTORY_MAX_DEPTH, HTABLE_HEADER_MAX_DEPTH,
};
use crate::common::{Error, Result};

use super::key::Storable;

/// Depth limits and bucket capacity for a [`DiskExtendibleHashTable`].
///
/// `bucket_max_size` of `None` fills each bucket page to capacity, which
/// depends on the key and value widths.
///
/// [`DiskExtendibleHashTable`]: super::DiskExtendibleHashTable
///
/// # Example
/// ```
/// use stratadb::index::hash::HashTableOptions;
///
/// let options = HashTableOptions::default()
///     .with_directory_max_depth(3)
///     .with_bucket_max_size(2);
/// assert!(options.validate::<i32, i32>().is_ok());
/// assert_eq!(options.bucket_max_size_for::<i32, i32>(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableOptions {
    pub header_max_depth: u32,
    pub directory_max_depth: u32,
    pub bucket_max_size: Option<u32>,
}

impl Default for HashTableOptions {
    fn default() -> Self {
        Self {
            header_max_depth: HTABLE_HEADER_MAX_DEPTH,
            directory_max_depth: HTABLE_DIRECTORY_MAX_DEPTH,
            bucket_max_size: None,
        }
    }
}

impl HashTableOptions {
    pub fn with_header_max_depth(mut self, depth: u32) -> Self {
        self.header_max_depth = depth;
        self
    }

    pub fn with_directory_max_depth(mut self, depth: u32) -> Self {
        self.directory_max_depth = depth;
        self
    }

    pub fn with_bucket_max_size(mut self, size: u32) -> Self {
        self.bucket_max_size = Some(size);
        self
    }

    /// Bucket capacity for `K`/`V` entries.
    pub fn bucket_max_size_for<K: Storable, V: Storable>(&self) -> u32 {
        self.bucket_max_size
            .unwrap_or(htable_bucket_array_size(K::SIZE + V::SIZE) as u32)
    }

    /// Check every limit against what the page formats can hold.
    pub fn validate<K: Storable, V: Storable>(&self) -> Result<()> {
        if self.header_max_depth > HTABLE_HEADER_MAX_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "header_max_depth {} exceeds {}",
                self.header_max_depth, HTABLE_HEADER_MAX_DEPTH
            )));
        }
        if self.directory_max_depth > HTABLE_DIRECTORY_MAX_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "directory_max_depth {} exceeds {}",
                self.directory_max_depth, HTABLE_DIRECTORY_MAX_DEPTH
            )));
        }
        let capacity = htable_bucket_array_size(K::SIZE + V::SIZE) as u32;
        let bucket_max_size = self.bucket_max_size_for::<K, V>();
        if bucket_max_size == 0 || bucket_max_size > capacity {
            return Err(Error::InvalidConfig(format!(
                "bucket_max_size {} must be in 1..={}",
                bucket_max_size, capacity
            )));
        }
        Ok(())
    }
}
