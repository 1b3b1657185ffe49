//! Configuration constants for StrataDB.

/// Size of a page in bytes (4KB).
///
/// Every header, directory and bucket page of the extendible hash table
/// occupies exactly one page of this size.
pub const PAGE_SIZE: usize = 4096;

/// Default `K` for the LRU-K replacer.
pub const LRUK_REPLACER_K: usize = 10;

/// Largest `max_depth` a hash table header page supports.
pub const HTABLE_HEADER_MAX_DEPTH: u32 = 9;

/// Number of directory slots in a header page (`2^HTABLE_HEADER_MAX_DEPTH`).
pub const HTABLE_HEADER_ARRAY_SIZE: usize = 1 << HTABLE_HEADER_MAX_DEPTH;

/// Largest global depth a hash table directory page supports.
pub const HTABLE_DIRECTORY_MAX_DEPTH: u32 = 9;

/// Number of bucket slots in a directory page (`2^HTABLE_DIRECTORY_MAX_DEPTH`).
pub const HTABLE_DIRECTORY_ARRAY_SIZE: usize = 1 << HTABLE_DIRECTORY_MAX_DEPTH;

/// Bytes at the start of a bucket page before the first entry
/// (page type tag, size, max size).
pub const HTABLE_BUCKET_PAGE_METADATA_SIZE: usize = 12;

/// How many `(key, value)` pairs of `entry_size` bytes fit in one bucket page.
#[inline]
pub const fn htable_bucket_array_size(entry_size: usize) -> usize {
    (PAGE_SIZE - HTABLE_BUCKET_PAGE_METADATA_SIZE) / entry_size
}
