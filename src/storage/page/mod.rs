//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageType`] - Discriminator stored in byte 0 of structured pages
//! - The three extendible hash table page formats, as views over page bytes

mod hash_table_bucket_page;
mod hash_table_directory_page;
mod hash_table_header_page;
#[allow(clippy::module_inception)]
mod page;
mod page_type;

pub use hash_table_bucket_page::HashTableBucketPage;
pub use hash_table_directory_page::HashTableDirectoryPage;
pub use hash_table_header_page::HashTableHeaderPage;
pub use page::Page;
pub use page_type::PageType;

/// Read a little-endian u32 at `offset`.
#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Write a little-endian u32 at `offset`.
#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
