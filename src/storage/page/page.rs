//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Pages are stored in [`Frame`]s within the
//! buffer pool.
//!
//! [`Frame`]: crate::buffer::Frame

use crate::common::config::PAGE_SIZE;

use super::page_type::PageType;

/// A page of data (4KB, 4KB-aligned).
///
/// The buffer pool never interprets page bytes. Structured formats (the hash
/// table header, directory and bucket pages) are views over the slice
/// returned by [`Page::as_slice`] / [`Page::as_mut_slice`], and record their
/// format in byte 0 (see [`PageType`]).
///
/// `Page` does NOT implement `Clone` outside tests; copying 4KB goes through
/// the explicit [`Page::copy_from`].
///
/// # Example
/// ```
/// use stratadb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the contents of `other`.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    /// The format tag stored in byte 0.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[0])
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}
