//! Page identifier type.

use std::fmt;

/// Identifies a page on disk.
///
/// Page ids are handed out by the buffer pool from a monotonically increasing
/// counter and are never reused within a running pool, even after
/// [`delete_page`](crate::buffer::BufferPoolManager::delete_page).
///
/// Serialized as a little-endian `u32` inside hash table pages, with
/// [`PageId::INVALID`] marking an unused slot.
///
/// # Example
/// ```
/// use stratadb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::from_le_bytes(page_id.to_le_bytes()), page_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel for "no page".
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Encoded width in bytes.
    pub const SIZE: usize = 4;

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    #[inline]
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        PageId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
