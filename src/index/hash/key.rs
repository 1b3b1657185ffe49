//! Fixed-width key and value encodings stored in bucket pages.

use std::fmt;

use crate::common::PageId;

/// A type with a fixed-width little-endian encoding.
///
/// Bucket pages store entries as `K::SIZE + V::SIZE` byte records, so every
/// key and value type must encode to exactly `SIZE` bytes.
pub trait Storable: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Write `self` into `buf[..Self::SIZE]`.
    fn encode(&self, buf: &mut [u8]);

    /// Read a value back from `buf[..Self::SIZE]`.
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_storable_int {
    ($($ty:ty),*) => {
        $(
            impl Storable for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_storable_int!(i32, u32, i64, u64);

/// Record identifier: the page holding a tuple and its slot in that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self::new(PageId::INVALID, 0)
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id.0, self.slot_num)
    }
}

impl Storable for Rid {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        self.slot_num.encode(&mut buf[4..8]);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut page_id = [0u8; 4];
        page_id.copy_from_slice(&buf[0..4]);
        Self {
            page_id: PageId::from_le_bytes(page_id),
            slot_num: u32::decode(&buf[4..8]),
        }
    }
}

/// An opaque key of exactly `N` bytes.
///
/// Keys built from integers hold the value's little-endian bytes, truncated
/// to `N` bytes when `N < 8` and zero-padded otherwise.
///
/// # Example
/// ```
/// use stratadb::index::hash::GenericKey;
///
/// let key = GenericKey::<8>::from_i64(258);
/// assert_eq!(key.as_bytes(), &[2, 1, 0, 0, 0, 0, 0, 0]);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn from_i64(value: i64) -> Self {
        Self::from_slice(&value.to_le_bytes())
    }

    /// Copy up to `N` bytes of `bytes`; shorter input is zero-padded.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        let len = bytes.len().min(N);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{}>({:02x?})", N, &self.data[..])
    }
}

impl<const N: usize> Storable for GenericKey<N> {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn decode(buf: &[u8]) -> Self {
        Self::from_slice(&buf[..N])
    }
}
