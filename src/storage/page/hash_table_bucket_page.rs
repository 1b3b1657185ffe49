//! Bucket page of the disk extendible hash table.
//!
//! A bucket is an unordered array of fixed-width `(key, value)` entries.
//! Duplicate keys are allowed; a key may map to several values.

use std::marker::PhantomData;

use crate::common::config::{htable_bucket_array_size, HTABLE_BUCKET_PAGE_METADATA_SIZE};
use crate::common::{Error, Result};
use crate::index::hash::{KeyComparator, Storable};

use super::page_type::PageType;
use super::{read_u32, write_u32};

const OFFSET_SIZE: usize = 4;
const OFFSET_MAX_SIZE: usize = 8;
const OFFSET_ENTRIES: usize = HTABLE_BUCKET_PAGE_METADATA_SIZE;

/// View over a bucket page holding `K` keys and `V` values.
///
/// # Layout
/// ```text
/// Offset  Size            Field
/// ------  ----            -----
/// 0       1               page_type (HashTableBucket)
/// 1       3               reserved
/// 4       4               size (entries in use)
/// 8       4               max_size
/// 12      n * entry_size  entries: key bytes followed by value bytes
/// ```
pub struct HashTableBucketPage<B, K, V> {
    data: B,
    _marker: PhantomData<(K, V)>,
}

impl<B, K: Storable, V: Storable> HashTableBucketPage<B, K, V> {
    /// Encoded width of one entry.
    pub const ENTRY_SIZE: usize = K::SIZE + V::SIZE;

    /// How many entries fit in a page for this key/value pair.
    pub const CAPACITY: usize = htable_bucket_array_size(K::SIZE + V::SIZE);

    #[inline]
    fn entry_offset(idx: usize) -> usize {
        OFFSET_ENTRIES + idx * Self::ENTRY_SIZE
    }
}

impl<B: AsRef<[u8]>, K: Storable, V: Storable> HashTableBucketPage<B, K, V> {
    /// Interpret an existing bucket page.
    ///
    /// # Errors
    /// `PageTypeMismatch` if the page is not a bucket page.
    pub fn open(data: B) -> Result<Self> {
        PageType::HashTableBucket.expect_in(data.as_ref())?;
        Ok(Self {
            data,
            _marker: PhantomData,
        })
    }

    pub fn size(&self) -> u32 {
        read_u32(self.data.as_ref(), OFFSET_SIZE)
    }

    pub fn max_size(&self) -> u32 {
        read_u32(self.data.as_ref(), OFFSET_MAX_SIZE)
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.max_size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// # Panics
    /// Panics if `idx >= size()`.
    pub fn key_at(&self, idx: u32) -> K {
        self.check_index(idx);
        let offset = Self::entry_offset(idx as usize);
        K::decode(&self.data.as_ref()[offset..offset + K::SIZE])
    }

    /// # Panics
    /// Panics if `idx >= size()`.
    pub fn value_at(&self, idx: u32) -> V {
        self.check_index(idx);
        let offset = Self::entry_offset(idx as usize) + K::SIZE;
        V::decode(&self.data.as_ref()[offset..offset + V::SIZE])
    }

    /// # Panics
    /// Panics if `idx >= size()`.
    pub fn entry_at(&self, idx: u32) -> (K, V) {
        (self.key_at(idx), self.value_at(idx))
    }

    /// Every value stored under a key equal to `key` under `cmp`.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Vec<V> {
        (0..self.size())
            .filter(|&idx| cmp.compare(&self.key_at(idx), key).is_eq())
            .map(|idx| self.value_at(idx))
            .collect()
    }

    fn check_index(&self, idx: u32) {
        assert!(
            idx < self.size(),
            "entry index {} out of range for bucket of size {}",
            idx,
            self.size()
        );
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: Storable, V: Storable> HashTableBucketPage<B, K, V> {
    /// Format `data` as an empty bucket holding at most `max_size` entries.
    ///
    /// # Errors
    /// `InvalidConfig` if `max_size` is 0 or more entries than fit in a page.
    pub fn init(mut data: B, max_size: u32) -> Result<Self> {
        if max_size == 0 || max_size as usize > Self::CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "bucket max_size {} must be in 1..={}",
                max_size,
                Self::CAPACITY
            )));
        }

        let bytes = data.as_mut();
        bytes[..OFFSET_ENTRIES].fill(0);
        PageType::HashTableBucket.write_to(bytes);
        write_u32(bytes, OFFSET_SIZE, 0);
        write_u32(bytes, OFFSET_MAX_SIZE, max_size);

        Ok(Self {
            data,
            _marker: PhantomData,
        })
    }

    /// Append an entry. Returns false if the bucket is full.
    pub fn insert(&mut self, key: &K, value: &V) -> bool {
        if self.is_full() {
            return false;
        }

        let size = self.size();
        let offset = Self::entry_offset(size as usize);
        let bytes = self.data.as_mut();
        key.encode(&mut bytes[offset..offset + K::SIZE]);
        value.encode(&mut bytes[offset + K::SIZE..offset + Self::ENTRY_SIZE]);
        write_u32(bytes, OFFSET_SIZE, size + 1);
        true
    }

    /// Remove every entry whose key equals `key`. Returns how many went.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> usize {
        let mut removed = 0;
        let mut idx = 0;
        while idx < self.size() {
            if cmp.compare(&self.key_at(idx), key).is_eq() {
                self.remove_at(idx);
                removed += 1;
            } else {
                idx += 1;
            }
        }
        removed
    }

    /// Remove the entry at `idx`, shifting later entries down.
    ///
    /// # Panics
    /// Panics if `idx >= size()`.
    pub fn remove_at(&mut self, idx: u32) {
        self.check_index(idx);

        let size = self.size();
        let start = Self::entry_offset(idx as usize);
        let end = Self::entry_offset(size as usize);
        let bytes = self.data.as_mut();
        bytes.copy_within(start + Self::ENTRY_SIZE..end, start);
        write_u32(bytes, OFFSET_SIZE, size - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hash::{GenericComparator, GenericKey, IntComparator, Rid};
    use crate::storage::page::Page;
    use crate::common::PageId;

    type IntBucket<'a> = HashTableBucketPage<&'a mut [u8], i32, i32>;

    #[test]
    fn test_bucket_capacity() {
        assert_eq!(IntBucket::CAPACITY, 510);
        assert_eq!(
            HashTableBucketPage::<&[u8], GenericKey<8>, Rid>::CAPACITY,
            255
        );
    }

    #[test]
    fn test_bucket_init_validates_max_size() {
        let mut page = Page::new();
        assert!(IntBucket::init(page.as_mut_slice(), 0).is_err());
        assert!(IntBucket::init(page.as_mut_slice(), 511).is_err());
        assert!(IntBucket::init(page.as_mut_slice(), 510).is_ok());
    }

    #[test]
    fn test_bucket_insert_until_full() {
        let mut page = Page::new();
        let mut bucket = IntBucket::init(page.as_mut_slice(), 3).unwrap();
        assert!(bucket.is_empty());

        assert!(bucket.insert(&1, &10));
        assert!(bucket.insert(&2, &20));
        assert!(bucket.insert(&3, &30));
        assert!(bucket.is_full());
        assert!(!bucket.insert(&4, &40));

        assert_eq!(bucket.size(), 3);
        assert_eq!(bucket.entry_at(1), (2, 20));
    }

    #[test]
    fn test_bucket_lookup_returns_all_duplicates() {
        let mut page = Page::new();
        let mut bucket = IntBucket::init(page.as_mut_slice(), 8).unwrap();
        bucket.insert(&7, &1);
        bucket.insert(&8, &2);
        bucket.insert(&7, &3);

        assert_eq!(bucket.lookup(&7, &IntComparator), vec![1, 3]);
        assert_eq!(bucket.lookup(&8, &IntComparator), vec![2]);
        assert!(bucket.lookup(&9, &IntComparator).is_empty());
    }

    #[test]
    fn test_bucket_remove_all_matches_and_compacts() {
        let mut page = Page::new();
        let mut bucket = IntBucket::init(page.as_mut_slice(), 8).unwrap();
        for (k, v) in [(1, 10), (2, 20), (1, 11), (3, 30), (1, 12)] {
            bucket.insert(&k, &v);
        }

        assert_eq!(bucket.remove(&1, &IntComparator), 3);
        assert_eq!(bucket.size(), 2);
        assert_eq!(bucket.entry_at(0), (2, 20));
        assert_eq!(bucket.entry_at(1), (3, 30));
        assert_eq!(bucket.remove(&1, &IntComparator), 0);
    }

    #[test]
    fn test_bucket_remove_at() {
        let mut page = Page::new();
        let mut bucket = IntBucket::init(page.as_mut_slice(), 4).unwrap();
        bucket.insert(&1, &10);
        bucket.insert(&2, &20);
        bucket.insert(&3, &30);

        bucket.remove_at(0);
        assert_eq!(bucket.size(), 2);
        assert_eq!(bucket.key_at(0), 2);
        bucket.remove_at(1);
        assert_eq!(bucket.key_at(0), 2);
        bucket.remove_at(0);
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_bucket_generic_key_with_rid() {
        let mut page = Page::new();
        let mut bucket =
            HashTableBucketPage::<_, GenericKey<16>, Rid>::init(page.as_mut_slice(), 4).unwrap();
        let key = GenericKey::<16>::from_i64(42);
        let rid = Rid::new(PageId::new(3), 9);
        bucket.insert(&key, &rid);

        assert_eq!(bucket.lookup(&key, &GenericComparator::<16>), vec![rid]);
    }

    #[test]
    fn test_bucket_open_reads_back() {
        let mut page = Page::new();
        {
            let mut bucket = IntBucket::init(page.as_mut_slice(), 4).unwrap();
            bucket.insert(&-5, &500);
        }
        let bucket = HashTableBucketPage::<_, i32, i32>::open(page.as_slice()).unwrap();
        assert_eq!(bucket.max_size(), 4);
        assert_eq!(bucket.entry_at(0), (-5, 500));
    }

    #[test]
    fn test_bucket_open_rejects_other_pages() {
        let mut page = Page::new();
        PageType::HashTableDirectory.write_to(page.as_mut_slice());
        let result = HashTableBucketPage::<_, i32, i32>::open(page.as_slice());
        assert!(matches!(result, Err(Error::PageTypeMismatch { .. })));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bucket_key_at_out_of_range() {
        let mut page = Page::new();
        let bucket = IntBucket::init(page.as_mut_slice(), 4).unwrap();
        bucket.key_at(0);
    }
}
