//! Disk-backed extendible hash table.
//!
//! ```text
//!              header page
//!        ┌────────────────────┐   top `header_max_depth` bits of the hash
//!        │ dir[0] dir[1] ...  │
//!        └───┬────────────────┘
//!            ▼
//!      directory page            low `global_depth` bits of the hash
//!   ┌────────────────────────┐
//!   │ slot 0 │ slot 1 │ ...  │   each slot: bucket page id + local depth
//!   └───┬────────┬───────────┘
//!       ▼        ▼
//!    bucket    bucket            up to `bucket_max_size` (key, value) pairs
//! ```
//!
//! Every page is reached through the buffer pool, so the table works the same
//! on a [`DiskManager`](crate::storage::DiskManager) or a
//! [`MemoryStore`](crate::storage::MemoryStore).
//!
//! # Latching
//! Lookups crab down with read latches: header, then directory, then bucket,
//! releasing each parent once the child is latched. Inserts and removes hold
//! the directory's write latch for the whole operation, so splits, merges and
//! directory resizes are never visible half-done.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{HashTableBucketPage, HashTableDirectoryPage, HashTableHeaderPage};

use super::comparator::KeyComparator;
use super::hasher::{Crc32Hasher, KeyHasher};
use super::key::Storable;
use super::options::HashTableOptions;

/// An extendible hash index whose pages live in a [`BufferPoolManager`].
///
/// Keys may map to several values; [`get_value`](Self::get_value) returns all
/// of them and [`remove`](Self::remove) drops all of them.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use stratadb::buffer::BufferPoolManager;
/// use stratadb::index::hash::{Crc32Hasher, DiskExtendibleHashTable, HashTableOptions, IntComparator};
/// use stratadb::storage::MemoryStore;
///
/// let bpm = Arc::new(BufferPoolManager::new(8, 2, MemoryStore::new()));
/// let table: DiskExtendibleHashTable<i32, i32, IntComparator> = DiskExtendibleHashTable::new(
///     "orders_pk",
///     bpm,
///     IntComparator,
///     Crc32Hasher,
///     HashTableOptions::default(),
/// )
/// .unwrap();
///
/// assert!(table.insert(&1, &100).unwrap());
/// assert_eq!(table.get_value(&1).unwrap(), vec![100]);
/// assert!(table.remove(&1).unwrap());
/// assert!(table.get_value(&1).unwrap().is_empty());
/// ```
pub struct DiskExtendibleHashTable<K, V, C, H = Crc32Hasher> {
    name: String,
    bpm: Arc<BufferPoolManager>,
    cmp: C,
    hash_fn: H,
    header_page_id: PageId,
    directory_max_depth: u32,
    bucket_max_size: u32,
    _entries: PhantomData<fn() -> (K, V)>,
}

type Bucket<B, K, V> = HashTableBucketPage<B, K, V>;

impl<K, V, C, H> DiskExtendibleHashTable<K, V, C, H>
where
    K: Storable,
    V: Storable,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
{
    /// Create an empty table, allocating and initialising its header page.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        cmp: C,
        hash_fn: H,
        options: HashTableOptions,
    ) -> Result<Self> {
        options.validate::<K, V>()?;

        let header_page_id = {
            let mut guard = bpm.new_page_guarded()?.upgrade_write();
            HashTableHeaderPage::init(guard.as_mut_slice(), options.header_max_depth)?;
            guard.page_id()
        };

        let name = name.into();
        debug!("{}: created hash table with header {}", name, header_page_id);
        Ok(Self::with_header(name, bpm, cmp, hash_fn, header_page_id, options))
    }

    /// Attach to a table created earlier whose header lives at `header_page_id`.
    ///
    /// Existing directories and buckets keep the limits they were created
    /// with; `options` applies to pages allocated from now on.
    pub fn open(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        cmp: C,
        hash_fn: H,
        header_page_id: PageId,
        options: HashTableOptions,
    ) -> Result<Self> {
        options.validate::<K, V>()?;
        {
            let guard = bpm.fetch_page_read(header_page_id)?;
            HashTableHeaderPage::open(guard.as_slice())?;
        }
        Ok(Self::with_header(
            name.into(),
            bpm,
            cmp,
            hash_fn,
            header_page_id,
            options,
        ))
    }

    fn with_header(
        name: String,
        bpm: Arc<BufferPoolManager>,
        cmp: C,
        hash_fn: H,
        header_page_id: PageId,
        options: HashTableOptions,
    ) -> Self {
        Self {
            name,
            bpm,
            cmp,
            hash_fn,
            header_page_id,
            directory_max_depth: options.directory_max_depth,
            bucket_max_size: options.bucket_max_size_for::<K, V>(),
            _entries: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page id to pass to [`open`](Self::open) later.
    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    #[inline]
    fn hash(&self, key: &K) -> u32 {
        self.hash_fn.hash_key(key)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// All values stored under `key`, or an empty vector.
    pub fn get_value(&self, key: &K) -> Result<Vec<V>> {
        let hash = self.hash(key);

        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashTableHeaderPage::open(header_guard.as_slice())?;
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if !directory_page_id.is_valid() {
            return Ok(Vec::new());
        }
        let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
        drop(header_guard);

        let directory = HashTableDirectoryPage::open(directory_guard.as_slice())?;
        let bucket_page_id = directory.bucket_page_id(directory.hash_to_bucket_index(hash));
        if !bucket_page_id.is_valid() {
            return Ok(Vec::new());
        }
        let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
        drop(directory_guard);

        let bucket = Bucket::<_, K, V>::open(bucket_guard.as_slice())?;
        Ok(bucket.lookup(key, &self.cmp))
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Add `(key, value)`, splitting buckets and growing the directory as
    /// needed.
    ///
    /// Returns `Ok(false)` when the target bucket is full and its directory
    /// is already at maximum depth.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        let hash = self.hash(key);
        let mut directory_guard = self.directory_for_insert(hash)?;
        let max_depth = HashTableDirectoryPage::open(directory_guard.as_slice())?.max_depth();

        // Each pass either inserts or splits, and a bucket splits at most
        // max_depth times.
        for _ in 0..max_depth + 2 {
            let (bucket_idx, bucket_page_id) = {
                let directory = HashTableDirectoryPage::open(directory_guard.as_slice())?;
                let bucket_idx = directory.hash_to_bucket_index(hash);
                (bucket_idx, directory.bucket_page_id(bucket_idx))
            };

            if !bucket_page_id.is_valid() {
                return self.insert_into_new_bucket(&mut directory_guard, bucket_idx, key, value);
            }

            let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
            if !Bucket::<_, K, V>::open(bucket_guard.as_slice())?.is_full() {
                let mut bucket = Bucket::<_, K, V>::open(bucket_guard.as_mut_slice())?;
                return Ok(bucket.insert(key, value));
            }

            if !self.split_bucket(&mut directory_guard, bucket_idx, &mut bucket_guard)? {
                warn!(
                    "{}: bucket {} is full and its directory is at max depth {}",
                    self.name, bucket_page_id, max_depth
                );
                return Ok(false);
            }
        }

        warn!(
            "{}: insert still hit a full bucket after {} splits",
            self.name,
            max_depth + 2
        );
        Ok(false)
    }

    /// Write-latch the directory covering `hash`, creating it if the header
    /// has none yet.
    fn directory_for_insert(&self, hash: u32) -> Result<PageWriteGuard<'_>> {
        {
            let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
            let header = HashTableHeaderPage::open(header_guard.as_slice())?;
            let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
            if directory_page_id.is_valid() {
                return self.bpm.fetch_page_write(directory_page_id);
            }
        }

        let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let directory_idx = HashTableHeaderPage::open(header_guard.as_slice())?
            .hash_to_directory_index(hash);

        // Another writer may have created it between the two latches.
        let existing = HashTableHeaderPage::open(header_guard.as_slice())?
            .directory_page_id(directory_idx);
        if existing.is_valid() {
            return self.bpm.fetch_page_write(existing);
        }

        let mut directory_guard = self.bpm.new_page_guarded()?.upgrade_write();
        HashTableDirectoryPage::init(directory_guard.as_mut_slice(), self.directory_max_depth)?;
        let directory_page_id = directory_guard.page_id();

        let mut header = HashTableHeaderPage::open(header_guard.as_mut_slice())?;
        header.set_directory_page_id(directory_idx, directory_page_id);
        debug!(
            "{}: created directory {} at header slot {}",
            self.name, directory_page_id, directory_idx
        );
        Ok(directory_guard)
    }

    fn insert_into_new_bucket(
        &self,
        directory_guard: &mut PageWriteGuard<'_>,
        bucket_idx: u32,
        key: &K,
        value: &V,
    ) -> Result<bool> {
        let mut bucket_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let bucket_page_id = bucket_guard.page_id();
        let mut bucket = Bucket::<_, K, V>::init(bucket_guard.as_mut_slice(), self.bucket_max_size)?;
        let inserted = bucket.insert(key, value);

        let mut directory = HashTableDirectoryPage::open(directory_guard.as_mut_slice())?;
        let global_depth = directory.global_depth();
        directory.set_bucket_page_id(bucket_idx, bucket_page_id);
        directory.set_local_depth(bucket_idx, global_depth);
        trace!(
            "{}: bucket {} created for slot {}",
            self.name,
            bucket_page_id,
            bucket_idx
        );
        Ok(inserted)
    }

    /// Split the full bucket behind `bucket_idx` into itself and a new split
    /// image, growing the directory if the bucket is at global depth.
    ///
    /// Returns `Ok(false)` without changing anything when the directory
    /// cannot grow.
    fn split_bucket(
        &self,
        directory_guard: &mut PageWriteGuard<'_>,
        bucket_idx: u32,
        bucket_guard: &mut PageWriteGuard<'_>,
    ) -> Result<bool> {
        let (local_depth, global_depth, max_depth) = {
            let directory = HashTableDirectoryPage::open(directory_guard.as_slice())?;
            (
                directory.local_depth(bucket_idx),
                directory.global_depth(),
                directory.max_depth(),
            )
        };
        if local_depth == global_depth && global_depth >= max_depth {
            return Ok(false);
        }

        let bucket_page_id = bucket_guard.page_id();
        let bucket_max_size = Bucket::<_, K, V>::open(bucket_guard.as_slice())?.max_size();

        let mut image_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let image_page_id = image_guard.page_id();
        let mut image = Bucket::<_, K, V>::init(image_guard.as_mut_slice(), bucket_max_size)?;

        let mut directory = HashTableDirectoryPage::open(directory_guard.as_mut_slice())?;
        if local_depth == global_depth {
            directory.incr_global_depth();
            debug!(
                "{}: directory grew to global depth {}",
                self.name,
                directory.global_depth()
            );
        }

        // Entries whose hash has the new local-depth bit set move to the image.
        let high_bit = 1u32 << local_depth;
        let mut bucket = Bucket::<_, K, V>::open(bucket_guard.as_mut_slice())?;
        let mut idx = 0;
        while idx < bucket.size() {
            let (key, value) = bucket.entry_at(idx);
            if self.hash(&key) & high_bit != 0 {
                let moved = image.insert(&key, &value);
                debug_assert!(moved, "split image overflowed");
                bucket.remove_at(idx);
            } else {
                idx += 1;
            }
        }

        for slot in 0..directory.size() {
            if directory.bucket_page_id(slot) == bucket_page_id {
                directory.set_local_depth(slot, local_depth + 1);
                if slot & high_bit != 0 {
                    directory.set_bucket_page_id(slot, image_page_id);
                }
            }
        }

        debug!(
            "{}: split {} into {} at local depth {} ({} + {} entries)",
            self.name,
            bucket_page_id,
            image_page_id,
            local_depth + 1,
            bucket.size(),
            image.size()
        );
        Ok(true)
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove every entry stored under `key`. Returns `Ok(false)` if there
    /// was none.
    ///
    /// A bucket left empty merges with its split image, and the directory
    /// shrinks while no bucket needs its full depth.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let hash = self.hash(key);

        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashTableHeaderPage::open(header_guard.as_slice())?;
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if !directory_page_id.is_valid() {
            return Ok(false);
        }
        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        drop(header_guard);

        let (bucket_idx, bucket_page_id) = {
            let directory = HashTableDirectoryPage::open(directory_guard.as_slice())?;
            let bucket_idx = directory.hash_to_bucket_index(hash);
            (bucket_idx, directory.bucket_page_id(bucket_idx))
        };
        if !bucket_page_id.is_valid() {
            return Ok(false);
        }

        let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
        if Bucket::<_, K, V>::open(bucket_guard.as_slice())?
            .lookup(key, &self.cmp)
            .is_empty()
        {
            return Ok(false);
        }

        let now_empty = {
            let mut bucket = Bucket::<_, K, V>::open(bucket_guard.as_mut_slice())?;
            bucket.remove(key, &self.cmp);
            bucket.is_empty()
        };
        if now_empty {
            self.merge(&mut directory_guard, bucket_idx, bucket_guard)?;
        }
        Ok(true)
    }

    /// Fold empty buckets into their split images, then shrink the directory.
    fn merge<'a>(
        &'a self,
        directory_guard: &mut PageWriteGuard<'_>,
        mut bucket_idx: u32,
        mut bucket_guard: PageWriteGuard<'a>,
    ) -> Result<()> {
        let mut directory = HashTableDirectoryPage::open(directory_guard.as_mut_slice())?;

        loop {
            let local_depth = directory.local_depth(bucket_idx);
            if local_depth == 0 {
                break;
            }
            let image_idx = bucket_idx ^ (1 << (local_depth - 1));
            let image_page_id = directory.bucket_page_id(image_idx);
            if directory.local_depth(image_idx) != local_depth
                || !image_page_id.is_valid()
                || image_page_id == bucket_guard.page_id()
            {
                break;
            }

            let image_guard = self.bpm.fetch_page_write(image_page_id)?;
            let bucket_empty = Bucket::<_, K, V>::open(bucket_guard.as_slice())?.is_empty();
            let image_empty = Bucket::<_, K, V>::open(image_guard.as_slice())?.is_empty();
            if !bucket_empty && !image_empty {
                break;
            }

            let (kept, mut emptied) = if bucket_empty {
                (image_guard, bucket_guard)
            } else {
                (bucket_guard, image_guard)
            };
            let kept_page_id = kept.page_id();
            let emptied_page_id = emptied.page_id();

            for slot in 0..directory.size() {
                let slot_page_id = directory.bucket_page_id(slot);
                if slot_page_id == kept_page_id || slot_page_id == emptied_page_id {
                    directory.set_bucket_page_id(slot, kept_page_id);
                    directory.set_local_depth(slot, local_depth - 1);
                }
            }
            debug!(
                "{}: merged {} into {} at local depth {}",
                self.name,
                emptied_page_id,
                kept_page_id,
                local_depth - 1
            );

            emptied.drop_guard();
            if !self.bpm.delete_page(emptied_page_id) {
                warn!(
                    "{}: could not reclaim emptied bucket {}, still pinned",
                    self.name, emptied_page_id
                );
            }

            bucket_guard = kept;
            bucket_idx &= (1 << (local_depth - 1)) - 1;
        }

        while directory.can_shrink() {
            directory.decr_global_depth();
            debug!(
                "{}: directory shrank to global depth {}",
                self.name,
                directory.global_depth()
            );
        }
        Ok(())
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Check every directory's invariants and that each entry sits in the
    /// bucket its hash routes to.
    pub fn verify_integrity(&self) -> Result<()> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = HashTableHeaderPage::open(header_guard.as_slice())?;

        for directory_idx in 0..header.max_size() {
            let directory_page_id = header.directory_page_id(directory_idx);
            if !directory_page_id.is_valid() {
                continue;
            }
            let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
            let directory = HashTableDirectoryPage::open(directory_guard.as_slice())?;
            directory.verify_integrity()?;

            let mut seen = HashSet::new();
            for slot in 0..directory.size() {
                let bucket_page_id = directory.bucket_page_id(slot);
                if !bucket_page_id.is_valid() || !seen.insert(bucket_page_id) {
                    continue;
                }
                let local_mask = directory.local_depth_mask(slot);
                let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
                let bucket = Bucket::<_, K, V>::open(bucket_guard.as_slice())?;
                for idx in 0..bucket.size() {
                    let hash = self.hash(&bucket.key_at(idx));
                    if header.hash_to_directory_index(hash) != directory_idx
                        || hash & local_mask != slot & local_mask
                    {
                        return Err(Error::CorruptDirectory(format!(
                            "entry {} of bucket {} does not route to slot {} of directory {}",
                            idx, bucket_page_id, slot, directory_page_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
