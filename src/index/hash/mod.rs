//! Extendible hash index.
//!
//! The page formats live in [`crate::storage::page`]; this module supplies
//! the key encodings, comparators and hash functions they are generic over,
//! plus the [`DiskExtendibleHashTable`] that ties them to the buffer pool.

mod comparator;
mod disk_extendible_hash_table;
mod hasher;
mod key;
mod options;

pub use comparator::{GenericComparator, IntComparator, KeyComparator};
pub use disk_extendible_hash_table::DiskExtendibleHashTable;
pub use hasher::{Crc32Hasher, KeyHasher};
pub use key::{GenericKey, Rid, Storable};
pub use options::HashTableOptions;

/// Table over `i32` keys and values.
pub type IntHashTable = DiskExtendibleHashTable<i32, i32, IntComparator>;

/// Table mapping `N`-byte keys to record ids.
pub type GenericHashTable<const N: usize> =
    DiskExtendibleHashTable<GenericKey<N>, Rid, GenericComparator<N>>;
