//! Hash functions mapping keys to the 32-bit hashes the directory routes on.

use super::key::Storable;

/// Width of the stack buffer used to encode keys before hashing.
const INLINE_KEY_BYTES: usize = 64;

/// Maps a key to a 32-bit hash.
///
/// The header page routes on the top bits of the hash and the directory on
/// the bottom bits, so both ends should be well mixed.
pub trait KeyHasher<K> {
    fn hash_key(&self, key: &K) -> u32;
}

/// CRC32 over the key's [`Storable`] encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Hasher;

impl<K: Storable> KeyHasher<K> for Crc32Hasher {
    fn hash_key(&self, key: &K) -> u32 {
        if K::SIZE <= INLINE_KEY_BYTES {
            let mut buf = [0u8; INLINE_KEY_BYTES];
            key.encode(&mut buf[..K::SIZE]);
            crc32fast::hash(&buf[..K::SIZE])
        } else {
            let mut buf = vec![0u8; K::SIZE];
            key.encode(&mut buf);
            crc32fast::hash(&buf)
        }
    }
}
