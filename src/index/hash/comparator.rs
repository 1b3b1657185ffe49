//! Key comparison capabilities used by bucket lookups.

use std::cmp::Ordering;

use super::key::GenericKey;

/// Total order over keys of type `K`.
///
/// Buckets only ask for equality, but the comparator returns a full
/// [`Ordering`] so the same type can back ordered indexes.
pub trait KeyComparator<K> {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

/// Compares keys with their own [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntComparator;

impl<K: Ord> KeyComparator<K> for IntComparator {
    #[inline]
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}

/// Compares [`GenericKey`]s byte by byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericComparator<const N: usize>;

impl<const N: usize> KeyComparator<GenericKey<N>> for GenericComparator<N> {
    #[inline]
    fn compare(&self, lhs: &GenericKey<N>, rhs: &GenericKey<N>) -> Ordering {
        lhs.as_bytes().cmp(rhs.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_comparator() {
        assert_eq!(IntComparator.compare(&1i32, &2), Ordering::Less);
        assert_eq!(IntComparator.compare(&5u64, &5), Ordering::Equal);
    }

    #[test]
    fn test_generic_comparator_is_bytewise() {
        let cmp = GenericComparator::<8>;
        let a = GenericKey::<8>::from_slice(b"abc");
        let b = GenericKey::<8>::from_slice(b"abd");
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
        assert_eq!(cmp.compare(&b, &b), Ordering::Equal);
    }
}
