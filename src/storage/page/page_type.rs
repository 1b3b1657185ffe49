//! Page format discriminator.
//!
//! Every structured page records its format in byte 0 so a page can be
//! checked before it is interpreted. A zeroed page reads as
//! [`PageType::Invalid`].

use crate::common::{Error, Result};

/// Format of a page.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation on disk.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Zeroed, raw or unrecognized page.
    #[default]
    Invalid = 0,
    /// Extendible hash table header page.
    HashTableHeader = 1,
    /// Extendible hash table directory page.
    HashTableDirectory = 2,
    /// Extendible hash table bucket page.
    HashTableBucket = 3,
}

impl PageType {
    /// Byte offset of the tag within a page.
    pub const OFFSET: usize = 0;

    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::HashTableHeader,
            2 => PageType::HashTableDirectory,
            3 => PageType::HashTableBucket,
            _ => PageType::Invalid,
        }
    }

    /// Read the tag from the start of a page.
    #[inline]
    pub fn read_from(data: &[u8]) -> Self {
        Self::from_u8(data[Self::OFFSET])
    }

    /// Stamp the tag at the start of a page.
    #[inline]
    pub fn write_to(self, data: &mut [u8]) {
        data[Self::OFFSET] = self as u8;
    }

    /// Fail with `PageTypeMismatch` unless the page carries this tag.
    pub fn expect_in(self, data: &[u8]) -> Result<()> {
        let found = Self::read_from(data);
        if found == self {
            Ok(())
        } else {
            Err(Error::PageTypeMismatch {
                expected: self,
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::HashTableHeader);
        assert_eq!(PageType::from_u8(2), PageType::HashTableDirectory);
        assert_eq!(PageType::from_u8(3), PageType::HashTableBucket);
        assert_eq!(PageType::from_u8(255), PageType::Invalid);
    }

    #[test]
    fn test_page_type_tag_roundtrip() {
        let mut buffer = [0u8; 8];
        assert_eq!(PageType::read_from(&buffer), PageType::Invalid);

        PageType::HashTableBucket.write_to(&mut buffer);
        assert_eq!(buffer[0], 3);
        assert_eq!(PageType::read_from(&buffer), PageType::HashTableBucket);
    }

    #[test]
    fn test_expect_in() {
        let mut buffer = [0u8; 8];
        PageType::HashTableHeader.write_to(&mut buffer);

        assert!(PageType::HashTableHeader.expect_in(&buffer).is_ok());
        let err = PageType::HashTableDirectory.expect_in(&buffer).unwrap_err();
        assert!(matches!(
            err,
            Error::PageTypeMismatch {
                expected: PageType::HashTableDirectory,
                found: PageType::HashTableHeader,
            }
        ));
    }
}
