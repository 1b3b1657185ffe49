//! Index structures built on the buffer pool.
//!
//! - [`hash`] - Disk-backed extendible hashing

pub mod hash;
