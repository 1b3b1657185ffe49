//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruKReplacer`] - backward K-distance LRU-K

mod lru_k;

pub use lru_k::LruKReplacer;
