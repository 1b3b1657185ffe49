//! Storage layer - backing stores, disk scheduling and page formats.
//!
//! This module handles persistent storage:
//! - [`PageStore`] - Synchronous page I/O trait
//! - [`DiskManager`] - File-backed store
//! - [`MemoryStore`] - In-memory store for tests
//! - [`DiskScheduler`] - Background worker that serializes page I/O
//! - [`page`] - Page types and layouts

mod disk_manager;
mod disk_scheduler;
mod memory_store;
pub mod page;
mod page_store;

pub use disk_manager::DiskManager;
pub use disk_scheduler::{DiskCallback, DiskFuture, DiskRequest, DiskScheduler};
pub use memory_store::MemoryStore;
pub use page_store::PageStore;
