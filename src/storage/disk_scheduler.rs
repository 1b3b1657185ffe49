//! Disk Scheduler - serializes page I/O on a background worker.
//!
//! Callers build a [`DiskRequest`], [`schedule`](DiskScheduler::schedule) it
//! and block on the matching [`DiskFuture`]. The worker executes requests
//! strictly in submission order against the owned [`PageStore`].
//!
//! ```text
//!  caller threads              worker thread
//!  ──────────────              ─────────────
//!  schedule(req) ──┐
//!  schedule(req) ──┼──► channel ──► store.read/write ──► callback.send(result)
//!  schedule(req) ──┘                                          │
//!  future.wait() ◄────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, trace};
use parking_lot::Mutex;

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::PageStore;

/// Completion signal carried by a request.
pub type DiskCallback = SyncSender<Result<()>>;

/// Caller side of a request's completion signal.
pub struct DiskFuture {
    rx: Receiver<Result<()>>,
}

impl DiskFuture {
    /// Block until the request completes.
    ///
    /// # Errors
    /// The store's error for a failed request, or `SchedulerShutdown` if the
    /// request was dropped without being executed.
    pub fn wait(self) -> Result<()> {
        self.rx.recv().unwrap_or(Err(Error::SchedulerShutdown))
    }
}

/// A single read or write directive.
///
/// `data` is the buffer the worker reads into or writes from. It is a
/// staging copy owned by the request, never a frame's page, so the worker
/// never waits on a page latch.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: Arc<Mutex<Page>>,
    pub page_id: PageId,
    pub callback: DiskCallback,
}

/// Single-worker FIFO I/O queue.
///
/// Dropping the scheduler enqueues a shutdown sentinel; the worker finishes
/// every request submitted before it and exits, and `drop` joins it.
pub struct DiskScheduler {
    request_tx: Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Start the worker thread, handing it ownership of `store`.
    pub fn new(store: Box<dyn PageStore>) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let worker = thread::spawn(move || Self::run_worker(store, request_rx));

        Self {
            request_tx,
            worker: Some(worker),
        }
    }

    /// Create a completion signal pair for one request.
    pub fn create_promise() -> (DiskCallback, DiskFuture) {
        let (tx, rx) = mpsc::sync_channel(1);
        (tx, DiskFuture { rx })
    }

    /// Enqueue a request. Returns as soon as it is queued.
    ///
    /// # Errors
    /// `SchedulerShutdown` if the worker is gone.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        trace!(
            "scheduling {} of {}",
            if request.is_write { "write" } else { "read" },
            request.page_id
        );
        self.request_tx
            .send(Some(request))
            .map_err(|_| Error::SchedulerShutdown)
    }

    fn run_worker(mut store: Box<dyn PageStore>, request_rx: Receiver<Option<DiskRequest>>) {
        while let Ok(Some(request)) = request_rx.recv() {
            let result = if request.is_write {
                store.write_page(request.page_id, &request.data.lock())
            } else {
                store.read_page(request.page_id, &mut request.data.lock())
            };

            if let Err(e) = &result {
                error!(
                    "disk {} of {} failed: {}",
                    if request.is_write { "write" } else { "read" },
                    request.page_id,
                    e
                );
            }

            // The issuer may have stopped waiting; nothing else to notify.
            let _ = request.callback.send(result);
        }
        trace!("disk scheduler worker exiting");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.request_tx.send(None);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("disk scheduler worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn request(
        is_write: bool,
        page: Page,
        page_id: u32,
    ) -> (DiskRequest, DiskFuture, Arc<Mutex<Page>>) {
        let data = Arc::new(Mutex::new(page));
        let (callback, future) = DiskScheduler::create_promise();
        let request = DiskRequest {
            is_write,
            data: Arc::clone(&data),
            page_id: PageId::new(page_id),
            callback,
        };
        (request, future, data)
    }

    #[test]
    fn test_write_then_read() {
        let scheduler = DiskScheduler::new(Box::new(MemoryStore::new()));

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x11;
        page.as_mut_slice()[4095] = 0x22;
        let (write, write_done, _) = request(true, page, 0);
        let (read, read_done, buffer) = request(false, Page::new(), 0);

        scheduler.schedule(write).unwrap();
        scheduler.schedule(read).unwrap();
        write_done.wait().unwrap();
        read_done.wait().unwrap();

        let buffer = buffer.lock();
        assert_eq!(buffer.as_slice()[0], 0x11);
        assert_eq!(buffer.as_slice()[4095], 0x22);
    }

    #[test]
    fn test_requests_run_in_submission_order() {
        let scheduler = DiskScheduler::new(Box::new(MemoryStore::new()));

        let mut futures = Vec::new();
        for value in 1..=20u8 {
            let mut page = Page::new();
            page.as_mut_slice()[0] = value;
            let (req, done, _) = request(true, page, 7);
            scheduler.schedule(req).unwrap();
            futures.push(done);
        }
        let (read, read_done, buffer) = request(false, Page::new(), 7);
        scheduler.schedule(read).unwrap();

        for done in futures {
            done.wait().unwrap();
        }
        read_done.wait().unwrap();
        assert_eq!(buffer.lock().as_slice()[0], 20);
    }

    #[test]
    fn test_drop_drains_pending_requests() {
        let store = MemoryStore::new();
        let scheduler = DiskScheduler::new(Box::new(store.clone()));

        for id in 0..10 {
            let (req, _done, _) = request(true, Page::new(), id);
            scheduler.schedule(req).unwrap();
        }
        drop(scheduler);

        assert_eq!(store.write_count(), 10);
    }

    #[test]
    fn test_store_error_reaches_waiter() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let scheduler = DiskScheduler::new(Box::new(store.clone()));

        let (req, done, _) = request(true, Page::new(), 0);
        scheduler.schedule(req).unwrap();
        assert!(matches!(done.wait(), Err(Error::Io(_))));

        // The worker survives a failed request.
        store.set_fail_writes(false);
        let (req, done, _) = request(true, Page::new(), 0);
        scheduler.schedule(req).unwrap();
        assert!(done.wait().is_ok());
    }

    #[test]
    fn test_dropped_callback_reports_shutdown() {
        let (callback, future) = DiskScheduler::create_promise();
        drop(callback);
        assert!(matches!(future.wait(), Err(Error::SchedulerShutdown)));
    }
}
