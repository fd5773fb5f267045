use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// One page transfer for the scheduler's worker to carry out. The
/// completion sender fires after the transfer went through the disk
/// manager.
pub enum DiskRequest {
    /// Fill the page's buffer from its slot in the database file.
    Read {
        page: Page,
        callback: oneshot::Sender<()>,
    },
    /// Persist the page's buffer into its slot in the database file.
    Write {
        page: Page,
        callback: oneshot::Sender<()>,
    },
}

/// Funnels page I/O through a single background worker thread.
///
/// Requests enqueue over a channel and are carried out in arrival order;
/// each caller blocks on the completion channel of its own request.
/// Shutdown is the queue hanging up: dropping the scheduler drops the only
/// sender, the worker drains whatever is left and exits, and drop joins
/// it.
pub struct DiskScheduler {
    /// Sending half of the request queue. None only while dropping.
    request_queue: Option<mpsc::Sender<DiskRequest>>,
    /// The worker draining the queue against the disk manager.
    worker: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            for request in rx {
                Self::execute(&disk_manager, request);
            }
        });
        Self {
            request_queue: Some(tx),
            worker: Some(worker),
        }
    }

    /// Hands a request to the worker. Completion is signalled through the
    /// request's callback channel.
    pub fn schedule(&self, request: DiskRequest) {
        self.request_queue
            .as_ref()
            .expect("scheduler is shutting down")
            .send(request)
            .unwrap();
    }

    fn execute(disk_manager: &DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read { page, callback } => {
                let page_id = page.get_page_id().unwrap();
                disk_manager.read_page(page_id, &mut *page.get_data_mut());
                callback.send(()).unwrap();
            }
            DiskRequest::Write { page, callback } => {
                let page_id = page.get_page_id().unwrap();
                disk_manager.write_page(page_id, &*page.get_data());
                callback.send(()).unwrap();
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Hanging up the queue tells the worker to finish and exit.
        self.request_queue.take();
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }
}
