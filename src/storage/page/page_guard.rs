use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::page::page::{MutRefPageData, Page, RefPageData};

/// RAII wrapper over a pinned page.
///
/// Holding a PageGuard keeps the page pinned; dropping it unpins the page
/// exactly once, passing along whether the guard handed out write access.
/// This makes the unpin accounting symmetric with the pin pattern on every
/// exit path, including early returns out of probe loops.
///
/// Frame-latch access goes through `read()`/`write()`, whose guards must be
/// released before this guard is dropped (the borrow checker enforces it).
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
}

impl PageGuard {
    /// Pins the page with the given id. None when the pool has no frame to
    /// spare.
    pub fn fetch(bpm: &Arc<BufferPoolManager>, page_id: PageId) -> Option<PageGuard> {
        let page = bpm.fetch_page(page_id)?;
        Some(Self {
            bpm: bpm.clone(),
            page,
            is_dirty: false,
        })
    }

    /// Allocates a fresh page and pins it. The frame itself is already
    /// marked dirty by the pool, so the new contents reach disk regardless
    /// of the flag this guard reports back.
    pub fn new_page(bpm: &Arc<BufferPoolManager>) -> Option<PageGuard> {
        let page = bpm.new_page()?;
        Some(Self {
            bpm: bpm.clone(),
            page,
            is_dirty: false,
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id().unwrap()
    }

    /// Takes the frame latch in read mode.
    pub fn read(&self) -> RefPageData<'_> {
        self.page.get_data()
    }

    /// Takes the frame latch in write mode and records that the page must be
    /// unpinned dirty.
    pub fn write(&mut self) -> MutRefPageData<'_> {
        self.is_dirty = true;
        self.page.get_data_mut()
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page_id) = self.page.get_page_id() {
            self.bpm.unpin_page(page_id, self.is_dirty);
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::storage::disk::DiskManager;

    #[test]
    fn test_page_guard_unpins_once() {
        let dir = TempDir::new("test").unwrap();
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")));
        let bpm = Arc::new(BufferPoolManager::new(5, disk_manager));

        let guard = PageGuard::new_page(&bpm).unwrap();
        let page_id = guard.page_id();
        let page = bpm.fetch_page(page_id).unwrap();
        assert_eq!(2, page.get_pin_count());

        drop(guard);
        assert_eq!(1, page.get_pin_count());
        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(0, page.get_pin_count());
    }

    #[test]
    fn test_write_access_marks_dirty() {
        let dir = TempDir::new("test").unwrap();
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")));
        let bpm = Arc::new(BufferPoolManager::new(5, disk_manager));

        let page_id = {
            let mut guard = PageGuard::new_page(&bpm).unwrap();
            let page_id = guard.page_id();
            guard.write()[..5].copy_from_slice(b"hello");
            page_id
        };
        bpm.flush_page(page_id);

        // Evict the page by cycling fresh pages through the pool, then fault
        // it back in and check the bytes survived.
        for _ in 0..5 {
            let guard = PageGuard::new_page(&bpm).unwrap();
            drop(guard);
        }
        let guard = PageGuard::fetch(&bpm, page_id).unwrap();
        assert_eq!(b"hello", &guard.read()[..5]);
    }
}
