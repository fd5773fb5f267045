use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::{Lsn, PageId, PAGE_SIZE};

const OFFSET_LSN: usize = 4;

pub type RefPageData<'a> = RwLockReadGuard<'a, [u8; PAGE_SIZE]>;
pub type MutRefPageData<'a> = RwLockWriteGuard<'a, [u8; PAGE_SIZE]>;

/// One buffer pool frame: a PAGE_SIZE byte buffer together with the
/// book-keeping the pool needs to manage it. Cloning a Page clones the
/// handle, not the frame.
///
/// The buffer sits behind its own RW-lock, which doubles as the per-frame
/// latch clients hold while reading or mutating page contents. The
/// book-keeping lives under a separate mutex so the buffer pool can adjust
/// pin counts and dirty flags without contending on the frame latch.
/// Callers must release any data guard before unpinning the page.
#[derive(Debug, Clone)]
pub struct Page(Arc<PageInner>);

#[derive(Debug)]
struct PageInner {
    data: RwLock<[u8; PAGE_SIZE]>,
    meta: Mutex<PageMeta>,
}

#[derive(Debug)]
struct PageMeta {
    // None while the frame is free
    page_id: Option<PageId>,
    // how many clients currently hold the frame; zero means evictable
    pin_count: i32,
    // in-memory contents are newer than the copy on disk
    is_dirty: bool,
}

impl Page {
    /// Creates a free frame with zeroed contents.
    pub fn new() -> Page {
        Page(Arc::new(PageInner {
            data: RwLock::new([0; PAGE_SIZE]),
            meta: Mutex::new(PageMeta {
                page_id: None,
                pin_count: 0,
                is_dirty: false,
            }),
        }))
    }

    pub fn reset(&self) {
        self.0.data.write().fill(0);
        let mut meta = self.0.meta.lock();
        meta.page_id = None;
        meta.pin_count = 0;
        meta.is_dirty = false;
    }

    /// Takes the frame latch in read mode and returns the page contents.
    pub fn get_data(&self) -> RefPageData<'_> {
        self.0.data.read()
    }

    /// Takes the frame latch in write mode and returns the page contents.
    pub fn get_data_mut(&self) -> MutRefPageData<'_> {
        self.0.data.write()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.0.meta.lock().page_id = Some(page_id);
    }

    /// Id of the resident page, or None while the frame is free.
    pub fn get_page_id(&self) -> Option<PageId> {
        self.0.meta.lock().page_id
    }

    pub fn get_pin_count(&self) -> i32 {
        self.0.meta.lock().pin_count
    }

    pub fn pin(&self) {
        self.0.meta.lock().pin_count += 1;
    }

    pub fn unpin(&self) {
        self.0.meta.lock().pin_count -= 1;
    }

    /// True when the in-memory contents are newer than the copy on disk.
    pub fn is_dirty(&self) -> bool {
        self.0.meta.lock().is_dirty
    }

    pub fn set_dirty(&self, is_dirty: bool) {
        self.0.meta.lock().is_dirty = is_dirty;
    }

    /// The log sequence number stored inside the page data.
    pub fn get_lsn(&self) -> Lsn {
        let data = self.0.data.read();
        Lsn::from_le_bytes(
            data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()]
                .try_into()
                .unwrap(),
        )
    }

    /// Stores `lsn` inside the page data.
    pub fn set_lsn(&self, lsn: Lsn) {
        let mut data = self.0.data.write();
        data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()]
            .copy_from_slice(&lsn.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_and_dirty_bookkeeping() {
        let page = Page::new();
        assert_eq!(None, page.get_page_id());
        assert_eq!(0, page.get_pin_count());
        assert!(!page.is_dirty());

        page.set_page_id(3);
        page.pin();
        page.pin();
        page.set_dirty(true);
        assert_eq!(Some(3), page.get_page_id());
        assert_eq!(2, page.get_pin_count());

        page.reset();
        assert_eq!(None, page.get_page_id());
        assert_eq!(0, page.get_pin_count());
        assert!(!page.is_dirty());
        assert!(page.get_data().iter().all(|b| *b == 0));
    }

    #[test]
    fn lsn_round_trip() {
        let page = Page::new();
        page.set_lsn(99);
        assert_eq!(99, page.get_lsn());
    }
}
