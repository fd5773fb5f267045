use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::clock_replacer::ClockReplacer;
use crate::common::config::{FrameId, PageId};
use crate::storage::disk::{DiskManager, DiskRequest, DiskScheduler};
use crate::storage::page::Page;

/// Caches disk pages in a fixed set of in-memory frames and tracks which
/// frame holds which page.
///
/// All bookkeeping (page table, free list, replacer) sits behind one latch
/// that every public operation holds for its whole duration; concurrency on
/// page contents comes from the per-frame latches of the pages themselves.
pub struct BufferPoolManager {
    /// How many frames the pool owns.
    pool_size: usize,
    /// The frames; created once, their contents rotate.
    pages: Vec<Page>,
    /// Source of fresh page ids.
    disk_manager: Arc<DiskManager>,
    /// Carries out page reads and writes.
    disk_scheduler: DiskScheduler,
    /// Bookkeeping guarded by a single latch.
    latch: Mutex<PoolState>,
}

struct PoolState {
    /// Which frame each resident page occupies.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page at all.
    free_list: VecDeque<FrameId>,
    /// Picks eviction victims among unpinned resident frames.
    replacer: ClockReplacer,
}

impl BufferPoolManager {
    /// @brief Creates a pool of `pool_size` frames, all initially free,
    /// backed by the given disk manager.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> BufferPoolManager {
        Self {
            pool_size,
            pages: (0..pool_size).map(|_| Page::new()).collect(),
            disk_scheduler: DiskScheduler::new(disk_manager.clone()),
            disk_manager,
            latch: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
                replacer: ClockReplacer::new(pool_size),
            }),
        }
    }

    /// @brief Number of frames the pool owns.
    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    /// @brief Pins the page with the given id, faulting it in from disk
    /// when it is not resident. None when every frame is pinned and nothing
    /// can be evicted.
    ///
    /// A resident page is handed out as-is with its pin count bumped. A
    /// miss claims a frame (free list before replacer victim), writes the
    /// old occupant back if dirty, and reads the requested page into it.
    ///
    /// Every successful call owes the pool exactly one unpin_page.
    pub fn fetch_page(&self, page_id: PageId) -> Option<Page> {
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.pages[frame_id];
            state.replacer.pin(frame_id);
            page.pin();
            return Some(page.clone());
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();

        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Read {
            page: page.clone(),
            callback: tx,
        });
        rx.blocking_recv().unwrap();
        state.page_table.insert(page_id, frame_id);

        Some(page.clone())
    }

    /// @brief Allocates a brand-new page and pins it into a frame, or None
    /// when every frame is pinned.
    ///
    /// Claims a frame the same way fetch_page does, asks the disk manager
    /// for a fresh page id, and zeroes the frame instead of reading
    /// anything. The frame starts out dirty so the new contents reach disk
    /// eventually; the caller reads the id off the returned page and owes
    /// one unpin_page.
    pub fn new_page(&self) -> Option<Page> {
        let mut state = self.latch.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.disk_manager.allocate_page();
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        page.set_dirty(true);
        state.page_table.insert(page_id, frame_id);

        Some(page.clone())
    }

    /// @brief Drops one pin from the page. False when the page is not
    /// resident or has no pins left to drop.
    ///
    /// The dirty flag is or-ed in, never cleared here; a page whose last
    /// pin goes away becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() <= 0 {
            return false;
        }
        page.set_dirty(page.is_dirty() || is_dirty);
        page.unpin();
        if page.get_pin_count() == 0 {
            state.replacer.unpin(frame_id);
        }
        true
    }

    /// @brief Writes the page back to disk if it is dirty and clears the
    /// flag; pin counts are not touched. False when the page is not
    /// resident.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        self.flush_frame(&self.pages[frame_id]);
        true
    }

    /// @brief Writes back every resident dirty page.
    pub fn flush_all_pages(&self) {
        let state = self.latch.lock();
        for &frame_id in state.page_table.values() {
            self.flush_frame(&self.pages[frame_id]);
        }
    }

    /// @brief Evicts and deallocates the page. A page that is not resident
    /// is simply deallocated on disk (true); a pinned page cannot be
    /// deleted (false).
    ///
    /// On success the frame is reset, dropped from the page table and the
    /// replacer, and pushed back onto the free list.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            self.disk_manager.deallocate_page(page_id);
            return true;
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() > 0 {
            return false;
        }
        state.replacer.pin(frame_id);
        state.page_table.remove(&page_id);
        page.reset();
        state.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);
        true
    }

    /// Picks a frame to hold a new occupant: the free list first, then a
    /// replacer victim. A victim's old page is written back if dirty and
    /// unmapped before the frame is handed out.
    fn acquire_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        let frame_id = state.replacer.victim()?;
        let page = &self.pages[frame_id];
        let old_page_id = page.get_page_id().unwrap();
        debug!("evicting page {} from frame {}", old_page_id, frame_id);
        if page.is_dirty() {
            self.flush_frame(page);
        }
        state.page_table.remove(&old_page_id);
        Some(frame_id)
    }

    /// Writes the frame's bytes back to disk if dirty and clears the flag.
    fn flush_frame(&self, page: &Page) {
        if !page.is_dirty() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Write {
            page: page.clone(),
            callback: tx,
        });
        rx.blocking_recv().unwrap();
        page.set_dirty(false);
    }
}
