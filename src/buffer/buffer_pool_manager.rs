//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] moves pages between disk and a fixed array of
//! in-memory frames, tracking them with:
//! - an extendible hash table mapping `PageId -> FrameId`
//! - a free list of unused frames
//! - an LRU-K replacer choosing eviction victims

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::buffer::replacer::LruKReplacer;
use crate::buffer::{BufferPoolStats, Frame};
use crate::common::config::PAGE_TABLE_BUCKET_SIZE;
use crate::common::{Error, FrameId, PageId, Result};
use crate::container::ExtendibleHashTable;
use crate::storage::DiskManager;

/// Pool state guarded by the pool-wide mutex: the free list and the page
/// id allocator.
struct PoolState {
    free_list: VecDeque<FrameId>,
    next_page_id: u32,
}

/// Manages a fixed pool of frames caching disk pages.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                       │
/// │  ┌───────────────┐   ┌──────────────────────────────────┐  │
/// │  │  page_table   │   │        frames: Vec<Frame>        │  │
/// │  │ PageId → Fid  │──▶│  [Frame0] [Frame1] [Frame2] ...  │  │
/// │  └───────────────┘   └──────────────────────────────────┘  │
/// │  ┌───────────────┐   ┌───────────────┐  ┌──────────────┐   │
/// │  │   free_list   │   │   replacer    │  │ disk_manager │   │
/// │  │   (+ id gen)  │   │ LruKReplacer  │  │    Mutex     │   │
/// │  └───────────────┘   └───────────────┘  └──────────────┘   │
/// └────────────────────────────────────────────────────────────┘
/// ```
///
/// # Concurrency
/// A single pool-wide mutex serializes every public operation; the
/// replacer and the page table additionally carry their own locks. Page
/// *contents* are not covered by the pool mutex: callers latch a page
/// through [`Frame::page`] / [`Frame::page_mut`] and must never hold the
/// pool mutex while waiting on a latch.
///
/// # Pinning
/// `new_page` and `fetch_page` return a frame pinned once; the caller owns
/// that pin and releases it with [`BufferPoolManager::unpin_page`]. A frame
/// with a non-zero pin count is never evicted.
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page ids to frame ids.
    page_table: ExtendibleHashTable<PageId, FrameId>,

    /// Free list and the monotonically increasing page id allocator.
    state: Mutex<PoolState>,

    /// Eviction policy.
    replacer: Mutex<LruKReplacer>,

    /// Handles all disk I/O.
    disk_manager: Mutex<DiskManager>,

    /// Performance counters.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// Page id allocation resumes after the last page already present in
    /// the database file.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager, replacer_k: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|i| Frame::new(FrameId::new(i))).collect();
        let free_list: VecDeque<FrameId> = (0..pool_size).map(FrameId::new).collect();
        let next_page_id = disk_manager.page_count();

        Self {
            frames,
            page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
            state: Mutex::new(PoolState { free_list, next_page_id }),
            replacer: Mutex::new(LruKReplacer::new(pool_size, replacer_k)),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: create and fetch pages
    // ========================================================================

    /// Allocate a new page and pin it in a frame.
    ///
    /// The page id is the next unused id; the page memory is zeroed and the
    /// frame starts clean with pin count 1.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - I/O errors from writing back an evicted page
    pub fn new_page(&self) -> Result<&Frame> {
        let mut state = self.state.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.set_page_id(page_id);
        frame.set_pin_count(1);
        frame.clear_dirty();

        self.page_table.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame)
    }

    /// Fetch a page, pinning it in a frame.
    ///
    /// A page already in the pool gains a pin; otherwise a frame is
    /// acquired (possibly by eviction) and the page is read from disk.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the invalid sentinel
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if every frame is pinned
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.state.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = &self.frames[frame_id.0];
            frame.pin();
            {
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, false);
            }
            self.stats.cache_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(frame);
        }

        self.stats.cache_misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let frame_id = self.acquire_frame(&mut state)?;
        let page = match self.disk_manager.lock().read_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                // The acquired frame is empty; hand it back.
                state.free_list.push_front(frame_id);
                return Err(e);
            }
        };
        self.stats.pages_read.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().as_mut_slice().copy_from_slice(page.as_slice());
        frame.set_page_id(page_id);
        frame.set_pin_count(1);
        frame.clear_dirty();

        self.page_table.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame)
    }

    // ========================================================================
    // Public API: unpin, flush, delete
    // ========================================================================

    /// Release one pin on a page, OR-ing `is_dirty` into its dirty flag.
    ///
    /// Returns false if the page is not in the pool or already unpinned.
    /// When the pin count reaches zero the frame becomes evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _state = self.state.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.frames[frame_id.0];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.mark_dirty();
        }
        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Write a page to disk, dirty or not, and clear its dirty flag.
    ///
    /// Returns `Ok(false)` when the page is not in the pool.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let _state = self.state.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };

        self.flush_frame(&self.frames[frame_id.0], page_id)?;
        Ok(true)
    }

    /// Write every page currently mapped by the page table back to disk,
    /// clearing dirty flags.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _state = self.state.lock();

        for frame in &self.frames {
            let page_id = frame.page_id();
            if page_id.is_valid() && self.page_table.find(&page_id).is_some() {
                self.flush_frame(frame, page_id)?;
            }
        }
        Ok(())
    }

    /// Drop a page from the pool and deallocate its id.
    ///
    /// The id is deallocated in the disk manager even when the page is not
    /// resident, and the call still reports success; delete is idempotent.
    /// A pinned page is left untouched and the call returns `Ok(false)`.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();

        self.disk_manager.lock().deallocate_page(page_id);

        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.flush_frame(frame, page_id)?;
        }

        self.replacer.lock().remove(frame_id);
        frame.reset();
        self.page_table.remove(&page_id);
        state.free_list.push_back(frame_id);

        log::debug!("deleted {} from {}", page_id, frame_id);
        Ok(true)
    }

    // ========================================================================
    // Public API: introspection
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Current pin count of a resident page, `None` if the page is not in
    /// the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let _state = self.state.lock();
        self.page_table.find(&page_id).map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Internal: frame acquisition and write-back
    // ========================================================================

    /// Get a usable frame: the head of the free list, or an evicted one.
    ///
    /// An evicted frame's page is written back when dirty and unmapped from
    /// the page table.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            self.flush_frame(frame, old_page_id)?;
        }
        self.page_table.remove(&old_page_id);
        self.stats.evictions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        log::debug!("evicted {} from {}", old_page_id, frame_id);
        Ok(frame_id)
    }

    /// Write a frame's page to disk and clear the frame's dirty flag.
    fn flush_frame(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let page = frame.page();
        self.disk_manager.lock().write_page(page_id, &page)?;
        drop(page);

        frame.clear_dirty();
        self.stats.pages_written.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}
