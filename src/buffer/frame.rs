//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the metadata buffer management needs:
//! which page is loaded, a pin count, and a dirty flag.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// The pool allocates a fixed number of frames at startup; each holds one
/// page at a time and is reassigned to different page ids over its
/// lifetime.
///
/// # Thread Safety
/// All fields use interior mutability:
/// - `page`: `RwLock`; this lock doubles as the page latch higher layers
///   take around reads and writes of the page contents
/// - `page_id`: `Mutex`
/// - `pin_count` / `is_dirty`: atomics
///
/// Holding the pool's mutex is never required to latch a page.
pub struct Frame {
    /// Position of this frame in the pool's frame array.
    frame_id: FrameId,

    /// The page data, protected by the page latch.
    page: RwLock<Page>,

    /// Which page is currently loaded; `PageId::INVALID` when empty.
    page_id: Mutex<PageId>,

    /// Number of active references to this frame.
    pin_count: AtomicU32,

    /// Whether the page has been modified since it was loaded.
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page: RwLock::new(Page::new()),
            page_id: Mutex::new(PageId::INVALID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// The frame's slot index.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Acquire the read latch on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire the write latch on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Id of the loaded page, or `PageId::INVALID` for an empty frame.
    #[inline]
    pub fn page_id(&self) -> PageId {
        *self.page_id.lock()
    }

    /// Set the loaded page id.
    #[inline]
    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.lock() = page_id;
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Set the pin count directly. Used when a frame is (re)initialized.
    #[inline]
    pub(crate) fn set_pin_count(&self, count: u32) {
        self.pin_count.store(count, Ordering::Relaxed);
    }

    /// Mark the frame as dirty (modified).
    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    /// Clear the dirty flag.
    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Check if the frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.page_id().is_valid()
    }

    /// Reset the frame to the empty state, zeroing the page.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.set_page_id(PageId::INVALID);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}
