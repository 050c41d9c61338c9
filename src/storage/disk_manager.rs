//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations: reading and
//! writing fixed-size pages at `page_id * PAGE_SIZE` offsets within a
//! single database file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// Pages are laid out sequentially; page `N` lives at file offset
/// `N * PAGE_SIZE`:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// Page ids are handed out by the buffer pool, not the disk manager; a
/// write past the current end of file extends it. Reads past the end fail
/// with [`Error::PageNotFound`].
///
/// # Thread Safety
/// `DiskManager` is single-threaded. The buffer pool serializes access to
/// it behind a mutex.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of pages currently in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;

        Ok(Self { file, page_count: 0 })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Open an existing database file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page from disk into a fresh [`Page`].
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page is past the end of the
    /// file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk, extending the file if the page lies past its
    /// current end. Skipped-over pages read back as zeros.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        if page_id.0 >= self.page_count {
            self.page_count = page_id.0 + 1;
        }

        Ok(())
    }

    /// Release a page id.
    ///
    /// Ids are never reused and the file is not shrunk; this is a
    /// bookkeeping hook so callers can record the deallocation.
    pub fn deallocate_page(&mut self, page_id: PageId) {
        log::trace!("deallocate {}", page_id);
    }

    /// Get the number of pages in the database.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
