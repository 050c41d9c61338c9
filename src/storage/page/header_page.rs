//! Header page - the index catalog.
//!
//! The page at [`HEADER_PAGE_ID`](crate::common::config::HEADER_PAGE_ID)
//! stores one record per index: the index name and its current root page
//! id. A B+ tree inserts its record when it is first created and updates
//! it on every root change, so the root survives a restart.

use crate::common::PageId;
use crate::storage::page::{Page, PageHeader, PageType};

/// Accessors for the index-catalog records on the header page.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       13    PageHeader (page_type = Header)
/// 13      4     record count
/// 17      36*N  records: 32-byte name (zero padded) + 4-byte root page id
/// ```
pub struct HeaderPage;

impl HeaderPage {
    /// Maximum length of an index name, in bytes.
    pub const MAX_NAME_LEN: usize = 32;
    /// Bytes per record.
    pub const RECORD_SIZE: usize = Self::MAX_NAME_LEN + 4;

    const OFFSET_COUNT: usize = PageHeader::SIZE;
    const OFFSET_RECORDS: usize = Self::OFFSET_COUNT + 4;

    /// Most records a header page can hold.
    pub const MAX_RECORDS: usize =
        (crate::common::config::PAGE_SIZE - Self::OFFSET_RECORDS) / Self::RECORD_SIZE;

    /// Initialize a fresh header page with zero records.
    pub fn init(page: &mut Page) {
        page.reset();
        page.set_header(&PageHeader::new(PageType::Header));
        Self::set_count(page, 0);
    }

    /// Whether the page carries the header tag.
    pub fn is_header(page: &Page) -> bool {
        page.header().page_type == PageType::Header
    }

    /// Insert a `(name, root)` record. Returns false if the name already
    /// has a record, is too long, or the page is full.
    pub fn insert_record(page: &mut Page, name: &str, root: PageId) -> bool {
        if name.len() > Self::MAX_NAME_LEN || name.is_empty() {
            return false;
        }
        if Self::find_slot(page, name).is_some() {
            return false;
        }
        let count = Self::count(page);
        if count >= Self::MAX_RECORDS {
            return false;
        }

        Self::write_record(page, count, name, root);
        Self::set_count(page, count + 1);
        true
    }

    /// Update the root page id of an existing record. Returns false if no
    /// record carries `name`.
    pub fn update_record(page: &mut Page, name: &str, root: PageId) -> bool {
        match Self::find_slot(page, name) {
            Some(slot) => {
                let off = Self::record_offset(slot) + Self::MAX_NAME_LEN;
                page.as_mut_slice()[off..off + 4].copy_from_slice(&root.0.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Remove a record. Returns false if no record carries `name`.
    pub fn delete_record(page: &mut Page, name: &str) -> bool {
        let slot = match Self::find_slot(page, name) {
            Some(slot) => slot,
            None => return false,
        };
        let count = Self::count(page);

        // Shift the records after `slot` down one position.
        for i in slot + 1..count {
            let src = Self::record_offset(i);
            let dst = Self::record_offset(i - 1);
            let record: [u8; Self::RECORD_SIZE] =
                page.as_slice()[src..src + Self::RECORD_SIZE].try_into().unwrap();
            page.as_mut_slice()[dst..dst + Self::RECORD_SIZE].copy_from_slice(&record);
        }
        Self::set_count(page, count - 1);
        true
    }

    /// Look up the root page id recorded for `name`.
    pub fn get_root_id(page: &Page, name: &str) -> Option<PageId> {
        let slot = Self::find_slot(page, name)?;
        let off = Self::record_offset(slot) + Self::MAX_NAME_LEN;
        Some(PageId(u32::from_le_bytes(page.as_slice()[off..off + 4].try_into().unwrap())))
    }

    /// Number of records on the page.
    pub fn count(page: &Page) -> usize {
        u32::from_le_bytes(
            page.as_slice()[Self::OFFSET_COUNT..Self::OFFSET_COUNT + 4].try_into().unwrap(),
        ) as usize
    }

    fn set_count(page: &mut Page, count: usize) {
        page.as_mut_slice()[Self::OFFSET_COUNT..Self::OFFSET_COUNT + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn record_offset(slot: usize) -> usize {
        Self::OFFSET_RECORDS + slot * Self::RECORD_SIZE
    }

    fn find_slot(page: &Page, name: &str) -> Option<usize> {
        let count = Self::count(page);
        (0..count).find(|&slot| {
            let off = Self::record_offset(slot);
            let stored = &page.as_slice()[off..off + Self::MAX_NAME_LEN];
            let end = stored.iter().position(|&b| b == 0).unwrap_or(Self::MAX_NAME_LEN);
            &stored[..end] == name.as_bytes()
        })
    }

    fn write_record(page: &mut Page, slot: usize, name: &str, root: PageId) {
        let off = Self::record_offset(slot);
        let data = page.as_mut_slice();
        data[off..off + Self::MAX_NAME_LEN].fill(0);
        data[off..off + name.len()].copy_from_slice(name.as_bytes());
        data[off + Self::MAX_NAME_LEN..off + Self::RECORD_SIZE]
            .copy_from_slice(&root.0.to_le_bytes());
    }
}
