//! Row identifier type.

use std::fmt;

use crate::common::PageId;

/// Identifies a row: the page it lives on plus its slot within that page.
///
/// Rids are the values a B+ tree leaf stores. On disk a rid occupies eight
/// bytes: the page id followed by the slot number, both little-endian.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    page_id: u32,
    slot: u32,
}

impl Rid {
    /// Size of a rid when stored inside a page.
    pub const ENCODED_SIZE: usize = 8;

    /// Create a rid from a page id and a slot number.
    #[inline]
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Rid { page_id: page_id.0, slot }
    }

    /// The page this row lives on.
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(self.page_id)
    }

    /// The slot within the page.
    #[inline]
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Write this rid to the beginning of a byte slice.
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Read a rid from the beginning of a byte slice.
    pub fn decode_from(buf: &[u8]) -> Self {
        let page_id = u32::from_le_bytes(buf[..4].try_into().unwrap());
        let slot = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        Rid { page_id, slot }
    }
}

/// Packs the high 32 bits into the page id and the low 32 bits into the
/// slot. The file-ingest helpers use this to build a rid from each key.
impl From<i64> for Rid {
    fn from(v: i64) -> Self {
        Rid { page_id: (v >> 32) as u32, slot: v as u32 }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid({}, {})", self.page_id, self.slot)
    }
}
