//! Disk-resident B+ tree index.
//!
//! Every node is a buffer-pool page; traversal works strictly through
//! page ids, fetching and unpinning as it descends. Nodes store their
//! parent as a page id, never as a reference, so there are no pointer
//! cycles to manage; the price is a re-fetch wherever the parent is
//! needed.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::{BufferPoolManager, Frame};
use crate::common::config::HEADER_PAGE_ID;
use crate::common::{Error, PageId, Result, Rid};
use crate::concurrency::Transaction;
use crate::index::key::{IndexKey, KeyComparator};
use crate::index::IndexIterator;
use crate::storage::page::b_plus_tree_page::{
    node_page_type, node_parent_page_id, node_size, set_node_parent_page_id,
};
use crate::storage::page::{
    BPlusTreeInternalPage, BPlusTreeLeafPage, HeaderPage, PageType,
};

/// A B+ tree keyed by `K`, ordered by `C`, storing [`Rid`] values.
///
/// # Size bounds
/// - a leaf holds at most `leaf_max_size - 1` entries; reaching
///   `leaf_max_size` after an insert triggers a split
/// - an internal node holds at most `internal_max_size` children
/// - a non-root node underflows below half its capacity (rounded up) and
///   is repaired by redistribution or coalescing
///
/// # Persistence
/// The root page id is recorded on the header page under `index_name`;
/// constructing a tree with a name the header already knows reopens that
/// index.
pub struct BPlusTree<'a, K, C> {
    index_name: String,
    root_page_id: Mutex<PageId>,
    bpm: &'a BufferPoolManager,
    comparator: C,
    leaf_max_size: u32,
    internal_max_size: u32,
    _key: PhantomData<K>,
}

impl<'a, K, C> BPlusTree<'a, K, C>
where
    K: IndexKey,
    C: KeyComparator<K>,
{
    /// Create or reopen the index named `name`.
    ///
    /// On a brand-new database file this allocates the header page; if the
    /// header already has a record for `name`, the recorded root is
    /// adopted.
    pub fn new(
        name: impl Into<String>,
        bpm: &'a BufferPoolManager,
        comparator: C,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        let index_name = name.into();
        if index_name.is_empty() || index_name.len() > HeaderPage::MAX_NAME_LEN {
            return Err(Error::Corrupted(format!("bad index name: {:?}", index_name)));
        }
        assert!(leaf_max_size >= 2, "leaf_max_size must be at least 2");
        assert!(internal_max_size >= 3, "internal_max_size must be at least 3");

        let frame = match bpm.fetch_page(HEADER_PAGE_ID) {
            Ok(frame) => frame,
            Err(Error::PageNotFound(_)) => {
                // Fresh file: the very first allocation is the header page.
                let frame = bpm.new_page()?;
                if frame.page_id() != HEADER_PAGE_ID {
                    let page_id = frame.page_id();
                    bpm.unpin_page(page_id, false);
                    return Err(Error::Corrupted(format!(
                        "header page allocated as {}, expected {}",
                        page_id, HEADER_PAGE_ID
                    )));
                }
                HeaderPage::init(&mut frame.page_mut());
                frame
            }
            Err(e) => return Err(e),
        };

        let root_page_id = {
            let mut page = frame.page_mut();
            if !HeaderPage::is_header(&page) {
                drop(page);
                bpm.unpin_page(HEADER_PAGE_ID, false);
                return Err(Error::Corrupted("page 0 is not a header page".to_string()));
            }
            match HeaderPage::get_root_id(&page, &index_name) {
                Some(root) => root,
                None => {
                    if !HeaderPage::insert_record(&mut page, &index_name, PageId::INVALID) {
                        drop(page);
                        bpm.unpin_page(HEADER_PAGE_ID, false);
                        return Err(Error::Corrupted(format!(
                            "header page cannot record index {:?}",
                            index_name
                        )));
                    }
                    PageId::INVALID
                }
            }
        };
        bpm.unpin_page(HEADER_PAGE_ID, true);

        Ok(Self {
            index_name,
            root_page_id: Mutex::new(root_page_id),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            _key: PhantomData,
        })
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        !self.root_page_id().is_valid()
    }

    /// Current root page id; invalid when the tree is empty.
    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Point lookup: the values bound to `key` (empty when absent).
    pub fn get_value(&self, key: &K, _transaction: Option<&Transaction>) -> Result<Vec<Rid>> {
        if self.is_empty() {
            return Ok(vec![]);
        }

        let frame = self.find_leaf_frame(key)?;
        let result = {
            let page = frame.page();
            let leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());
            let index = leaf.key_index(key, &self.comparator);
            if index < leaf.size()
                && self.comparator.compare(&leaf.key_at(index), key) == Ordering::Equal
            {
                vec![leaf.value_at(index)]
            } else {
                vec![]
            }
        };
        self.bpm.unpin_page(frame.page_id(), false);
        Ok(result)
    }

    /// Descend from the root to the leaf covering `key`.
    ///
    /// The returned frame is pinned; every internal node visited on the way
    /// is unpinned clean. The tree must not be empty.
    fn find_leaf_frame(&self, key: &K) -> Result<&'a Frame> {
        let mut page_id = self.root_page_id();
        if !page_id.is_valid() {
            return Err(Error::Corrupted("descending into an empty tree".to_string()));
        }

        let mut frame = self.bpm.fetch_page(page_id)?;
        loop {
            let child_id = {
                let page = frame.page();
                match node_page_type(page.as_slice()) {
                    PageType::BTreeLeaf => return Ok(frame),
                    PageType::BTreeInternal => {
                        let node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
                        node.lookup(key, &self.comparator)
                    }
                    other => {
                        drop(page);
                        self.bpm.unpin_page(page_id, false);
                        return Err(Error::Corrupted(format!(
                            "{} is not a tree node (tag {:?})",
                            page_id, other
                        )));
                    }
                }
            };

            let child = match self.bpm.fetch_page(child_id) {
                Ok(child) => child,
                Err(e) => {
                    self.bpm.unpin_page(page_id, false);
                    return Err(e);
                }
            };
            self.bpm.unpin_page(page_id, false);
            frame = child;
            page_id = child_id;
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `key -> rid`. Returns false on a duplicate key.
    pub fn insert(&self, key: K, rid: Rid, _transaction: Option<&Transaction>) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree()?;
        }

        let frame = self.find_leaf_frame(&key)?;
        let leaf_page_id = frame.page_id();

        let needs_split = {
            let mut page = frame.page_mut();
            let mut leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());
            if !leaf.insert(key, rid, &self.comparator) {
                drop(page);
                self.bpm.unpin_page(leaf_page_id, false);
                return Ok(false);
            }
            leaf.write_to(page.as_mut_slice());
            leaf.size() == self.leaf_max_size as usize
        };

        if needs_split {
            self.split_leaf(frame)?;
        }
        self.bpm.unpin_page(leaf_page_id, true);
        Ok(true)
    }

    /// Create an empty leaf root and persist it as the new root.
    fn start_new_tree(&self) -> Result<()> {
        let frame = self.bpm.new_page()?;
        let page_id = frame.page_id();
        {
            let mut page = frame.page_mut();
            let leaf = BPlusTreeLeafPage::<K>::new(self.leaf_max_size);
            leaf.write_to(page.as_mut_slice());
        }
        self.set_root_page_id(page_id)?;
        self.bpm.unpin_page(page_id, true);

        log::debug!("index {}: created root {}", self.index_name, page_id);
        Ok(())
    }

    /// Split a full leaf: the upper half moves to a fresh right sibling,
    /// the leaf chain is relinked, and the sibling's first key goes to the
    /// parent.
    fn split_leaf(&self, frame: &'a Frame) -> Result<()> {
        let bother = self.bpm.new_page()?;
        let bother_id = bother.page_id();

        let separator = {
            let mut page = frame.page_mut();
            let mut leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());

            let mid = leaf.size() / 2;
            let moved = leaf.split_off(mid);

            let mut sibling = BPlusTreeLeafPage::<K>::new(self.leaf_max_size);
            sibling.set_parent_page_id(leaf.parent_page_id());
            sibling.set_next_page_id(leaf.next_page_id());
            sibling.extend(moved);
            leaf.set_next_page_id(bother_id);

            let separator = sibling.key_at(0);
            leaf.write_to(page.as_mut_slice());
            sibling.write_to(bother.page_mut().as_mut_slice());
            separator
        };

        self.insert_in_parent(frame, separator, bother)?;
        self.bpm.unpin_page(bother_id, true);
        Ok(())
    }

    /// Hook `right` (with separator `key`) into `left`'s parent, splitting
    /// upward as needed.
    ///
    /// Neither `left` nor `right` is unpinned here; the caller keeps their
    /// pins. Pages fetched or created in this frame of the recursion are
    /// released before returning.
    fn insert_in_parent(&self, left: &'a Frame, key: K, right: &'a Frame) -> Result<()> {
        let left_id = left.page_id();
        let right_id = right.page_id();

        // The old root split: grow the tree by one level.
        if left_id == self.root_page_id() {
            let root_frame = self.bpm.new_page()?;
            let root_id = root_frame.page_id();
            {
                let mut page = root_frame.page_mut();
                let mut root = BPlusTreeInternalPage::<K>::new(self.internal_max_size);
                root.push_entry(K::default(), left_id);
                root.push_entry(key, right_id);
                root.write_to(page.as_mut_slice());
            }
            set_node_parent_page_id(left.page_mut().as_mut_slice(), root_id);
            set_node_parent_page_id(right.page_mut().as_mut_slice(), root_id);

            self.set_root_page_id(root_id)?;
            self.bpm.unpin_page(root_id, true);

            log::debug!("index {}: root split, new root {}", self.index_name, root_id);
            return Ok(());
        }

        let parent_id = node_parent_page_id(left.page().as_slice());
        let parent = self.bpm.fetch_page(parent_id)?;

        // Room in the parent: a plain insert.
        {
            let mut page = parent.page_mut();
            let mut node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
            if node.size() < self.internal_max_size as usize {
                node.insert(key, right_id, &self.comparator);
                node.write_to(page.as_mut_slice());
                drop(page);

                set_node_parent_page_id(right.page_mut().as_mut_slice(), parent_id);
                self.bpm.unpin_page(parent_id, true);
                return Ok(());
            }
        }

        // Full parent: build the would-be entry sequence, split it at
        // ceil((max + 1) / 2), and push the sibling's first key upward.
        set_node_parent_page_id(right.page_mut().as_mut_slice(), parent_id);

        let bother = self.bpm.new_page()?;
        let bother_id = bother.page_id();

        let (separator, moved_children) = {
            let mut page = parent.page_mut();
            let mut node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
            node.insert(key, right_id, &self.comparator);

            let split_at = (self.internal_max_size as usize + 2) / 2;
            let moved = node.split_off(split_at);

            let mut sibling = BPlusTreeInternalPage::<K>::new(self.internal_max_size);
            sibling.set_parent_page_id(node.parent_page_id());
            sibling.extend(moved);

            let separator = sibling.key_at(0);
            let moved_children: Vec<PageId> =
                sibling.entries().iter().map(|&(_, child)| child).collect();

            node.write_to(page.as_mut_slice());
            sibling.write_to(bother.page_mut().as_mut_slice());
            (separator, moved_children)
        };

        // Children that moved to the sibling get a new parent.
        for child_id in moved_children {
            let child = self.bpm.fetch_page(child_id)?;
            set_node_parent_page_id(child.page_mut().as_mut_slice(), bother_id);
            self.bpm.unpin_page(child_id, true);
        }

        self.insert_in_parent(parent, separator, bother)?;
        self.bpm.unpin_page(bother_id, true);
        self.bpm.unpin_page(parent_id, true);
        Ok(())
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Remove `key`. Removing an absent key is a silent no-op.
    pub fn remove(&self, key: &K, _transaction: Option<&Transaction>) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let frame = self.find_leaf_frame(key)?;
        self.delete_entry(frame, key)
    }

    /// Delete `key` from the node in `frame`, then restore the size
    /// invariants by adjusting the root, redistributing, or coalescing.
    ///
    /// Consumes the caller's pin on `frame`.
    fn delete_entry(&self, frame: &'a Frame, key: &K) -> Result<()> {
        let page_id = frame.page_id();

        let (node_type, size) = {
            let mut page = frame.page_mut();
            let node_type = node_page_type(page.as_slice());
            let (deleted, size) = match node_type {
                PageType::BTreeLeaf => {
                    let mut leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());
                    let deleted = leaf.delete(key, &self.comparator);
                    if deleted {
                        leaf.write_to(page.as_mut_slice());
                    }
                    (deleted, leaf.size())
                }
                PageType::BTreeInternal => {
                    let mut node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
                    let deleted = node.delete(key, &self.comparator);
                    if deleted {
                        node.write_to(page.as_mut_slice());
                    }
                    (deleted, node.size())
                }
                other => {
                    drop(page);
                    self.bpm.unpin_page(page_id, false);
                    return Err(Error::Corrupted(format!(
                        "{} is not a tree node (tag {:?})",
                        page_id, other
                    )));
                }
            };
            if !deleted {
                drop(page);
                self.bpm.unpin_page(page_id, false);
                return Ok(());
            }
            (node_type, size)
        };

        if page_id == self.root_page_id() {
            return self.adjust_root(frame);
        }

        let min_size = match node_type {
            PageType::BTreeLeaf => self.leaf_max_size as usize / 2,
            _ => (self.internal_max_size as usize + 1) / 2,
        };
        if size >= min_size {
            self.bpm.unpin_page(page_id, true);
            return Ok(());
        }

        // Underflow: borrow from or merge with a sibling.
        let parent_id = node_parent_page_id(frame.page().as_slice());
        let parent = self.bpm.fetch_page(parent_id)?;
        let (bother, parent_key, is_pre) = self.fetch_sibling(parent, page_id)?;
        let bother_size = node_size(bother.page().as_slice()) as usize;

        let effective_max = match node_type {
            PageType::BTreeLeaf => self.leaf_max_size as usize - 1,
            _ => self.internal_max_size as usize,
        };

        if size + bother_size <= effective_max {
            // Merge into whichever of the two is on the left.
            let (left, right) = if is_pre { (bother, frame) } else { (frame, bother) };
            self.coalesce(left, right, parent_key, node_type)?;
            self.delete_entry(parent, &parent_key)?;
        } else {
            self.redistribute(frame, bother, parent, parent_key, is_pre, node_type)?;
        }
        Ok(())
    }

    /// Shrink or clear the root after a delete.
    ///
    /// A leaf root left empty makes the tree empty; an internal root left
    /// with a single child hands the root role to that child. Consumes the
    /// caller's pin.
    fn adjust_root(&self, frame: &'a Frame) -> Result<()> {
        let page_id = frame.page_id();

        let (node_type, size, sole_child) = {
            let page = frame.page();
            let node_type = node_page_type(page.as_slice());
            let size = node_size(page.as_slice()) as usize;
            let sole_child = if node_type == PageType::BTreeInternal && size == 1 {
                let node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
                Some(node.value_at(0))
            } else {
                None
            };
            (node_type, size, sole_child)
        };

        if node_type == PageType::BTreeLeaf && size == 0 {
            self.set_root_page_id(PageId::INVALID)?;
            self.bpm.unpin_page(page_id, true);
            self.bpm.delete_page(page_id)?;
            log::debug!("index {}: tree is now empty", self.index_name);
            return Ok(());
        }

        if let Some(child) = sole_child {
            self.set_root_page_id(child)?;
            self.bpm.unpin_page(page_id, true);
            self.bpm.delete_page(page_id)?;
            log::debug!("index {}: root demoted, new root {}", self.index_name, child);
            return Ok(());
        }

        self.bpm.unpin_page(page_id, true);
        Ok(())
    }

    /// Locate a sibling of `child_id` through its parent: the left
    /// neighbor when one exists, otherwise the right. Returns the pinned
    /// sibling, the separator key between the two, and whether the sibling
    /// precedes the child.
    fn fetch_sibling(
        &self,
        parent: &'a Frame,
        child_id: PageId,
    ) -> Result<(&'a Frame, K, bool)> {
        let (bother_id, separator, is_pre) = {
            let page = parent.page();
            let node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());

            let position = (0..node.size()).find(|&i| node.value_at(i) == child_id);
            let i = position.ok_or_else(|| {
                Error::Corrupted(format!("{} missing from its parent", child_id))
            })?;

            if i >= 1 {
                (node.value_at(i - 1), node.key_at(i), true)
            } else {
                (node.value_at(1), node.key_at(1), false)
            }
        };

        let bother = self.bpm.fetch_page(bother_id)?;
        Ok((bother, separator, is_pre))
    }

    /// Merge `right` into `left` (separated by `parent_key` in their
    /// parent) and delete `right`'s page. Consumes both pins.
    fn coalesce(
        &self,
        left: &'a Frame,
        right: &'a Frame,
        parent_key: K,
        node_type: PageType,
    ) -> Result<()> {
        let left_id = left.page_id();
        let right_id = right.page_id();

        let moved_children: Vec<PageId> = {
            let mut left_page = left.page_mut();
            let mut right_page = right.page_mut();

            match node_type {
                PageType::BTreeLeaf => {
                    let mut l = BPlusTreeLeafPage::<K>::from_bytes(left_page.as_slice());
                    let mut r = BPlusTreeLeafPage::<K>::from_bytes(right_page.as_slice());

                    let moved = r.split_off(0);
                    l.extend(moved);
                    l.set_next_page_id(r.next_page_id());

                    l.write_to(left_page.as_mut_slice());
                    r.write_to(right_page.as_mut_slice());
                    vec![]
                }
                _ => {
                    let mut l = BPlusTreeInternalPage::<K>::from_bytes(left_page.as_slice());
                    let mut r = BPlusTreeInternalPage::<K>::from_bytes(right_page.as_slice());

                    let moved = r.split_off(0);
                    let children = moved.iter().map(|&(_, child)| child).collect();

                    // The first moved entry rides under the separator key;
                    // the rest keep their own keys.
                    for (i, (key, child)) in moved.into_iter().enumerate() {
                        if i == 0 {
                            l.push_entry(parent_key, child);
                        } else {
                            l.push_entry(key, child);
                        }
                    }

                    l.write_to(left_page.as_mut_slice());
                    r.write_to(right_page.as_mut_slice());
                    children
                }
            }
        };

        for child_id in moved_children {
            let child = self.bpm.fetch_page(child_id)?;
            set_node_parent_page_id(child.page_mut().as_mut_slice(), left_id);
            self.bpm.unpin_page(child_id, true);
        }

        self.bpm.unpin_page(right_id, true);
        self.bpm.delete_page(right_id)?;
        self.bpm.unpin_page(left_id, true);

        log::debug!("coalesced {} into {}", right_id, left_id);
        Ok(())
    }

    /// Move one entry across the boundary between `frame` and its sibling
    /// and refresh the separator key in the parent. Consumes the pins on
    /// all three frames.
    fn redistribute(
        &self,
        frame: &'a Frame,
        bother: &'a Frame,
        parent: &'a Frame,
        parent_key: K,
        is_pre: bool,
        node_type: PageType,
    ) -> Result<()> {
        let node_id = frame.page_id();
        let bother_id = bother.page_id();
        let parent_id = parent.page_id();

        let mut reparent_child: Option<PageId> = None;
        let new_separator = {
            let mut node_page = frame.page_mut();
            let mut bother_page = bother.page_mut();

            match node_type {
                PageType::BTreeLeaf => {
                    let mut node = BPlusTreeLeafPage::<K>::from_bytes(node_page.as_slice());
                    let mut sib = BPlusTreeLeafPage::<K>::from_bytes(bother_page.as_slice());

                    let new_separator = if is_pre {
                        // Tail of the left sibling becomes our head.
                        let (key, value) = sib.entry_at(sib.size() - 1);
                        sib.delete(&key, &self.comparator);
                        node.insert_first(key, value);
                        key
                    } else {
                        // Head of the right sibling becomes our tail.
                        let (key, value) = sib.entry_at(0);
                        sib.delete(&key, &self.comparator);
                        node.insert_last(key, value);
                        sib.key_at(0)
                    };

                    node.write_to(node_page.as_mut_slice());
                    sib.write_to(bother_page.as_mut_slice());
                    new_separator
                }
                _ => {
                    let mut node = BPlusTreeInternalPage::<K>::from_bytes(node_page.as_slice());
                    let mut sib = BPlusTreeInternalPage::<K>::from_bytes(bother_page.as_slice());

                    let new_separator = if is_pre {
                        let last = sib.size() - 1;
                        let last_key = sib.key_at(last);
                        let last_child = sib.value_at(last);
                        sib.delete(&last_key, &self.comparator);
                        node.insert_first(parent_key, last_child);
                        reparent_child = Some(last_child);
                        last_key
                    } else {
                        let first_child = sib.value_at(0);
                        let first_key = sib.key_at(1);
                        sib.delete_first();
                        node.push_entry(parent_key, first_child);
                        reparent_child = Some(first_child);
                        first_key
                    };

                    node.write_to(node_page.as_mut_slice());
                    sib.write_to(bother_page.as_mut_slice());
                    new_separator
                }
            }
        };

        {
            let mut parent_page = parent.page_mut();
            let mut node = BPlusTreeInternalPage::<K>::from_bytes(parent_page.as_slice());
            let index = node.key_index(&parent_key, &self.comparator);
            node.set_key_at(index, new_separator);
            node.write_to(parent_page.as_mut_slice());
        }

        if let Some(child_id) = reparent_child {
            let child = self.bpm.fetch_page(child_id)?;
            set_node_parent_page_id(child.page_mut().as_mut_slice(), node_id);
            self.bpm.unpin_page(child_id, true);
        }

        self.bpm.unpin_page(parent_id, true);
        self.bpm.unpin_page(node_id, true);
        self.bpm.unpin_page(bother_id, true);
        Ok(())
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Iterator positioned at the first entry of the left-most leaf.
    pub fn begin(&self) -> Result<IndexIterator<'a, K>> {
        if self.is_empty() {
            return Ok(IndexIterator::end(self.bpm));
        }

        let mut page_id = self.root_page_id();
        let mut frame = self.bpm.fetch_page(page_id)?;
        loop {
            let child_id = {
                let page = frame.page();
                match node_page_type(page.as_slice()) {
                    PageType::BTreeLeaf => return Ok(IndexIterator::new(self.bpm, frame, 0)),
                    _ => {
                        let node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
                        node.value_at(0)
                    }
                }
            };
            let child = match self.bpm.fetch_page(child_id) {
                Ok(child) => child,
                Err(e) => {
                    self.bpm.unpin_page(page_id, false);
                    return Err(e);
                }
            };
            self.bpm.unpin_page(page_id, false);
            frame = child;
            page_id = child_id;
        }
    }

    /// Iterator positioned at the first entry whose key is `>= key`.
    pub fn begin_at(&self, key: &K) -> Result<IndexIterator<'a, K>> {
        if self.is_empty() {
            return Ok(IndexIterator::end(self.bpm));
        }

        let frame = self.find_leaf_frame(key)?;
        let index = {
            let page = frame.page();
            let leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());
            leaf.key_index(key, &self.comparator)
        };
        Ok(IndexIterator::new(self.bpm, frame, index))
    }

    // ========================================================================
    // Root bookkeeping
    // ========================================================================

    /// Record a new root page id in memory and on the header page.
    fn set_root_page_id(&self, root: PageId) -> Result<()> {
        *self.root_page_id.lock() = root;

        let frame = self.bpm.fetch_page(HEADER_PAGE_ID)?;
        let updated = HeaderPage::update_record(&mut frame.page_mut(), &self.index_name, root);
        self.bpm.unpin_page(HEADER_PAGE_ID, true);

        if !updated {
            return Err(Error::Corrupted(format!(
                "no header record for index {:?}",
                self.index_name
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Test ingest and debugging
    // ========================================================================

    /// Insert one key per whitespace-separated integer in `path`.
    ///
    /// Each key's rid is derived from the key itself. Returns the number of
    /// keys inserted (duplicates are counted out).
    pub fn insert_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        transaction: Option<&Transaction>,
    ) -> Result<usize>
    where
        K: From<i64>,
    {
        let contents = std::fs::read_to_string(path)?;
        let mut inserted = 0;
        for token in contents.split_whitespace() {
            if let Ok(value) = token.parse::<i64>() {
                if self.insert(K::from(value), Rid::from(value), transaction)? {
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    /// Remove one key per whitespace-separated integer in `path`.
    pub fn remove_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        transaction: Option<&Transaction>,
    ) -> Result<usize>
    where
        K: From<i64>,
    {
        let contents = std::fs::read_to_string(path)?;
        let mut removed = 0;
        for token in contents.split_whitespace() {
            if let Ok(value) = token.parse::<i64>() {
                self.remove(&K::from(value), transaction)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Render the tree structure for debugging, one node per line.
    pub fn to_string_tree(&self) -> Result<String> {
        if self.is_empty() {
            return Ok("(empty)".to_string());
        }
        let mut out = String::new();
        self.render_node(self.root_page_id(), 0, &mut out)?;
        Ok(out)
    }

    fn render_node(&self, page_id: PageId, depth: usize, out: &mut String) -> Result<()> {
        use std::fmt::Write;

        let frame = self.bpm.fetch_page(page_id)?;
        let children: Vec<PageId> = {
            let page = frame.page();
            match node_page_type(page.as_slice()) {
                PageType::BTreeLeaf => {
                    let leaf = BPlusTreeLeafPage::<K>::from_bytes(page.as_slice());
                    let keys: Vec<String> =
                        (0..leaf.size()).map(|i| format!("{:?}", leaf.key_at(i))).collect();
                    let _ = writeln!(
                        out,
                        "{}leaf {} next={} [{}]",
                        "  ".repeat(depth),
                        page_id,
                        leaf.next_page_id(),
                        keys.join(", ")
                    );
                    vec![]
                }
                _ => {
                    let node = BPlusTreeInternalPage::<K>::from_bytes(page.as_slice());
                    let keys: Vec<String> =
                        (1..node.size()).map(|i| format!("{:?}", node.key_at(i))).collect();
                    let _ = writeln!(
                        out,
                        "{}internal {} [{}]",
                        "  ".repeat(depth),
                        page_id,
                        keys.join(", ")
                    );
                    (0..node.size()).map(|i| node.value_at(i)).collect()
                }
            }
        };
        self.bpm.unpin_page(page_id, false);

        for child in children {
            self.render_node(child, depth + 1, out)?;
        }
        Ok(())
    }
}
