//! LRU-K replacement policy.
//!
//! The LRU-K algorithm evicts the frame whose backward k-distance is the
//! largest. A frame with fewer than K recorded accesses has an infinite
//! backward k-distance and is always preferred over a frame with a full
//! history; ties are broken by the oldest retained timestamp.

use std::collections::{HashMap, VecDeque};

use crate::common::FrameId;

/// Access history for a single frame.
struct LruKNode {
    /// Up to `k` timestamps, oldest at the front.
    history: VecDeque<u64>,
    evictable: bool,
}

impl LruKNode {
    fn new(k: usize) -> Self {
        LruKNode { history: VecDeque::with_capacity(k), evictable: false }
    }

    fn record_access(&mut self, k: usize, timestamp: u64) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
    }

    /// Oldest retained timestamp. A node is never stored without at least
    /// one access.
    fn oldest(&self) -> u64 {
        *self.history.front().expect("frame tracked without access history")
    }
}

/// Tracks frame accesses and selects eviction victims with LRU-K.
///
/// The struct itself is not synchronized; the buffer pool owns the mutex
/// that guards it. The logical timestamp counter lives here and increases
/// by one on every recorded access, giving a total order used for
/// tie-breaking.
pub struct LruKReplacer {
    node_store: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    /// Number of currently evictable frames.
    curr_size: usize,
    /// Maximum number of frames the replacer tracks (the pool size).
    replacer_size: usize,
    k: usize,
}

impl LruKReplacer {
    /// Create a replacer for at most `num_frames` frames with history
    /// depth `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "replacer k must be at least 1");
        LruKReplacer {
            node_store: HashMap::new(),
            current_timestamp: 0,
            curr_size: 0,
            replacer_size: num_frames,
            k,
        }
    }

    /// Record an access to `frame_id` at the next logical timestamp.
    ///
    /// A frame seen for the first time gets a fresh, non-evictable history.
    /// If the frame is unknown and the replacer already tracks
    /// `replacer_size` frames, the access is ignored.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if !self.node_store.contains_key(&frame_id) && self.node_store.len() == self.replacer_size {
            return;
        }

        let k = self.k;
        let node = self.node_store.entry(frame_id).or_insert_with(|| LruKNode::new(k));
        node.record_access(k, self.current_timestamp);
        self.current_timestamp += 1;
    }

    /// Toggle whether a frame may be evicted.
    ///
    /// The evictable count changes only on an actual transition. An unknown
    /// frame id is a no-op.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = match self.node_store.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };

        if node.evictable != evictable {
            node.evictable = evictable;
            if evictable {
                self.curr_size += 1;
            } else {
                self.curr_size -= 1;
            }
        }
    }

    /// Evict the frame with the largest backward k-distance.
    ///
    /// Frames with fewer than `k` recorded accesses take priority; among
    /// those (and among full-history frames) the one with the smallest
    /// oldest-retained timestamp wins. Returns `None` when nothing is
    /// evictable; on success all state for the victim is dropped.
    pub fn evict(&mut self) -> Option<FrameId> {
        let mut victim: Option<FrameId> = None;

        for (&frame_id, node) in &self.node_store {
            if !node.evictable {
                continue;
            }
            match victim {
                None => victim = Some(frame_id),
                Some(best) => {
                    if self.prefer(frame_id, best) {
                        victim = Some(frame_id);
                    }
                }
            }
        }

        let frame_id = victim?;
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
        Some(frame_id)
    }

    /// Drop all state for `frame_id`, regardless of its k-distance.
    ///
    /// An absent frame is silently ignored.
    ///
    /// # Panics
    /// Panics if the frame is present but not evictable.
    pub fn remove(&mut self, frame_id: FrameId) {
        let node = match self.node_store.get(&frame_id) {
            Some(node) => node,
            None => return,
        };
        assert!(node.evictable, "remove called on a non-evictable frame: {}", frame_id);

        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
    }

    /// Number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }

    /// True when `s` should be evicted before `t`.
    ///
    /// A history shorter than `k` beats a full history; otherwise the frame
    /// whose oldest retained timestamp is smaller wins.
    fn prefer(&self, s: FrameId, t: FrameId) -> bool {
        let s_node = &self.node_store[&s];
        let t_node = &self.node_store[&t];

        if s_node.history.len() < self.k && t_node.history.len() == self.k {
            return true;
        }
        if s_node.history.len() == self.k && t_node.history.len() < self.k {
            return false;
        }
        s_node.oldest() < t_node.oldest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_history_bounded_by_k() {
        let mut replacer = LruKReplacer::new(4, 2);

        for _ in 0..5 {
            replacer.record_access(fid(0));
        }
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // Frame 1 has a single access, frame 0 a full history.
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_short_history_wins() {
        // Access frames [1, 2, 3, 1, 2] with K = 2: frame 3 is the only one
        // with fewer than K accesses and must go first.
        let mut replacer = LruKReplacer::new(4, 2);
        for id in [1, 2, 3, 1, 2] {
            replacer.record_access(fid(id));
        }
        for id in [1, 2, 3] {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(3)));
    }

    #[test]
    fn test_oldest_timestamp_breaks_ties() {
        let mut replacer = LruKReplacer::new(4, 2);
        // Both frames get two accesses; frame 1's oldest (ts 0) predates
        // frame 2's oldest (ts 1).
        replacer.record_access(fid(1)); // ts 0
        replacer.record_access(fid(2)); // ts 1
        replacer.record_access(fid(1)); // ts 2
        replacer.record_access(fid(2)); // ts 3
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(2), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
    }

    #[test]
    fn test_size_counts_evictable_only() {
        let mut replacer = LruKReplacer::new(7, 2);
        for id in 1..=6 {
            replacer.record_access(fid(id));
        }
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }
        replacer.set_evictable(fid(6), false);
        assert_eq!(replacer.size(), 5);

        // Repeating a transition must not change the count.
        replacer.set_evictable(fid(5), true);
        assert_eq!(replacer.size(), 5);

        replacer.set_evictable(fid(1), false);
        assert_eq!(replacer.size(), 4);
    }

    #[test]
    fn test_unknown_frame_at_capacity_ignored() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));

        // At capacity: a new frame id is dropped on the floor...
        replacer.record_access(fid(2));
        replacer.set_evictable(fid(2), true);
        assert_eq!(replacer.size(), 0);

        // ...but known frames keep recording.
        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.remove(fid(1));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_pinned_panics() {
        let mut replacer = LruKReplacer::new(2, 2);
        replacer.record_access(fid(1));
        replacer.remove(fid(1));
    }

    /// The reference scenario for LRU-K with K = 2.
    #[test]
    fn test_lru_k_scenario() {
        let mut replacer = LruKReplacer::new(7, 2);

        // Add six frames; frame 6 stays non-evictable.
        for id in 1..=6 {
            replacer.record_access(fid(id));
        }
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }
        replacer.set_evictable(fid(6), false);
        assert_eq!(replacer.size(), 5);

        // Frame 1 now has two accesses; all others have max backward
        // k-distance. Eviction order becomes [2, 3, 4, 5, 1].
        replacer.record_access(fid(1));

        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.size(), 2);

        // Insert new frames 3 and 4, update access history for 5.
        replacer.record_access(fid(3));
        replacer.record_access(fid(4));
        replacer.record_access(fid(5));
        replacer.record_access(fid(4));
        replacer.set_evictable(fid(3), true);
        replacer.set_evictable(fid(4), true);
        assert_eq!(replacer.size(), 4);

        // Frame 3 has one access and the oldest timestamp of the <K group.
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.size(), 3);

        // Frame 6 becomes evictable: single access, oldest overall.
        replacer.set_evictable(fid(6), true);
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(fid(6)));

        replacer.set_evictable(fid(1), false);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(fid(5)));

        replacer.record_access(fid(1));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }
}
