//! Eviction policy implementations (replacers).
//!
//! The buffer pool evicts with [`LruKReplacer`], an LRU-K policy: frames
//! with fewer than K recorded accesses are evicted first, then the frame
//! whose K-th most recent access is oldest.

mod lru_k;

pub use lru_k::LruKReplacer;
