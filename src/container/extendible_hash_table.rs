//! Extendible hash table.
//!
//! An associative map with bounded per-bucket capacity. When a bucket
//! overflows it splits: either locally (one bucket becomes two and the
//! affected directory slots are repointed) or, when the bucket is already
//! at the directory's depth, the directory doubles first.
//!
//! The buffer pool instantiates this container as its page table
//! (`PageId -> FrameId`).

use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

/// Hasher that returns integer writes verbatim.
///
/// Directory indexing uses the low bits of the hash, and integer keys are
/// expected to land in the slot named by their own low bits. Non-integer
/// writes fall back to an FNV-1a fold.
#[derive(Default)]
pub struct PassthroughHasher(u64);

impl Hasher for PassthroughHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        const FNV_PRIME: u64 = 0x100000001b3;
        for &b in bytes {
            self.0 = (self.0 ^ b as u64).wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u8(&mut self, v: u8) {
        self.0 = v as u64;
    }

    fn write_u32(&mut self, v: u32) {
        self.0 = v as u64;
    }

    fn write_u64(&mut self, v: u64) {
        self.0 = v;
    }

    fn write_usize(&mut self, v: usize) {
        self.0 = v as u64;
    }

    fn write_i32(&mut self, v: i32) {
        self.0 = v as u32 as u64;
    }

    fn write_i64(&mut self, v: i64) {
        self.0 = v as u64;
    }
}

/// A bucket: a bounded list of key-value pairs plus its local depth.
struct Bucket<K, V> {
    /// Number of low hash bits that route to this bucket.
    depth: usize,
    items: Vec<(K, V)>,
}

impl<K: PartialEq, V: Clone> Bucket<K, V> {
    fn new(capacity: usize, depth: usize) -> Self {
        Bucket { depth, items: Vec::with_capacity(capacity) }
    }

    fn find(&self, key: &K) -> Option<V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Insert or update. Returns false when the key is new and the bucket
    /// is full.
    fn insert(&mut self, key: K, value: V, capacity: usize) -> bool {
        if let Some((_, v)) = self.items.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return true;
        }
        if self.items.len() >= capacity {
            return false;
        }
        self.items.push((key, value));
        true
    }
}

/// Directory state, guarded by the table's mutex.
///
/// Directory slots hold indices into the bucket arena so several slots can
/// share one bucket, the same aliasing the textbook structure gets from
/// shared pointers. Buckets are never removed from the arena.
struct Directory<K, V> {
    global_depth: usize,
    bucket_capacity: usize,
    /// `dir[i]` is the arena index of the bucket for hash prefix `i`.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

impl<K, V> Directory<K, V>
where
    K: Hash + PartialEq + Clone,
    V: Clone,
{
    fn index_of(&self, key: &K) -> usize {
        let mask = (1usize << self.global_depth) - 1;
        (hash_of(key) as usize) & mask
    }

    /// Split the bucket behind `dir[index]` into two buckets one level
    /// deeper, repointing every directory slot whose low `depth` bits name
    /// the new bucket.
    fn redistribute(&mut self, index: usize) {
        let old_idx = self.dir[index];
        self.buckets[old_idx].depth += 1;
        let depth = self.buckets[old_idx].depth;

        // The prefix that identified the bucket before the split.
        let low_mask = (1usize << (depth - 1)) - 1;
        let prefix = index & low_mask;

        let new_idx = self.buckets.len();
        self.buckets.push(Bucket::new(self.bucket_capacity, depth));

        // Keys whose bit at position depth-1 is set move to the new bucket.
        let items = std::mem::take(&mut self.buckets[old_idx].items);
        for (key, value) in items {
            let idx = (hash_of(&key) as usize) & ((1usize << depth) - 1);
            if idx == prefix {
                self.buckets[old_idx].items.push((key, value));
            } else {
                self.buckets[new_idx].items.push((key, value));
            }
        }

        // Repoint the slots that now belong to the new bucket: low depth-1
        // bits match the old prefix, bit depth-1 differs.
        let full_mask = (1usize << depth) - 1;
        for slot in 0..self.dir.len() {
            if slot & low_mask == prefix && slot & full_mask != prefix {
                self.dir[slot] = new_idx;
            }
        }
    }

    /// Double the directory by duplicating every slot's reference.
    fn grow(&mut self) {
        self.global_depth += 1;
        let old_len = self.dir.len();
        for i in 0..old_len {
            let idx = self.dir[i];
            self.dir.push(idx);
        }
        log::debug!("directory doubled to global depth {}", self.global_depth);
    }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = PassthroughHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// A thread-safe extendible hash table.
///
/// One mutex serializes all public operations. Lookups copy values out;
/// the table never hands out references into a bucket.
///
/// # Example
/// ```
/// use brambledb::container::ExtendibleHashTable;
///
/// let table: ExtendibleHashTable<u32, String> = ExtendibleHashTable::new(2);
/// table.insert(1, "one".to_string());
/// assert_eq!(table.find(&1), Some("one".to_string()));
/// assert!(table.remove(&1));
/// assert_eq!(table.find(&1), None);
/// ```
pub struct ExtendibleHashTable<K, V> {
    inner: Mutex<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + PartialEq + Clone,
    V: Clone,
{
    /// Create a table whose buckets hold at most `bucket_capacity` entries.
    ///
    /// The directory starts at global depth 0 with a single empty bucket.
    pub fn new(bucket_capacity: usize) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be at least 1");
        let inner = Directory {
            global_depth: 0,
            bucket_capacity,
            dir: vec![0],
            buckets: vec![Bucket::new(bucket_capacity, 0)],
        };
        ExtendibleHashTable { inner: Mutex::new(inner) }
    }

    /// Look up `key`, copying its value out.
    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let index = inner.index_of(key);
        inner.buckets[inner.dir[index]].find(key)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let index = inner.index_of(key);
        let bucket = inner.dir[index];
        inner.buckets[bucket].remove(key)
    }

    /// Insert `key -> value`, updating in place if the key exists.
    ///
    /// A full bucket splits; a split at the directory's depth doubles the
    /// directory first. Each split strictly reduces one bucket's load, so
    /// the retry loop terminates.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        loop {
            let index = inner.index_of(&key);
            let bucket = inner.dir[index];
            let capacity = inner.bucket_capacity;
            if inner.buckets[bucket].insert(key.clone(), value.clone(), capacity) {
                return;
            }

            if inner.buckets[bucket].depth < inner.global_depth {
                inner.redistribute(index);
            } else {
                inner.grow();
            }
        }
    }

    /// Current global depth of the directory.
    pub fn global_depth(&self) -> usize {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket behind directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock();
        inner.buckets[inner.dir[dir_index]].depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }
}
