//! Key codec and ordering for the B+ tree.
//!
//! Node pages store keys as fixed-size little-endian byte strings; the
//! [`IndexKey`] trait supplies the width and the codec, and a
//! [`KeyComparator`] supplies the ordering the tree maintains.

use std::cmp::Ordering;
use std::fmt::Debug;

/// A key that can live inside a B+ tree node page.
///
/// `Default` provides the sentinel value written into an internal node's
/// unused slot-0 key.
pub trait IndexKey: Copy + Default + Debug {
    /// Bytes this key occupies inside a node.
    const ENCODED_SIZE: usize;

    /// Write the key to the beginning of `buf`.
    fn encode_into(&self, buf: &mut [u8]);

    /// Read a key from the beginning of `buf`.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! impl_index_key {
    ($($t:ty),*) => {
        $(
            impl IndexKey for $t {
                const ENCODED_SIZE: usize = std::mem::size_of::<$t>();

                fn encode_into(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn decode_from(buf: &[u8]) -> Self {
                    <$t>::from_le_bytes(buf[..Self::ENCODED_SIZE].try_into().unwrap())
                }
            }
        )*
    };
}

impl_index_key!(i32, i64, u32, u64);

/// Caller-supplied ordering over keys.
///
/// All comparisons inside the tree go through this trait; the tree never
/// assumes `Ord` on the key type itself.
pub trait KeyComparator<K>: Clone {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Comparator delegating to the key's natural `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}
