//! BrambleDB - the storage and indexing core of an educational relational
//! database engine.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        BrambleDB                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────────────────────────────┐    │
//! │  │            Index Layer (index/)                  │    │
//! │  │     BPlusTree + IndexIterator over pages         │    │
//! │  └──────────────────────────────────────────────────┘    │
//! │                          ↓                               │
//! │  ┌──────────────────────────────────────────────────┐    │
//! │  │           Buffer Pool (buffer/)                  │    │
//! │  │  BufferPoolManager + Frame + LRU-K replacer      │    │
//! │  │  page table: ExtendibleHashTable (container/)    │    │
//! │  └──────────────────────────────────────────────────┘    │
//! │                          ↓                               │
//! │  ┌──────────────────────────────────────────────────┐    │
//! │  │           Storage Layer (storage/)               │    │
//! │  │   DiskManager + Page + node page layouts         │    │
//! │  └──────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - shared primitives (`PageId`, `FrameId`, `Rid`, errors,
//!   config)
//! - [`container`] - the extendible hash table
//! - [`buffer`] - buffer pool management and eviction
//! - [`storage`] - disk I/O and page formats
//! - [`index`] - the B+ tree index
//! - [`concurrency`] - the opaque transaction token
//!
//! # Quick Start
//! ```no_run
//! use brambledb::buffer::BufferPoolManager;
//! use brambledb::index::{BPlusTree, OrdComparator};
//! use brambledb::storage::DiskManager;
//! use brambledb::Rid;
//!
//! let dm = DiskManager::create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, dm, 2);
//!
//! let tree = BPlusTree::<i64, _>::new("pk", &bpm, OrdComparator, 64, 64).unwrap();
//! tree.insert(42, Rid::from(42), None).unwrap();
//! assert_eq!(tree.get_value(&42, None).unwrap(), vec![Rid::from(42)]);
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used items at the crate root.
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result, Rid};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::BPlusTree;
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
