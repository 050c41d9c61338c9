//! End-to-end B+ tree scenarios: split, merge, redistribution, root
//! adjustment, ordered scans, and root persistence across reopen.

use std::io::Write;

use brambledb::buffer::BufferPoolManager;
use brambledb::common::{PageId, Rid};
use brambledb::index::{BPlusTree, OrdComparator};
use brambledb::storage::DiskManager;
use tempfile::tempdir;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolManager::new(pool_size, dm, 2), dir)
}

type Tree<'a> = BPlusTree<'a, i64, OrdComparator>;

fn tree<'a>(bpm: &'a BufferPoolManager, leaf_max: u32, internal_max: u32) -> Tree<'a> {
    BPlusTree::new("test_index", bpm, OrdComparator, leaf_max, internal_max).unwrap()
}

/// Point-lookup every expected key and verify an ordered full scan sees
/// exactly the expected set, strictly increasing.
fn assert_tree_holds(tree: &Tree<'_>, keys: &[i64]) {
    for &k in keys {
        assert_eq!(tree.get_value(&k, None).unwrap(), vec![Rid::from(k)], "lookup of key {}", k);
    }

    let scanned: Vec<i64> = tree.begin().unwrap().map(|(k, _)| k).collect();
    let mut expected = keys.to_vec();
    expected.sort_unstable();
    assert_eq!(scanned, expected, "full scan mismatch");
    for pair in scanned.windows(2) {
        assert!(pair[0] < pair[1], "scan not strictly increasing");
    }
}

#[test]
fn test_empty_tree() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), PageId::INVALID);
    assert_eq!(tree.get_value(&1, None).unwrap(), vec![]);
    tree.remove(&1, None).unwrap();

    let mut it = tree.begin().unwrap();
    assert!(it.is_end());
    assert_eq!(it.next(), None);
}

#[test]
fn test_single_leaf_insert_and_lookup() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    assert!(tree.insert(1, Rid::from(1), None).unwrap());
    assert!(tree.insert(2, Rid::from(2), None).unwrap());
    assert!(!tree.is_empty());

    // Two entries still fit in the root leaf (effective capacity 2).
    assert_tree_holds(&tree, &[1, 2]);
}

#[test]
fn test_duplicate_insert_rejected() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    assert!(tree.insert(7, Rid::from(7), None).unwrap());
    assert!(!tree.insert(7, Rid::from(8), None).unwrap());
    assert_eq!(tree.get_value(&7, None).unwrap(), vec![Rid::from(7)]);
}

/// The third insert overflows the root leaf and grows the tree: root
/// becomes internal with separator 2 over leaves [1] and [2, 3].
#[test]
fn test_first_leaf_split_creates_root() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in [1, 2, 3] {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }

    let dump = tree.to_string_tree().unwrap();
    assert!(dump.contains("internal"), "root did not grow: {}", dump);
    assert!(dump.contains("[2]"), "separator is not 2: {}", dump);

    assert_tree_holds(&tree, &[1, 2, 3]);
    assert_eq!(tree.get_value(&6, None).unwrap(), vec![]);
}

#[test]
fn test_inserts_one_through_five() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in [1, 2, 3, 4, 5] {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }

    assert_tree_holds(&tree, &[1, 2, 3, 4, 5]);
    assert_eq!(tree.get_value(&3, None).unwrap(), vec![Rid::from(3)]);
    assert_eq!(tree.get_value(&6, None).unwrap(), vec![]);

    // No pins may survive the operations.
    assert_eq!(bpm.pin_count(tree.root_page_id()), Some(0));
}

#[test]
fn test_delete_with_underflow_repair() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in [1, 2, 3, 4, 5] {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }

    tree.remove(&3, None).unwrap();
    assert_tree_holds(&tree, &[1, 2, 4, 5]);
    assert_eq!(tree.get_value(&3, None).unwrap(), vec![]);

    tree.remove(&2, None).unwrap();
    assert_tree_holds(&tree, &[1, 4, 5]);

    tree.remove(&4, None).unwrap();
    assert_tree_holds(&tree, &[1, 5]);

    tree.remove(&1, None).unwrap();
    assert_tree_holds(&tree, &[5]);
}

/// Draining the tree empties it: the root id goes invalid and the tree is
/// usable again afterwards.
#[test]
fn test_delete_everything_then_reuse() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in 1..=8 {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }
    for k in 1..=8 {
        tree.remove(&k, None).unwrap();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), PageId::INVALID);
    assert_eq!(tree.get_value(&4, None).unwrap(), vec![]);

    assert!(tree.insert(100, Rid::from(100), None).unwrap());
    assert_tree_holds(&tree, &[100]);
}

#[test]
fn test_remove_absent_key_is_noop() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in [1, 2, 3] {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }
    tree.remove(&99, None).unwrap();
    assert_tree_holds(&tree, &[1, 2, 3]);
}

/// Several hundred keys through small nodes: forces multi-level splits on
/// the way up and coalesces/redistributions on the way down.
#[test]
fn test_scale_insert_then_delete() {
    let (bpm, _dir) = create_bpm(32);
    let tree = tree(&bpm, 4, 4);

    // Insert in a mixed order.
    let mut keys: Vec<i64> = (0..300).map(|i| (i * 7) % 300).collect();
    for &k in &keys {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }
    keys.sort_unstable();
    assert_tree_holds(&tree, &keys);

    // Delete every other key.
    for k in (0..300).step_by(2) {
        tree.remove(&k, None).unwrap();
    }
    let odd: Vec<i64> = (0..300).filter(|k| k % 2 == 1).collect();
    assert_tree_holds(&tree, &odd);
    for k in (0..300).step_by(2) {
        assert_eq!(tree.get_value(&k, None).unwrap(), vec![]);
    }

    // Delete the rest.
    for &k in &odd {
        tree.remove(&k, None).unwrap();
    }
    assert!(tree.is_empty());
}

#[test]
fn test_iterator_from_key() {
    let (bpm, _dir) = create_bpm(32);
    let tree = tree(&bpm, 4, 4);

    for k in (0..50).map(|i| i * 2) {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }

    // Start exactly on a stored key.
    let from_forty: Vec<i64> = tree.begin_at(&40).unwrap().map(|(k, _)| k).collect();
    assert_eq!(from_forty, (20..50).map(|i| i * 2).collect::<Vec<_>>());

    // Start between keys: the scan begins at the next larger one.
    let from_41: Vec<i64> = tree.begin_at(&41).unwrap().map(|(k, _)| k).collect();
    assert_eq!(from_41, (21..50).map(|i| i * 2).collect::<Vec<_>>());

    // Start past the end.
    let mut it = tree.begin_at(&1000).unwrap();
    assert_eq!(it.next(), None);
}

#[test]
fn test_iterator_current_and_is_end() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    for k in [1, 2, 3] {
        assert!(tree.insert(k, Rid::from(k), None).unwrap());
    }

    let mut it = tree.begin().unwrap();
    assert!(!it.is_end());
    assert_eq!(it.current(), Some((1, Rid::from(1))));

    assert_eq!(it.next(), Some((1, Rid::from(1))));
    assert_eq!(it.next(), Some((2, Rid::from(2))));
    assert_eq!(it.next(), Some((3, Rid::from(3))));
    assert_eq!(it.next(), None);
    assert!(it.is_end());
}

/// An abandoned iterator must release its pin so the leaf stays evictable.
#[test]
fn test_iterator_drop_releases_pin() {
    let (bpm, _dir) = create_bpm(16);
    let tree = tree(&bpm, 3, 3);

    assert!(tree.insert(1, Rid::from(1), None).unwrap());
    let root = tree.root_page_id();

    {
        let mut it = tree.begin().unwrap();
        assert_eq!(it.next(), Some((1, Rid::from(1))));
        // Dropped mid-scan.
    }
    assert_eq!(bpm.pin_count(root), Some(0));
}

/// The root id is recorded on the header page, so reopening the file by
/// index name finds the same tree.
#[test]
fn test_root_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(16, dm, 2);
        let tree: Tree<'_> = BPlusTree::new("pk", &bpm, OrdComparator, 4, 4).unwrap();

        for k in 0..40 {
            assert!(tree.insert(k, Rid::from(k), None).unwrap());
        }
        bpm.flush_all_pages().unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(16, dm, 2);
        let tree: Tree<'_> = BPlusTree::new("pk", &bpm, OrdComparator, 4, 4).unwrap();

        assert!(!tree.is_empty());
        let keys: Vec<i64> = (0..40).collect();
        assert_tree_holds(&tree, &keys);
    }
}

/// Two indexes share the header page without clobbering each other.
#[test]
fn test_two_indexes_share_header() {
    let (bpm, _dir) = create_bpm(32);

    let orders: Tree<'_> = BPlusTree::new("orders_pk", &bpm, OrdComparator, 4, 4).unwrap();
    let users: Tree<'_> = BPlusTree::new("users_pk", &bpm, OrdComparator, 4, 4).unwrap();

    for k in 0..20 {
        assert!(orders.insert(k, Rid::from(k), None).unwrap());
        assert!(users.insert(k + 1000, Rid::from(k + 1000), None).unwrap());
    }

    assert_ne!(orders.root_page_id(), users.root_page_id());
    assert_eq!(orders.get_value(&5, None).unwrap(), vec![Rid::from(5)]);
    assert_eq!(orders.get_value(&1005, None).unwrap(), vec![]);
    assert_eq!(users.get_value(&1005, None).unwrap(), vec![Rid::from(1005)]);
}

#[test]
fn test_insert_and_remove_from_file() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let dm = DiskManager::create(&db_path).unwrap();
    let bpm = BufferPoolManager::new(16, dm, 2);
    let tree: Tree<'_> = BPlusTree::new("ingest", &bpm, OrdComparator, 4, 4).unwrap();

    let insert_path = dir.path().join("insert.txt");
    let mut file = std::fs::File::create(&insert_path).unwrap();
    writeln!(file, "5 3 8").unwrap();
    writeln!(file, "1").unwrap();
    writeln!(file, "9 3").unwrap(); // the second 3 is a duplicate
    drop(file);

    let inserted = tree.insert_from_file(&insert_path, None).unwrap();
    assert_eq!(inserted, 5);
    assert_tree_holds(&tree, &[1, 3, 5, 8, 9]);

    let remove_path = dir.path().join("remove.txt");
    let mut file = std::fs::File::create(&remove_path).unwrap();
    writeln!(file, "3 9 42").unwrap(); // 42 was never inserted
    drop(file);

    tree.remove_from_file(&remove_path, None).unwrap();
    assert_tree_holds(&tree, &[1, 5, 8]);
}
