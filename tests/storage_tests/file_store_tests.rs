//! Tests for the file block store
//!
//! These tests verify:
//! - Header and node persistence across reopen
//! - Block size validation and record size limits
//! - Metadata-only writes preserve stored values
//! - Corruption detection and closed-store behavior

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::TempDir;
use treapdb::storage::{BlockStore, FileBlockStore, Header, MemoryBlockStore, Node};
use treapdb::treap::{RandomPriority, Treap};
use treapdb::TreapError;

type Store = FileBlockStore<String, Vec<u8>>;

// =============================================================================
// Helper Functions
// =============================================================================

fn open(path: &Path) -> Store {
    FileBlockStore::open(path, 440).unwrap()
}

fn leaf(key: &str, value: &[u8]) -> Node<String, Vec<u8>> {
    Node::new(key.to_string(), value.to_vec(), 9)
}

// =============================================================================
// Open / Reopen Tests
// =============================================================================

#[test]
fn test_new_file_has_empty_header() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    let store = open(&path);

    assert_eq!(store.read_header().unwrap(), Header::default());
    assert_eq!(store.block_size(), 440);
    assert_eq!(store.path(), path.as_path());
    assert_eq!(fs::metadata(&path).unwrap().len(), 64);
}

#[test]
fn test_parent_directories_are_created() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("deeper").join("index.db");
    let _store = open(&path);
    assert!(path.exists());
}

#[test]
fn test_nodes_and_header_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");

    {
        let mut store = open(&path);
        let mut node = leaf("alpha", b"first");
        node.right = Some(1);
        node.right_size = 1;
        store.write_node(0, &node, true).unwrap();
        store.write_node(1, &leaf("beta", b"second"), true).unwrap();
        store.write_header(&Header { root: Some(0), size: 2 }).unwrap();
        store.close().unwrap();
    }

    let store = open(&path);
    assert_eq!(store.read_header().unwrap(), Header { root: Some(0), size: 2 });

    let alpha = store.read_node(0, true).unwrap();
    assert_eq!(alpha.key, "alpha");
    assert_eq!(alpha.value, Some(b"first".to_vec()));
    assert_eq!(alpha.priority, 9);
    assert_eq!(alpha.left, None);
    assert_eq!(alpha.right, Some(1));
    assert_eq!((alpha.left_size, alpha.right_size), (0, 1));

    let beta = store.read_node(1, false).unwrap();
    assert_eq!(beta.key, "beta");
    assert_eq!(beta.value, None);
}

#[test]
fn test_slots_have_fixed_stride() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    let mut store = FileBlockStore::<String, Vec<u8>>::open(&path, 128).unwrap();

    for i in 0..3u64 {
        store.write_node(i, &leaf(&format!("k{}", i), b"v"), true).unwrap();
    }
    store.close().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 64 + 3 * 128);
}

#[test]
fn test_treap_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");

    {
        let mut treap = Treap::new(open(&path), Box::new(RandomPriority::seeded(5)));
        for i in 0..200u32 {
            treap.put(format!("key{:03}", i), i.to_le_bytes().to_vec()).unwrap();
        }
        treap.close().unwrap();
    }

    let treap: Treap<String, Vec<u8>, Store> = Treap::new(open(&path), Box::new(RandomPriority::seeded(6)));
    assert_eq!(treap.check_invariants().unwrap(), 200);
    assert_eq!(treap.length().unwrap(), 200);
    assert_eq!(
        treap.get(&"key123".to_string()).unwrap(),
        Some(123u32.to_le_bytes().to_vec())
    );
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_block_size_mismatch_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    drop(open(&path));

    let result = FileBlockStore::<String, Vec<u8>>::open(&path, 512);
    assert!(matches!(result, Err(TreapError::Config(_))));
}

#[test]
fn test_block_size_below_minimum_is_rejected() {
    let temp = TempDir::new().unwrap();
    let result = FileBlockStore::<String, Vec<u8>>::open(&temp.path().join("index.db"), 16);
    assert!(matches!(result, Err(TreapError::Config(_))));
}

#[test]
fn test_oversized_record_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut store = FileBlockStore::<String, Vec<u8>>::open(&temp.path().join("index.db"), 64).unwrap();

    let result = store.write_node(0, &leaf("key", &[7u8; 100]), true);
    match result {
        Err(TreapError::RecordTooLarge { needed, block_size }) => {
            assert_eq!(block_size, 64);
            assert!(needed > 100);
        }
        other => panic!("expected RecordTooLarge, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_value_filling_block_exactly_fits() {
    let temp = TempDir::new().unwrap();
    let mut store = FileBlockStore::<String, Vec<u8>>::open(&temp.path().join("index.db"), 128).unwrap();

    // prefix 8 + meta (8 + 1 + 4 + 4 * 8 = 45) + value (8 + 67) = 128
    let node = leaf("k", &[1u8; 67]);
    store.write_node(0, &node, true).unwrap();
    assert_eq!(store.read_node(0, true).unwrap().value, Some(vec![1u8; 67]));

    let too_big = leaf("k", &[1u8; 68]);
    assert!(matches!(
        store.write_node(0, &too_big, true),
        Err(TreapError::RecordTooLarge { needed: 129, block_size: 128 })
    ));
}

// =============================================================================
// Metadata-only Write Tests
// =============================================================================

#[test]
fn test_metadata_write_keeps_value() {
    let temp = TempDir::new().unwrap();
    let mut store = open(&temp.path().join("index.db"));
    store.write_node(0, &leaf("key", b"payload"), true).unwrap();

    let mut node = store.read_node(0, false).unwrap();
    node.left = Some(4);
    node.left_size = 3;
    store.write_node(0, &node, false).unwrap();

    let stored = store.read_node(0, true).unwrap();
    assert_eq!(stored.left, Some(4));
    assert_eq!(stored.left_size, 3);
    assert_eq!(stored.value, Some(b"payload".to_vec()));
}

#[test]
fn test_metadata_write_with_new_meta_length_keeps_value() {
    let temp = TempDir::new().unwrap();
    let mut store = open(&temp.path().join("index.db"));
    store.write_node(0, &leaf("k", b"payload"), true).unwrap();

    // A longer key changes the meta length, forcing a full record rebuild
    let mut node = store.read_node(0, false).unwrap();
    node.key = "a-much-longer-key".to_string();
    store.write_node(0, &node, false).unwrap();

    let stored = store.read_node(0, true).unwrap();
    assert_eq!(stored.key, "a-much-longer-key");
    assert_eq!(stored.value, Some(b"payload".to_vec()));
}

#[test]
fn test_value_write_requires_value() {
    let temp = TempDir::new().unwrap();
    let mut store = open(&temp.path().join("index.db"));

    let mut node = leaf("key", b"v");
    node.value = None;
    assert!(matches!(
        store.write_node(0, &node, true),
        Err(TreapError::Serialization(_))
    ));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_reading_unwritten_slot_is_corruption() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp.path().join("index.db"));
    assert!(matches!(store.read_node(3, false), Err(TreapError::Corruption(_))));
}

#[test]
fn test_bad_magic_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    drop(open(&path));

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(b"NOPE").unwrap();
    drop(file);

    let result = FileBlockStore::<String, Vec<u8>>::open(&path, 440);
    assert!(matches!(result, Err(TreapError::Corruption(_))));
}

#[test]
fn test_damaged_header_checksum_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    {
        let mut store = open(&path);
        store.write_node(0, &leaf("a", b"1"), true).unwrap();
        store.write_header(&Header { root: Some(0), size: 1 }).unwrap();
    }

    // Overwrite the size field without fixing the checksum
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(18)).unwrap();
    file.write_all(&99u64.to_le_bytes()).unwrap();
    drop(file);

    let result = FileBlockStore::<String, Vec<u8>>::open(&path, 440);
    assert!(matches!(result, Err(TreapError::Corruption(_))));
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_closed_file_store_rejects_operations() {
    let temp = TempDir::new().unwrap();
    let mut store = open(&temp.path().join("index.db"));
    store.write_node(0, &leaf("a", b"1"), true).unwrap();

    store.close().unwrap();
    store.close().unwrap();

    assert!(matches!(store.read_header(), Err(TreapError::Closed)));
    assert!(matches!(store.read_node(0, true), Err(TreapError::Closed)));
    assert!(matches!(
        store.write_node(1, &leaf("b", b"2"), true),
        Err(TreapError::Closed)
    ));
}

#[test]
fn test_closed_memory_store_rejects_operations() {
    let mut store: MemoryBlockStore<String, Vec<u8>> = MemoryBlockStore::new();
    store.write_node(0, &leaf("a", b"1"), true).unwrap();
    store.close().unwrap();

    assert!(matches!(store.read_header(), Err(TreapError::Closed)));
    assert!(matches!(store.read_node(0, false), Err(TreapError::Closed)));
}

// =============================================================================
// Memory Store Parity
// =============================================================================

#[test]
fn test_memory_store_metadata_write_keeps_value() {
    let mut store: MemoryBlockStore<String, Vec<u8>> = MemoryBlockStore::new();
    store.write_node(0, &leaf("key", b"payload"), true).unwrap();

    let mut node = store.read_node(0, false).unwrap();
    node.right = Some(1);
    store.write_node(0, &node, false).unwrap();

    let stored = store.read_node(0, true).unwrap();
    assert_eq!(stored.right, Some(1));
    assert_eq!(stored.value, Some(b"payload".to_vec()));
}

#[test]
fn test_memory_store_rejects_gaps() {
    let mut store: MemoryBlockStore<String, Vec<u8>> = MemoryBlockStore::new();
    assert!(store.write_node(2, &leaf("a", b"1"), true).is_err());
    assert!(store.write_node(0, &leaf("a", b"1"), false).is_err());
    assert_eq!(store.slot_count(), 0);
}
