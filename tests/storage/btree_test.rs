use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::Path,
};

use rowdb::{
    storage::{INDEX_START, btree::BTree},
    types::{PAGE_SIZE, error::DatabaseError, node::BTreeNode},
};
use tempfile::{TempDir, tempdir};

const NODE: u64 = PAGE_SIZE as u64;

fn open_file(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .unwrap()
}

fn create_test_tree() -> (TempDir, BTree) {
    let dir = tempdir().unwrap();
    let file = open_file(&dir.path().join("index.db"));
    let btree = BTree::create(file).unwrap();
    (dir, btree)
}

fn address_for(id: i32) -> u64 {
    100_000 + id as u64 * 64
}

fn insert_range(btree: &mut BTree, ids: impl Iterator<Item = i32>) {
    for id in ids {
        btree.insert(id, address_for(id)).unwrap();
    }
}

#[test]
fn test_btree_creation() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    assert_eq!(btree.root_offset, INDEX_START);
    assert_eq!(btree.next_node_offset, INDEX_START + NODE);
    assert_eq!(btree.height()?, 1);
    assert_eq!(btree.node_count()?, 1);
    assert!(btree.entries()?.is_empty());
    Ok(())
}

#[test]
fn test_single_insert_and_search() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    btree.insert(1, address_for(1))?;
    assert_eq!(btree.search(1)?, Some(address_for(1)));
    assert_eq!(btree.search(2)?, None);
    Ok(())
}

#[test]
fn test_out_of_order_inserts_stay_sorted() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    for id in [5, 1, 9, 3, 7] {
        btree.insert(id, address_for(id))?;
    }
    let ids: Vec<i32> = btree.entries()?.iter().map(|entry| entry.id).collect();
    assert_eq!(ids, vec![1, 3, 5, 7, 9]);
    Ok(())
}

#[test]
fn test_duplicate_insert_is_rejected() {
    let (_dir, mut btree) = create_test_tree();
    btree.insert(4, address_for(4)).unwrap();
    match btree.insert(4, 1) {
        Err(DatabaseError::DuplicateKey { id: 4 }) => {}
        other => panic!("Expected DuplicateKey, got {:?}", other),
    }
    assert_eq!(btree.search(4).unwrap(), Some(address_for(4)));
}

#[test]
fn test_root_split_on_overflow() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=341);

    assert_ne!(btree.root_offset, INDEX_START);
    assert_eq!(btree.height()?, 2);
    assert_eq!(btree.node_count()?, 3);

    match btree.read_node(btree.root_offset)? {
        BTreeNode::Internal { keys, children } => {
            assert_eq!(keys, vec![171]);
            assert_eq!(children[0], INDEX_START);
        }
        BTreeNode::Leaf { .. } => panic!("Expected internal root"),
    }
    for id in 1..=341 {
        assert_eq!(btree.search(id)?, Some(address_for(id)));
    }
    Ok(())
}

#[test]
fn test_full_leaf_below_root_is_split() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=630);

    assert_eq!(btree.node_count()?, 4);
    assert_eq!(btree.height()?, 2);
    let entries = btree.entries()?;
    assert_eq!(entries.len(), 630);
    assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
    for id in (1..=630).step_by(7) {
        assert_eq!(btree.search(id)?, Some(address_for(id)));
    }
    Ok(())
}

#[test]
fn test_reverse_insertion() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, (1..=400).rev());
    assert_eq!(btree.entries()?.len(), 400);
    for id in 1..=400 {
        assert_eq!(btree.search(id)?, Some(address_for(id)));
    }
    Ok(())
}

#[test]
fn test_index_region_full() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=680);
    assert_eq!(btree.node_count()?, 4);

    match btree.insert(681, address_for(681)) {
        Err(DatabaseError::IndexRegionFull { .. }) => {}
        other => panic!("Expected IndexRegionFull, got {:?}", other),
    }
    assert_eq!(btree.search(681)?, None);
    assert_eq!(btree.entries()?.len(), 680);
    assert_eq!(btree.search(680)?, Some(address_for(680)));
    Ok(())
}

#[test]
fn test_delete_entries() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=10);

    assert!(btree.delete(4)?);
    assert_eq!(btree.search(4)?, None);
    assert!(!btree.delete(4)?);
    assert!(!btree.delete(99)?);
    assert_eq!(btree.entries()?.len(), 9);
    Ok(())
}

#[test]
fn test_delete_first_key_rewrites_parent_separator() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=341);

    assert!(btree.delete(171)?);
    match btree.read_node(btree.root_offset)? {
        BTreeNode::Internal { keys, .. } => assert_eq!(keys, vec![172]),
        BTreeNode::Leaf { .. } => panic!("Expected internal root"),
    }

    btree.insert(171, address_for(171))?;
    assert_eq!(btree.search(171)?, Some(address_for(171)));
    assert_eq!(btree.search(172)?, Some(address_for(172)));
    Ok(())
}

#[test]
fn test_emptied_leaf_stays_in_tree() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=341);
    for id in 1..=170 {
        assert!(btree.delete(id)?);
    }

    // No merging: the left leaf is still linked, just empty.
    assert_eq!(btree.node_count()?, 3);
    assert_eq!(btree.search(1)?, None);
    btree.insert(5, address_for(5))?;
    assert_eq!(btree.search(5)?, Some(address_for(5)));
    Ok(())
}

#[test]
fn test_update_address() -> Result<(), DatabaseError> {
    let (_dir, mut btree) = create_test_tree();
    insert_range(&mut btree, 1..=3);
    assert!(btree.update(2, 777)?);
    assert_eq!(btree.search(2)?, Some(777));
    assert!(!btree.update(42, 1)?);
    Ok(())
}

#[test]
fn test_reopen_restores_root_and_cursor() -> Result<(), DatabaseError> {
    let dir = tempdir()?;
    let path = dir.path().join("index.db");
    let (root, cursor) = {
        let mut btree = BTree::create(open_file(&path))?;
        insert_range(&mut btree, 1..=600);
        (btree.root_offset, btree.next_node_offset)
    };

    let mut reopened = BTree::open(open_file(&path))?;
    assert_eq!(reopened.root_offset, root);
    assert_eq!(reopened.next_node_offset, cursor);
    assert_eq!(reopened.search(600)?, Some(address_for(600)));

    // New nodes must not land on live ones.
    insert_range(&mut reopened, 601..=680);
    for id in (1..=680).step_by(13) {
        assert_eq!(reopened.search(id)?, Some(address_for(id)));
    }
    Ok(())
}

#[test]
fn test_open_rejects_bad_root_pointer() -> Result<(), DatabaseError> {
    let dir = tempdir()?;
    let path = dir.path().join("index.db");
    drop(BTree::create(open_file(&path))?);

    let mut file = open_file(&path);
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&12345i64.to_le_bytes())?;

    match BTree::open(open_file(&path)) {
        Err(DatabaseError::CorruptedDatabase { .. }) => {}
        Err(other) => panic!("Expected CorruptedDatabase, got {:?}", other),
        Ok(_) => panic!("Expected CorruptedDatabase, got a tree"),
    }
    Ok(())
}
