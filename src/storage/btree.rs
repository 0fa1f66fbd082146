use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
};

use log::{debug, info};

use crate::{
    storage::{DATA_START, INDEX_START, ROOT_POINTER_OFFSET, ROOT_POINTER_SIZE},
    types::{
        FileOffset, PAGE_SIZE, RowKey,
        error::{DatabaseError, Result},
        node::{BTreeNode, IndexEntry},
    },
};

/// Persistent B-tree mapping row keys to row addresses.
///
/// Nodes live in the index region of the file, one per 4096-byte block,
/// starting at [`INDEX_START`]. The root offset is persisted at file offset 0.
/// `next_node_offset` is the allocation cursor: nodes are never freed, so the
/// cursor only moves forward.
///
/// Deletion removes leaf entries without merging or rebalancing, so leaves
/// can become sparse or even empty while staying linked from their parent.
pub struct BTree {
    pub file: File,
    pub root_offset: FileOffset,
    pub next_node_offset: FileOffset,
}

impl BTree {
    /// Initialize an empty tree: one empty root leaf at [`INDEX_START`].
    pub fn create(file: File) -> Result<Self> {
        let mut btree = Self {
            file,
            root_offset: INDEX_START,
            next_node_offset: INDEX_START,
        };
        let root_offset = btree.allocate_node()?;
        btree.write_node(root_offset, &BTreeNode::empty_leaf())?;
        btree.root_offset = root_offset;
        btree.write_root_pointer()?;
        Ok(btree)
    }

    /// Open an existing tree. The allocation cursor is rebuilt from the nodes
    /// reachable from the root, so new nodes never land on live ones.
    pub fn open(mut file: File) -> Result<Self> {
        let mut buffer = [0u8; ROOT_POINTER_SIZE];
        file.seek(SeekFrom::Start(ROOT_POINTER_OFFSET))?;
        file.read_exact(&mut buffer)?;
        let raw_root = i64::from_le_bytes(buffer);
        if raw_root < 0 || !Self::is_node_offset(raw_root as FileOffset) {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!("root pointer {} is not a node offset", raw_root),
            });
        }

        let mut btree = Self {
            file,
            root_offset: raw_root as FileOffset,
            next_node_offset: INDEX_START,
        };
        let highest = btree
            .node_offsets()?
            .into_iter()
            .max()
            .unwrap_or(btree.root_offset);
        btree.next_node_offset = highest + PAGE_SIZE as FileOffset;
        debug!(
            "opened index: root at {}, allocation cursor at {}",
            btree.root_offset, btree.next_node_offset
        );
        Ok(btree)
    }

    fn is_node_offset(offset: FileOffset) -> bool {
        offset >= INDEX_START
            && offset + PAGE_SIZE as FileOffset <= DATA_START
            && (offset - INDEX_START) % PAGE_SIZE as FileOffset == 0
    }

    pub fn read_node(&mut self, offset: FileOffset) -> Result<BTreeNode> {
        if !Self::is_node_offset(offset) {
            return Err(DatabaseError::CorruptedNode {
                offset,
                reason: "offset is outside the index region".to_string(),
            });
        }
        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buffer)?;
        BTreeNode::from_bytes(offset, &buffer)
    }

    fn write_node(&mut self, offset: FileOffset, node: &BTreeNode) -> Result<()> {
        if !Self::is_node_offset(offset) {
            return Err(DatabaseError::CorruptedNode {
                offset,
                reason: "offset is outside the index region".to_string(),
            });
        }
        let node_bytes = node.to_bytes()?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&node_bytes)?;
        self.file.flush()?;
        Ok(())
    }

    fn write_root_pointer(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(ROOT_POINTER_OFFSET))?;
        self.file.write_all(&(self.root_offset as i64).to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Hand out the next node block. Fails once a whole node no longer fits
    /// in front of the data region.
    pub fn allocate_node(&mut self) -> Result<FileOffset> {
        self.ensure_room(1)?;
        let offset = self.next_node_offset;
        self.next_node_offset += PAGE_SIZE as FileOffset;
        Ok(offset)
    }

    fn ensure_room(&self, nodes: u64) -> Result<()> {
        let needed_end = self.next_node_offset + nodes * PAGE_SIZE as FileOffset;
        if needed_end > DATA_START {
            return Err(DatabaseError::IndexRegionFull {
                offset: self.next_node_offset,
            });
        }
        Ok(())
    }

    pub fn search(&mut self, id: RowKey) -> Result<Option<FileOffset>> {
        let mut offset = self.root_offset;
        loop {
            match self.read_node(offset)? {
                BTreeNode::Internal { keys, children } => {
                    offset = children[BTreeNode::child_index(&keys, id)];
                }
                BTreeNode::Leaf { entries } => {
                    return Ok(entries
                        .iter()
                        .find(|entry| entry.id == id)
                        .map(|entry| entry.address));
                }
            }
        }
    }

    pub fn insert(&mut self, id: RowKey, address: FileOffset) -> Result<()> {
        let root = self.read_node(self.root_offset)?;
        if root.is_full() {
            self.split_root(root)?;
        }

        // Every node we step into has room for one more key: full children
        // are split before descending.
        let mut offset = self.root_offset;
        loop {
            match self.read_node(offset)? {
                BTreeNode::Leaf { mut entries } => {
                    match entries.binary_search_by_key(&id, |entry| entry.id) {
                        Ok(_) => return Err(DatabaseError::DuplicateKey { id }),
                        Err(position) => entries.insert(position, IndexEntry::new(id, address)),
                    }
                    self.write_node(offset, &BTreeNode::Leaf { entries })?;
                    break;
                }
                BTreeNode::Internal {
                    mut keys,
                    mut children,
                } => {
                    let mut child_slot = BTreeNode::child_index(&keys, id);
                    let child = self.read_node(children[child_slot])?;
                    if child.is_full() {
                        let (separator, right_offset) =
                            self.split_node(children[child_slot], child)?;
                        keys.insert(child_slot, separator);
                        children.insert(child_slot + 1, right_offset);
                        if id >= separator {
                            child_slot += 1;
                        }
                        let next = children[child_slot];
                        self.write_node(offset, &BTreeNode::Internal { keys, children })?;
                        offset = next;
                    } else {
                        offset = children[child_slot];
                    }
                }
            }
        }

        self.write_root_pointer()
    }

    /// Split a full root: the old root keeps the lower half, a new right
    /// sibling takes the upper half and a new root holds the median.
    fn split_root(&mut self, root: BTreeNode) -> Result<()> {
        self.ensure_room(2)?;
        let old_root = self.root_offset;
        let (separator, right_offset) = self.split_node(old_root, root)?;

        let new_root_offset = self.allocate_node()?;
        let new_root = BTreeNode::Internal {
            keys: vec![separator],
            children: vec![old_root, right_offset],
        };
        self.write_node(new_root_offset, &new_root)?;
        self.root_offset = new_root_offset;
        self.write_root_pointer()?;
        info!(
            "split index root at {}: new root {} with separator {}",
            old_root, new_root_offset, separator
        );
        Ok(())
    }

    /// Move the upper half of a full node at `offset` into a newly allocated
    /// right sibling. Returns the separator for the parent and the sibling's
    /// offset. Nothing is written if allocation fails.
    fn split_node(&mut self, offset: FileOffset, node: BTreeNode) -> Result<(RowKey, FileOffset)> {
        let right_offset = self.allocate_node()?;
        let (left, right, separator) = match node {
            BTreeNode::Leaf { mut entries } => {
                let right_entries = entries.split_off(entries.len() / 2);
                let separator = right_entries[0].id;
                (
                    BTreeNode::Leaf { entries },
                    BTreeNode::Leaf {
                        entries: right_entries,
                    },
                    separator,
                )
            }
            BTreeNode::Internal {
                mut keys,
                mut children,
            } => {
                let mid = keys.len() / 2;
                let right_keys = keys.split_off(mid + 1);
                let right_children = children.split_off(mid + 1);
                let separator = keys.pop().ok_or_else(|| DatabaseError::CorruptedNode {
                    offset,
                    reason: "cannot split an internal node without keys".to_string(),
                })?;
                (
                    BTreeNode::Internal { keys, children },
                    BTreeNode::Internal {
                        keys: right_keys,
                        children: right_children,
                    },
                    separator,
                )
            }
        };

        self.write_node(right_offset, &right)?;
        self.write_node(offset, &left)?;
        debug!(
            "split index node {} into {} at separator {}",
            offset, right_offset, separator
        );
        Ok((separator, right_offset))
    }

    /// Remove `id` from its leaf. Returns `false` when the key is absent.
    pub fn delete(&mut self, id: RowKey) -> Result<bool> {
        let mut parent: Option<(FileOffset, usize)> = None;
        let mut offset = self.root_offset;
        loop {
            match self.read_node(offset)? {
                BTreeNode::Internal { keys, children } => {
                    let child_slot = BTreeNode::child_index(&keys, id);
                    parent = Some((offset, child_slot));
                    offset = children[child_slot];
                }
                BTreeNode::Leaf { mut entries } => {
                    let Ok(position) = entries.binary_search_by_key(&id, |entry| entry.id) else {
                        return Ok(false);
                    };
                    entries.remove(position);
                    let new_first = if position == 0 {
                        entries.first().map(|entry| entry.id)
                    } else {
                        None
                    };
                    self.write_node(offset, &BTreeNode::Leaf { entries })?;

                    // Child 0 has no lower separator to tighten.
                    if let (Some(first), Some((parent_offset, child_slot))) = (new_first, parent) {
                        if child_slot > 0 {
                            self.rewrite_separator(parent_offset, child_slot - 1, first)?;
                        }
                    }
                    return Ok(true);
                }
            }
        }
    }

    fn rewrite_separator(&mut self, offset: FileOffset, key_slot: usize, key: RowKey) -> Result<()> {
        match self.read_node(offset)? {
            BTreeNode::Internal { mut keys, children } => {
                keys[key_slot] = key;
                self.write_node(offset, &BTreeNode::Internal { keys, children })
            }
            BTreeNode::Leaf { .. } => Err(DatabaseError::CorruptedNode {
                offset,
                reason: "expected an internal node above a leaf".to_string(),
            }),
        }
    }

    /// Point an existing entry at a new address. Returns `false` when the key
    /// is absent.
    pub fn update(&mut self, id: RowKey, address: FileOffset) -> Result<bool> {
        let mut offset = self.root_offset;
        loop {
            match self.read_node(offset)? {
                BTreeNode::Internal { keys, children } => {
                    offset = children[BTreeNode::child_index(&keys, id)];
                }
                BTreeNode::Leaf { mut entries } => {
                    let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) else {
                        return Ok(false);
                    };
                    if entry.address != address {
                        entry.address = address;
                        self.write_node(offset, &BTreeNode::Leaf { entries })?;
                    }
                    return Ok(true);
                }
            }
        }
    }

    /// All leaf entries in key order.
    pub fn entries(&mut self) -> Result<Vec<IndexEntry>> {
        let mut result = Vec::new();
        let mut stack = vec![self.root_offset];
        while let Some(offset) = stack.pop() {
            match self.read_node(offset)? {
                BTreeNode::Leaf { entries } => result.extend(entries),
                BTreeNode::Internal { children, .. } => stack.extend(children.into_iter().rev()),
            }
        }
        Ok(result)
    }

    /// Offsets of every node reachable from the root.
    pub fn node_offsets(&mut self) -> Result<Vec<FileOffset>> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.root_offset];
        while let Some(offset) = stack.pop() {
            if !seen.insert(offset) {
                return Err(DatabaseError::CorruptedNode {
                    offset,
                    reason: "node is reachable twice".to_string(),
                });
            }
            if let BTreeNode::Internal { children, .. } = self.read_node(offset)? {
                stack.extend(children);
            }
        }
        let mut offsets: Vec<_> = seen.into_iter().collect();
        offsets.sort_unstable();
        Ok(offsets)
    }

    pub fn node_count(&mut self) -> Result<usize> {
        Ok(self.node_offsets()?.len())
    }

    /// Number of levels, counting the root leaf of an unsplit tree as 1.
    pub fn height(&mut self) -> Result<usize> {
        let mut height = 1;
        let mut offset = self.root_offset;
        while let BTreeNode::Internal { children, .. } = self.read_node(offset)? {
            offset = children[0];
            height += 1;
        }
        Ok(height)
    }
}
