use crate::types::{
    FileOffset, INDEX_ENTRY_SIZE, NODE_HEADER_SIZE, NODE_MAX_CHILDREN, NODE_MAX_KEYS, PAGE_SIZE,
    RowKey, error::DatabaseError,
};

/*
 * B-tree Node Layout on Disk (one 4096-byte block)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │          num_keys (4, i32)  |  is_leaf (4, i32: 0 or 1)         │
 * ├─────────────────────────────────────────────────────────────────┤
 * │ leaf:     entries[340] = { id (4, i32) | address (8, i64) }     │
 * │           bytes [8, 4088), tail unused                          │
 * │ internal: keys[340] (i32)      bytes [8, 1368)                  │
 * │           children[341] (i64)  bytes [1368, 4096)               │
 * └─────────────────────────────────────────────────────────────────┘
 * Child i of an internal node holds keys in [keys[i-1], keys[i]).
 */

const KEYS_START: usize = NODE_HEADER_SIZE;
const CHILDREN_START: usize = KEYS_START + NODE_MAX_KEYS * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: RowKey,
    pub address: FileOffset,
}

impl IndexEntry {
    pub fn new(id: RowKey, address: FileOffset) -> Self {
        Self { id, address }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BTreeNode {
    Leaf {
        entries: Vec<IndexEntry>,
    },
    Internal {
        keys: Vec<RowKey>,
        children: Vec<FileOffset>,
    },
}

impl BTreeNode {
    pub fn empty_leaf() -> Self {
        BTreeNode::Leaf {
            entries: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BTreeNode::Leaf { .. })
    }

    pub fn num_keys(&self) -> usize {
        match self {
            BTreeNode::Leaf { entries } => entries.len(),
            BTreeNode::Internal { keys, .. } => keys.len(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.num_keys() >= NODE_MAX_KEYS
    }

    /// Index of the child that may contain `id`: the child left of the first
    /// separator strictly greater than `id`.
    pub fn child_index(keys: &[RowKey], id: RowKey) -> usize {
        keys.iter().position(|&k| id < k).unwrap_or(keys.len())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        let num_keys = self.num_keys();
        if num_keys > NODE_MAX_KEYS {
            return Err(DatabaseError::SerializationError {
                details: format!("node holds {} keys, limit is {}", num_keys, NODE_MAX_KEYS),
            });
        }

        buffer[0..4].copy_from_slice(&(num_keys as i32).to_le_bytes());
        buffer[4..8].copy_from_slice(&(self.is_leaf() as i32).to_le_bytes());

        match self {
            BTreeNode::Leaf { entries } => {
                let mut offset = KEYS_START;
                for entry in entries {
                    buffer[offset..offset + 4].copy_from_slice(&entry.id.to_le_bytes());
                    buffer[offset + 4..offset + INDEX_ENTRY_SIZE]
                        .copy_from_slice(&(entry.address as i64).to_le_bytes());
                    offset += INDEX_ENTRY_SIZE;
                }
            }
            BTreeNode::Internal { keys, children } => {
                if children.len() != keys.len() + 1 {
                    return Err(DatabaseError::SerializationError {
                        details: format!(
                            "internal node has {} keys but {} children",
                            keys.len(),
                            children.len()
                        ),
                    });
                }
                for (i, key) in keys.iter().enumerate() {
                    let offset = KEYS_START + i * 4;
                    buffer[offset..offset + 4].copy_from_slice(&key.to_le_bytes());
                }
                for (i, child) in children.iter().enumerate() {
                    let offset = CHILDREN_START + i * 8;
                    buffer[offset..offset + 8].copy_from_slice(&(*child as i64).to_le_bytes());
                }
            }
        }

        Ok(buffer)
    }

    /// Deserialize a node image read from `offset`.
    pub fn from_bytes(offset: FileOffset, bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }

        let num_keys = read_i32(bytes, 0);
        if num_keys < 0 || num_keys as usize > NODE_MAX_KEYS {
            return Err(DatabaseError::CorruptedNode {
                offset,
                reason: format!("num_keys {} outside 0..={}", num_keys, NODE_MAX_KEYS),
            });
        }
        let num_keys = num_keys as usize;

        match read_i32(bytes, 4) {
            1 => {
                let entries = (0..num_keys)
                    .map(|i| {
                        let at = KEYS_START + i * INDEX_ENTRY_SIZE;
                        IndexEntry::new(read_i32(bytes, at), read_i64(bytes, at + 4) as FileOffset)
                    })
                    .collect();
                Ok(BTreeNode::Leaf { entries })
            }
            0 => {
                let keys = (0..num_keys)
                    .map(|i| read_i32(bytes, KEYS_START + i * 4))
                    .collect();
                let children = (0..=num_keys)
                    .map(|i| read_i64(bytes, CHILDREN_START + i * 8) as FileOffset)
                    .collect::<Vec<_>>();
                debug_assert!(children.len() <= NODE_MAX_CHILDREN);
                Ok(BTreeNode::Internal { keys, children })
            }
            other => Err(DatabaseError::CorruptedNode {
                offset,
                reason: format!("is_leaf flag {} is neither 0 nor 1", other),
            }),
        }
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    i64::from_le_bytes(raw)
}
