use crate::types::{
    ROW_ID_SIZE, ROW_NAME_MAX_LEN, ROW_NAME_SIZE, ROW_SIZE, RowKey, error::DatabaseError,
};

/*
 * Row Layout (64 bytes, little-endian)
 * ┌──────────┬───────────────────────────────────────────┐
 * │ id (4)   │ name (60, NUL padded, at most 59 used)    │
 * └──────────┴───────────────────────────────────────────┘
 * id == 0 marks an empty slot.
 */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowKey,
    pub name: Vec<u8>,
}

impl Row {
    /// Build a row, truncating `name` to the 59 bytes that fit before the
    /// terminating NUL.
    pub fn new(id: RowKey, name: impl AsRef<[u8]>) -> Self {
        let name = name.as_ref();
        let len = name.len().min(ROW_NAME_MAX_LEN);
        Self {
            id,
            name: name[..len].to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self {
            id: 0,
            name: Vec::new(),
        }
    }

    pub fn is_empty_slot(&self) -> bool {
        self.id == 0
    }

    /// Lossy UTF-8 view of the name, for display.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn to_bytes(&self) -> [u8; ROW_SIZE] {
        let mut buffer = [0u8; ROW_SIZE];
        buffer[..ROW_ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        let len = self.name.len().min(ROW_NAME_MAX_LEN);
        buffer[ROW_ID_SIZE..ROW_ID_SIZE + len].copy_from_slice(&self.name[..len]);
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < ROW_SIZE {
            return Err(DatabaseError::SerializationError {
                details: format!("Row needs {} bytes, got {}", ROW_SIZE, bytes.len()),
            });
        }

        let id = RowKey::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        // Name runs up to the first NUL
        let name_bytes = &bytes[ROW_ID_SIZE..ROW_ID_SIZE + ROW_NAME_SIZE];
        let len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ROW_NAME_MAX_LEN)
            .min(ROW_NAME_MAX_LEN);

        Ok(Row {
            id,
            name: name_bytes[..len].to_vec(),
        })
    }
}
