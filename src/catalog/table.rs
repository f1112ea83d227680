use std::sync::Arc;

use crate::common::types::{Rid, TableId};
use crate::index::KeyIndex;
use crate::storage::{RecordStore, Result};

/// Single-column index over a fixed byte range of every row
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub index: Arc<KeyIndex>,
    pub key_offset: usize,
    pub key_len: usize,
}

impl IndexInfo {
    pub fn new(index: Arc<KeyIndex>, key_offset: usize, key_len: usize) -> Self {
        Self {
            index,
            key_offset,
            key_len,
        }
    }

    /// Index key stored in `row`, clamped to the row length
    pub fn key_of<'a>(&self, row: &'a [u8]) -> &'a [u8] {
        let start = self.key_offset.min(row.len());
        let end = (self.key_offset + self.key_len).min(row.len());
        &row[start..end]
    }
}

/// A table: its storage plus an optional index
pub struct TableInfo {
    name: String,
    store: Arc<dyn RecordStore>,
    index: Option<IndexInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, store: Arc<dyn RecordStore>, index: Option<IndexInfo>) -> Self {
        Self {
            name: name.into(),
            store,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_id(&self) -> TableId {
        self.store.table_id()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn index(&self) -> Option<&IndexInfo> {
        self.index.as_ref()
    }

    /// Delete the row at `rid` along with its index entry
    pub fn remove_row(&self, rid: Rid) -> Result<Vec<u8>> {
        let row = self.store.get(rid)?;
        self.store.delete(rid)?;
        if let Some(info) = &self.index {
            info.index.delete_entry(info.key_of(&row), rid);
        }
        Ok(row)
    }

    /// Put `row` back into exactly `rid` and re-index it
    pub fn restore_row(&self, rid: Rid, row: &[u8]) -> Result<()> {
        self.store.insert_at(rid, row)?;
        if let Some(info) = &self.index {
            info.index.insert_entry(info.key_of(row), rid);
        }
        Ok(())
    }

    /// Overwrite the row at `rid`, moving its index entry if the key changed
    pub fn replace_row(&self, rid: Rid, row: &[u8]) -> Result<Vec<u8>> {
        let old = self.store.get(rid)?;
        self.store.update(rid, row)?;
        if let Some(info) = &self.index {
            if info.key_of(&old) != info.key_of(row) {
                info.index.delete_entry(info.key_of(&old), rid);
                info.index.insert_entry(info.key_of(row), rid);
            }
        }
        Ok(old)
    }
}

impl std::fmt::Debug for TableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableInfo")
            .field("name", &self.name)
            .field("table_id", &self.table_id())
            .field("indexed", &self.index.is_some())
            .finish()
    }
}
