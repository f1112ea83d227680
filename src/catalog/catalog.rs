use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::table::{IndexInfo, TableInfo};
use crate::index::KeyIndex;
use crate::storage::{TableHeap, TableHeapConfig};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Table {0} already exists")]
    TableAlreadyExists(String),
    #[error("Index key [{offset}, {end}) lies outside a {record_size}-byte row")]
    KeyOutOfRange { offset: usize, end: usize, record_size: usize },
}

/// The Catalog is the central repository of open tables
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
    /// Counter for assigning unique table IDs
    table_id_counter: AtomicU32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: RwLock::new(HashMap::new()),
            table_id_counter: AtomicU32::new(1),
        }
    }

    /// Create an unindexed in-memory table
    pub fn create_table(&self, name: &str, config: TableHeapConfig) -> Result<Arc<TableInfo>, CatalogError> {
        self.create(name, config, None)
    }

    /// Create an in-memory table indexed on `row[key_offset..key_offset + key_len]`
    pub fn create_indexed_table(
        &self,
        name: &str,
        config: TableHeapConfig,
        key_offset: usize,
        key_len: usize,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        if key_offset + key_len > config.record_size {
            return Err(CatalogError::KeyOutOfRange {
                offset: key_offset,
                end: key_offset + key_len,
                record_size: config.record_size,
            });
        }
        let index = IndexInfo::new(Arc::new(KeyIndex::default()), key_offset, key_len);
        self.create(name, config, Some(index))
    }

    fn create(
        &self,
        name: &str,
        config: TableHeapConfig,
        index: Option<IndexInfo>,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(CatalogError::TableAlreadyExists(name.to_string()));
        }
        let table_id = self.table_id_counter.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(TableInfo::new(name, Arc::new(TableHeap::new(table_id, config)), index));
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Register a table built elsewhere (for example over another store)
    pub fn register_table(&self, table: TableInfo) -> Result<Arc<TableInfo>, CatalogError> {
        let mut tables = self.tables.write();
        if tables.contains_key(table.name()) {
            return Err(CatalogError::TableAlreadyExists(table.name().to_string()));
        }
        let table = Arc::new(table);
        tables.insert(table.name().to_string(), table.clone());
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}
