use std::sync::Arc;

use tempfile::TempDir;

use crate::catalog::{Catalog, TableInfo};
use crate::execution::Context;
use crate::storage::TableHeapConfig;
use crate::transaction::concurrency::{LockManager, TransactionManager};
use crate::transaction::wal::{LogManager, LogManagerConfig};

/// Transaction manager over a throwaway log directory
pub struct Harness {
    _dir: TempDir,
    catalog: Arc<Catalog>,
    tm: TransactionManager,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = LogManagerConfig {
            log_dir: dir.path().to_path_buf(),
            force_sync: false,
            ..LogManagerConfig::default()
        };
        let log = Arc::new(LogManager::new(config).unwrap());
        let catalog = Arc::new(Catalog::new());
        let tm = TransactionManager::new(Arc::new(LockManager::new()), log, catalog.clone());
        Self { _dir: dir, catalog, tm }
    }

    fn config() -> TableHeapConfig {
        TableHeapConfig {
            record_size: 8,
            records_per_page: 4,
        }
    }

    pub fn plain_table(&self) -> Arc<TableInfo> {
        self.catalog.create_table("plain", Self::config()).unwrap()
    }

    /// Table keyed on the first four bytes of each row
    pub fn indexed_table(&self) -> Arc<TableInfo> {
        self.catalog.create_indexed_table("indexed", Self::config(), 0, 4).unwrap()
    }

    pub fn lock_manager(&self) -> &LockManager {
        self.tm.lock_manager()
    }

    pub fn tm(&self) -> &TransactionManager {
        &self.tm
    }

    /// Context for a freshly begun transaction
    pub fn context(&self) -> Context {
        let txn = self.tm.begin(None).unwrap();
        Context::for_transaction(&self.tm, txn)
    }

    pub fn commit(&self, ctx: &Context) {
        self.tm.commit(ctx.txn()).unwrap();
    }

    pub fn abort(&self, ctx: &Context) {
        self.tm.abort(ctx.txn()).unwrap();
    }
}
