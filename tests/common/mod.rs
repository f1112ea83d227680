#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use tessdb::execution::Context;
use tessdb::transaction::wal::log_buffer::LogBufferConfig;
use tessdb::{
    Catalog, LockManager, LogManager, LogManagerConfig, TableHeapConfig, Transaction,
    TransactionManager,
};

/// Everything a transaction needs, over a temporary log directory
pub struct TestDb {
    pub log: Arc<LogManager>,
    pub catalog: Arc<Catalog>,
    pub lm: Arc<LockManager>,
    pub tm: TransactionManager,
    // Keep the log directory alive for the duration of the test
    _dir: TempDir,
}

impl TestDb {
    /// Context for a new transaction
    pub fn begin(&self) -> Result<(Arc<Transaction>, Context)> {
        let txn = self.tm.begin(None)?;
        let ctx = Context::for_transaction(&self.tm, txn.clone());
        Ok((txn, ctx))
    }
}

pub fn log_config(dir: &TempDir) -> LogManagerConfig {
    LogManagerConfig {
        log_dir: dir.path().to_path_buf(),
        log_file_name: "test.wal".to_string(),
        buffer_config: LogBufferConfig::default(),
        force_sync: false, // No need to sync for tests
    }
}

pub fn create_test_db() -> Result<TestDb> {
    let dir = TempDir::new()?;
    let log = Arc::new(LogManager::new(log_config(&dir))?);
    let catalog = Arc::new(Catalog::new());
    let lm = Arc::new(LockManager::new());
    let tm = TransactionManager::new(lm.clone(), log.clone(), catalog.clone());
    Ok(TestDb {
        log,
        catalog,
        lm,
        tm,
        _dir: dir,
    })
}

/// Eight-byte rows
pub fn table_config() -> TableHeapConfig {
    TableHeapConfig {
        record_size: 8,
        records_per_page: 16,
    }
}

/// Row keyed on its first four bytes (big-endian so byte order is key order)
pub fn row(key: u32, payload: u32) -> Vec<u8> {
    let mut row = key.to_be_bytes().to_vec();
    row.extend_from_slice(&payload.to_le_bytes());
    row
}

pub fn key(key: u32) -> Vec<u8> {
    key.to_be_bytes().to_vec()
}

pub fn payload(row: &[u8]) -> u32 {
    u32::from_le_bytes([row[4], row[5], row[6], row[7]])
}
