// Execution Module
//
// Executor-side entry points into the concurrency core: every row access
// goes through the lock manager (and the gap lock table for indexed tables)
// before touching storage, and every write is recorded for undo and logged.

pub mod context;
pub mod dml;
pub mod scan;

pub use context::Context;
pub use dml::{delete_tuple, insert_tuple, read_tuple, update_tuple};
pub use scan::{lock_index_range, IndexScanExecutor, SeqScanExecutor};

use thiserror::Error;

use crate::common::types::Rid;
use crate::storage::StorageError;
use crate::transaction::concurrency::{AbortReason, TransactionError};
use crate::transaction::wal::LogManagerError;

/// Errors raised while executing against a table
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to write to WAL: {0}")]
    Log(#[from] LogManagerError),

    #[error("Table {0} has no index")]
    NoIndex(String),
}

impl ExecutionError {
    /// The abort reason, if the owning transaction must now be rolled back
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            ExecutionError::Transaction(e) => e.abort_reason(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

/// A row together with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub rid: Rid,
    pub data: Vec<u8>,
}

/// Pull-based executor
pub trait Executor {
    /// Take the locks the scan needs and position it before the first row
    fn init(&mut self) -> Result<()>;

    /// Next row, or `None` once the scan is exhausted
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Run the executor to completion
    fn collect_tuples(&mut self) -> Result<Vec<Tuple>> {
        self.init()?;
        let mut tuples = Vec::new();
        while let Some(tuple) = self.next()? {
            tuples.push(tuple);
        }
        Ok(tuples)
    }
}

#[cfg(test)]
mod test_support;
