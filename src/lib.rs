// TessDB Database Engine

pub mod common;
pub mod catalog;
pub mod index;
pub mod storage;
pub mod transaction;
pub mod execution;

// Re-export key items for convenient access
pub use catalog::{Catalog, TableInfo};
pub use common::types::{Iid, Rid, TableId, TxnId};
pub use execution::{Context, ExecutionError};
pub use index::KeyIndex;
pub use storage::{RecordStore, TableHeap, TableHeapConfig};
pub use transaction::concurrency::{GroupLockMode, LockDataId, LockMode};
pub use transaction::{
    AbortReason, LockManager, LogManager, LogManagerConfig, Transaction, TransactionError,
    TransactionManager, TransactionState,
};
