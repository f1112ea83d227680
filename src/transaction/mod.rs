// TessDB Transaction Management Module

pub mod wal;
pub mod concurrency;

// Public exports
pub use concurrency::{
    AbortReason, LockManager, Transaction, TransactionError, TransactionManager, TransactionState,
};
pub use wal::{LogManager, LogManagerConfig, LogSink};
