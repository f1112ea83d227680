// TessDB Write-Ahead Logging Module

pub mod log_record;
pub mod log_buffer;
pub mod log_manager;

pub use log_manager::{LogManager, LogManagerConfig, LogManagerError, Result};
pub use log_record::{LogRecord, LogRecordContent, LogRecordType};

use crate::common::types::{Lsn, TxnId};

/// Durable log as seen by the transaction manager and executors
pub trait LogSink: Send + Sync {
    /// Buffer a record for `txn_id` and return its LSN
    fn append(
        &self,
        txn_id: TxnId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Result<Lsn>;

    /// Force everything appended so far to stable storage
    fn flush_to_disk(&self) -> Result<()>;
}
