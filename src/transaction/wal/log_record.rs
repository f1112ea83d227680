use thiserror::Error;
use serde::{Serialize, Deserialize};
use bincode::{serialize, deserialize};

use crate::common::types::{Lsn, Rid, TableId, TxnId};

/// Error type for log record operations
#[derive(Error, Debug)]
pub enum LogRecordError {
    #[error("Failed to serialize log record: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize log record: {0}")]
    DeserializationError(String),
}

/// Result type for log record operations
pub type Result<T> = std::result::Result<T, LogRecordError>;

/// Types of log records written on behalf of transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordType {
    /// Marks the beginning of a transaction
    Begin,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the rollback of a transaction
    Abort,
    /// Records an update operation (modifying existing data)
    Update,
    /// Records an insert operation (adding new data)
    Insert,
    /// Records a delete operation (removing existing data)
    Delete,
}

/// Content of a data operation log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOperationContent {
    /// Table where the operation occurred
    pub table_id: TableId,
    /// Position of the affected record
    pub rid: Rid,
    /// Before-image of the data (for UPDATE/DELETE)
    pub before_image: Option<Vec<u8>>,
    /// After-image of the data (for INSERT/UPDATE)
    pub after_image: Option<Vec<u8>>,
}

/// Content of a transaction control log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOperationContent {
    /// Seconds since the epoch when the record was produced
    pub timestamp: u64,
}

impl TransactionOperationContent {
    pub fn now() -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordContent {
    Data(DataOperationContent),
    Transaction(TransactionOperationContent),
}

impl LogRecordContent {
    pub fn insert(table_id: TableId, rid: Rid, after_image: Vec<u8>) -> Self {
        LogRecordContent::Data(DataOperationContent {
            table_id,
            rid,
            before_image: None,
            after_image: Some(after_image),
        })
    }

    pub fn delete(table_id: TableId, rid: Rid, before_image: Vec<u8>) -> Self {
        LogRecordContent::Data(DataOperationContent {
            table_id,
            rid,
            before_image: Some(before_image),
            after_image: None,
        })
    }

    pub fn update(table_id: TableId, rid: Rid, before_image: Vec<u8>, after_image: Vec<u8>) -> Self {
        LogRecordContent::Data(DataOperationContent {
            table_id,
            rid,
            before_image: Some(before_image),
            after_image: Some(after_image),
        })
    }
}

/// A single write-ahead log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number - unique identifier for this log record
    pub lsn: Lsn,
    /// Transaction that generated this log record
    pub txn_id: TxnId,
    /// LSN of the previous log record in this transaction
    pub prev_lsn: Lsn,
    pub record_type: LogRecordType,
    pub content: LogRecordContent,
}

impl LogRecord {
    pub fn new(
        lsn: Lsn,
        txn_id: TxnId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Self {
        Self {
            lsn,
            txn_id,
            prev_lsn,
            record_type,
            content,
        }
    }

    /// Serialize the log record to bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self).map_err(|e| LogRecordError::SerializationError(e.to_string()))
    }

    /// Deserialize bytes into a log record
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        deserialize(data).map_err(|e| LogRecordError::DeserializationError(e.to_string()))
    }
}
