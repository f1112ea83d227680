// TessDB Transaction implementation
// Per-transaction state shared between executors, the lock manager and the
// transaction manager

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, Rid, TxnId};
use crate::storage::StorageError;
use crate::transaction::concurrency::lock_manager::LockDataId;
use crate::transaction::concurrency::lock_mode::LockMode;
use crate::transaction::wal::LogManagerError;

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_finished(self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::Aborted)
    }
}

/// Why a lock or gap request forced its transaction to abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A new request conflicted with another transaction's granted mode
    DeadlockPrevention,
    /// Strengthening an already held lock conflicted with a peer
    UpgradeConflict,
    /// A write landed inside another transaction's gap lock
    GapConflict,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AbortReason::DeadlockPrevention => "deadlock prevention",
            AbortReason::UpgradeConflict => "lock upgrade conflict",
            AbortReason::GapConflict => "gap lock conflict",
        };
        f.write_str(reason)
    }
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {txn_id} aborted: {reason}")]
    Aborted { txn_id: TxnId, reason: AbortReason },

    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TxnId),

    #[error("Lock mode {mode} cannot be taken on a record")]
    InvalidRecordLockMode { mode: LockMode },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Write record for {rid} in {table_name} has no before-image")]
    MissingBeforeImage { table_name: String, rid: Rid },

    #[error("Failed to write to WAL: {0}")]
    LogError(#[from] LogManagerError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl TransactionError {
    /// The abort reason, if this error means the transaction must be rolled back
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            TransactionError::Aborted { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Kind of change a write record undoes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    InsertTuple,
    DeleteTuple,
    UpdateTuple,
}

/// One entry of a transaction's write-set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub write_type: WriteType,
    pub table_name: String,
    pub rid: Rid,
    /// Row contents before the change; `None` for inserts
    pub before_image: Option<Vec<u8>>,
}

impl WriteRecord {
    pub fn insert(table_name: impl Into<String>, rid: Rid) -> Self {
        Self {
            write_type: WriteType::InsertTuple,
            table_name: table_name.into(),
            rid,
            before_image: None,
        }
    }

    pub fn delete(table_name: impl Into<String>, rid: Rid, before_image: Vec<u8>) -> Self {
        Self {
            write_type: WriteType::DeleteTuple,
            table_name: table_name.into(),
            rid,
            before_image: Some(before_image),
        }
    }

    pub fn update(table_name: impl Into<String>, rid: Rid, before_image: Vec<u8>) -> Self {
        Self {
            write_type: WriteType::UpdateTuple,
            table_name: table_name.into(),
            rid,
            before_image: Some(before_image),
        }
    }
}

/// Transaction - per-transaction state
///
/// The handle is shared (`Arc<Transaction>`) between the thread running the
/// transaction and the transaction manager's registry, so every mutable part
/// sits behind its own small latch.
pub struct Transaction {
    /// Transaction ID
    id: TxnId,

    /// Current transaction state
    state: Mutex<TransactionState>,

    /// Undo information, oldest first
    write_set: Mutex<Vec<WriteRecord>>,

    /// Resources this transaction currently holds a lock on
    lock_set: Mutex<HashSet<LockDataId>>,

    /// First LSN of this transaction
    first_lsn: AtomicU64,

    /// Last LSN of this transaction
    last_lsn: AtomicU64,
}

impl Transaction {
    /// Create a new transaction with the given ID
    pub fn new(txn_id: TxnId) -> Self {
        Self {
            id: txn_id,
            state: Mutex::new(TransactionState::Growing),
            write_set: Mutex::new(Vec::new()),
            lock_set: Mutex::new(HashSet::new()),
            first_lsn: AtomicU64::new(0),
            last_lsn: AtomicU64::new(0),
        }
    }

    /// Get transaction ID
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Get transaction state
    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == TransactionState::Aborted
    }

    /// Fails with `InvalidState` once the transaction has committed or aborted
    pub fn ensure_active(&self) -> Result<()> {
        if self.state().is_finished() {
            return Err(TransactionError::InvalidState(self.id));
        }
        Ok(())
    }

    /// Append an entry to the write-set
    pub fn append_write_record(&self, record: WriteRecord) -> Result<()> {
        self.ensure_active()?;
        self.write_set.lock().push(record);
        Ok(())
    }

    /// Copy of the write-set, oldest first
    pub fn write_set(&self) -> Vec<WriteRecord> {
        self.write_set.lock().clone()
    }

    pub fn write_set_len(&self) -> usize {
        self.write_set.lock().len()
    }

    /// Most recent write record, left in place
    pub(crate) fn last_write_record(&self) -> Option<WriteRecord> {
        self.write_set.lock().last().cloned()
    }

    /// Remove the most recent write record
    pub(crate) fn pop_write_record(&self) -> Option<WriteRecord> {
        self.write_set.lock().pop()
    }

    pub(crate) fn clear_write_set(&self) {
        self.write_set.lock().clear();
    }

    pub fn holds_lock(&self, id: &LockDataId) -> bool {
        self.lock_set.lock().contains(id)
    }

    /// Snapshot of the lock-set
    pub fn lock_set(&self) -> Vec<LockDataId> {
        self.lock_set.lock().iter().copied().collect()
    }

    pub fn lock_set_len(&self) -> usize {
        self.lock_set.lock().len()
    }

    pub(crate) fn add_lock(&self, id: LockDataId) {
        self.lock_set.lock().insert(id);
    }

    pub(crate) fn remove_lock(&self, id: &LockDataId) {
        self.lock_set.lock().remove(id);
    }

    /// Record that a log record was written on behalf of this transaction
    pub fn record_lsn(&self, lsn: Lsn) {
        let _ = self.first_lsn.compare_exchange(0, lsn, Ordering::SeqCst, Ordering::SeqCst);
        self.last_lsn.store(lsn, Ordering::SeqCst);
    }

    /// Get the first LSN of this transaction
    pub fn first_lsn(&self) -> Lsn {
        self.first_lsn.load(Ordering::SeqCst)
    }

    /// Get the last LSN of this transaction
    pub fn last_lsn(&self) -> Lsn {
        self.last_lsn.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("write_set", &self.write_set_len())
            .field("lock_set", &self.lock_set_len())
            .finish()
    }
}
