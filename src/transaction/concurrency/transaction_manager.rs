use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info};
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::catalog::Catalog;
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction::{
    Result, Transaction, TransactionError, TransactionState, WriteRecord, WriteType,
};
use crate::transaction::wal::log_record::{LogRecordContent, LogRecordType, TransactionOperationContent};
use crate::transaction::wal::LogSink;

/// Transaction manager - creates transactions and runs commit and abort
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: AtomicU32,

    lock_manager: Arc<LockManager>,

    log: Arc<dyn LogSink>,

    /// Tables that abort undoes writes against
    catalog: Arc<Catalog>,

    /// Active transactions map (txn_id -> Transaction)
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>, log: Arc<dyn LogSink>, catalog: Arc<Catalog>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1), // Start from 1
            lock_manager,
            log,
            catalog,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn log(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Begin a transaction.
    ///
    /// An existing handle is returned unchanged so a session can run several
    /// statements in one transaction.
    pub fn begin(&self, txn: Option<Arc<Transaction>>) -> Result<Arc<Transaction>> {
        if let Some(txn) = txn {
            return Ok(txn);
        }

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id));

        let lsn = self.log.append(
            txn_id,
            0,
            LogRecordType::Begin,
            LogRecordContent::Transaction(TransactionOperationContent::now()),
        )?;
        txn.record_lsn(lsn);

        self.active_transactions.lock().insert(txn_id, txn.clone());
        debug!("Began txn {}", txn_id);
        Ok(txn)
    }

    /// Commit a transaction.
    ///
    /// The write-set is dropped first, then locks and gaps are released, then
    /// the log is forced. Committing an aborted transaction is a caller bug
    /// and reported as `InvalidState`.
    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        if txn.state().is_finished() {
            return Err(TransactionError::InvalidState(txn.id()));
        }

        txn.clear_write_set();

        self.lock_manager.release_all(txn);
        self.lock_manager.release_gap_locks(txn.id());

        let lsn = self.log.append(
            txn.id(),
            txn.last_lsn(),
            LogRecordType::Commit,
            LogRecordContent::Transaction(TransactionOperationContent::now()),
        )?;
        txn.record_lsn(lsn);
        self.log.flush_to_disk()?;

        txn.set_state(TransactionState::Committed);
        self.active_transactions.lock().remove(&txn.id());
        info!("Committed txn {}", txn.id());
        Ok(())
    }

    /// Abort (roll back) a transaction.
    ///
    /// Every write is undone, newest first, before any lock is released.
    /// Transactions already marked aborted by a failed lock request take the
    /// full path; only a committed transaction is rejected. A storage error
    /// during undo is returned as is and the locks stay held.
    pub fn abort(&self, txn: &Transaction) -> Result<()> {
        if txn.state() == TransactionState::Committed {
            return Err(TransactionError::InvalidState(txn.id()));
        }

        let undone = self.rollback_writes(txn)?;
        txn.clear_write_set();

        self.lock_manager.release_all(txn);
        self.lock_manager.release_gap_locks(txn.id());

        let lsn = self.log.append(
            txn.id(),
            txn.last_lsn(),
            LogRecordType::Abort,
            LogRecordContent::Transaction(TransactionOperationContent::now()),
        )?;
        txn.record_lsn(lsn);
        self.log.flush_to_disk()?;

        txn.set_state(TransactionState::Aborted);
        self.active_transactions.lock().remove(&txn.id());
        info!("Aborted txn {} ({} writes undone)", txn.id(), undone);
        Ok(())
    }

    /// Undo newest first. An entry leaves the write-set only once its undo
    /// succeeded, so a failed abort can be retried.
    fn rollback_writes(&self, txn: &Transaction) -> Result<usize> {
        let mut undone = 0;
        while let Some(record) = txn.last_write_record() {
            self.undo(&record)?;
            txn.pop_write_record();
            undone += 1;
        }
        Ok(undone)
    }

    /// Restore the exact slot a write touched, along with its index entry
    fn undo(&self, record: &WriteRecord) -> Result<()> {
        let table = self
            .catalog
            .get_table(&record.table_name)
            .ok_or_else(|| TransactionError::UnknownTable(record.table_name.clone()))?;

        match (record.write_type, &record.before_image) {
            (WriteType::InsertTuple, _) => {
                table.remove_row(record.rid)?;
            }
            (WriteType::DeleteTuple, Some(before)) => table.restore_row(record.rid, before)?,
            (WriteType::UpdateTuple, Some(before)) => {
                table.replace_row(record.rid, before)?;
            }
            (_, None) => {
                return Err(TransactionError::MissingBeforeImage {
                    table_name: record.table_name.clone(),
                    rid: record.rid,
                });
            }
        }
        debug!("Undid {:?} at {} in {}", record.write_type, record.rid, record.table_name);
        Ok(())
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    /// Check if a transaction exists
    pub fn transaction_exists(&self, txn_id: TxnId) -> bool {
        self.active_transactions.lock().contains_key(&txn_id)
    }

    /// Get all active transaction IDs
    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self.active_transactions.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
