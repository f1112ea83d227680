use std::sync::Arc;

use crate::common::types::Lsn;
use crate::transaction::concurrency::{LockManager, Transaction, TransactionManager};
use crate::transaction::wal::{LogRecordContent, LogRecordType, LogSink, Result};

/// What an executor needs to run on behalf of one transaction
#[derive(Clone)]
pub struct Context {
    lock_manager: Arc<LockManager>,
    txn: Arc<Transaction>,
    log: Arc<dyn LogSink>,
}

impl Context {
    pub fn new(lock_manager: Arc<LockManager>, txn: Arc<Transaction>, log: Arc<dyn LogSink>) -> Self {
        Self {
            lock_manager,
            txn,
            log,
        }
    }

    /// Context for `txn` sharing the manager's lock manager and log
    pub fn for_transaction(manager: &TransactionManager, txn: Arc<Transaction>) -> Self {
        Self::new(manager.lock_manager().clone(), txn, manager.log().clone())
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn txn(&self) -> &Transaction {
        &self.txn
    }

    pub fn txn_handle(&self) -> &Arc<Transaction> {
        &self.txn
    }

    /// Append a data record chained to the transaction's previous one
    pub fn log_write(&self, record_type: LogRecordType, content: LogRecordContent) -> Result<Lsn> {
        let lsn = self.log.append(self.txn.id(), self.txn.last_lsn(), record_type, content)?;
        self.txn.record_lsn(lsn);
        Ok(lsn)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("txn", &self.txn).finish()
    }
}
