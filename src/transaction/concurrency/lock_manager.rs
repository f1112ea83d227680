// TessDB Lock Manager
//
// Table and record locks under the multi-granularity protocol with a no-wait
// policy: a request is either granted on the spot or its transaction is
// marked aborted. Nothing ever queues behind a conflicting holder.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::types::{Iid, Rid, TableId, TxnId};
use crate::transaction::concurrency::gap_lock::{GapLock, GapLockTable};
use crate::transaction::concurrency::lock_mode::{GroupLockMode, LockMode};
use crate::transaction::concurrency::transaction::{
    AbortReason, Result, Transaction, TransactionError, TransactionState,
};

/// Granularity of a lockable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockDataType {
    Table,
    Record,
}

/// Identifies a lockable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockDataId {
    pub table_id: TableId,
    pub data_type: LockDataType,
    pub rid: Option<Rid>,
}

impl LockDataId {
    pub fn table(table_id: TableId) -> Self {
        Self {
            table_id,
            data_type: LockDataType::Table,
            rid: None,
        }
    }

    pub fn record(table_id: TableId, rid: Rid) -> Self {
        Self {
            table_id,
            data_type: LockDataType::Record,
            rid: Some(rid),
        }
    }

    /// The table-level resource a record belongs to
    pub fn parent(&self) -> LockDataId {
        LockDataId::table(self.table_id)
    }
}

impl fmt::Display for LockDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rid {
            Some(rid) => write!(f, "record {} of table {}", rid, self.table_id),
            None => write!(f, "table {}", self.table_id),
        }
    }
}

/// One transaction's request on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub txn_id: TxnId,
    pub lock_mode: LockMode,
    pub granted: bool,
}

impl LockRequest {
    fn granted(txn_id: TxnId, lock_mode: LockMode) -> Self {
        Self {
            txn_id,
            lock_mode,
            granted: true,
        }
    }
}

/// Requests on a single resource plus their aggregate mode
#[derive(Debug, Clone)]
pub struct LockRequestQueue {
    requests: Vec<LockRequest>,
    group_lock_mode: GroupLockMode,
}

impl Default for LockRequestQueue {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            group_lock_mode: GroupLockMode::NonLock,
        }
    }
}

impl LockRequestQueue {
    pub fn requests(&self) -> &[LockRequest] {
        &self.requests
    }

    pub fn group_lock_mode(&self) -> GroupLockMode {
        self.group_lock_mode
    }

    fn position(&self, txn_id: TxnId) -> Option<usize> {
        self.requests.iter().position(|req| req.txn_id == txn_id)
    }

    /// First granted request of another transaction that `mode` cannot coexist with
    fn conflicting_holder(&self, txn_id: TxnId, mode: LockMode) -> Option<&LockRequest> {
        self.requests
            .iter()
            .filter(|req| req.granted && req.txn_id != txn_id)
            .find(|req| !req.lock_mode.is_compatible_with(mode))
    }

    /// Fold the join over every granted request. Modes do not decompose, so
    /// removal or upgrade always recomputes from scratch.
    fn recompute_group_mode(&mut self) {
        self.group_lock_mode = self
            .requests
            .iter()
            .filter(|req| req.granted)
            .fold(GroupLockMode::NonLock, |group, req| group.join(req.lock_mode));
    }
}

/// Lock manager - table/record locks and the gap lock table
#[derive(Debug, Default)]
pub struct LockManager {
    lock_table: Mutex<HashMap<LockDataId, LockRequestQueue>>,
    gap_lock_table: GapLockTable,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `mode` on `id` for `txn`.
    ///
    /// Record requests first take the matching intention lock on the parent
    /// table. On conflict the transaction is marked aborted and an
    /// `Aborted` error carrying the reason is returned.
    pub fn acquire(&self, txn: &Transaction, id: LockDataId, mode: LockMode) -> Result<()> {
        txn.ensure_active()?;

        if id.data_type == LockDataType::Record {
            if !matches!(mode, LockMode::Shared | LockMode::Exclusive) {
                return Err(TransactionError::InvalidRecordLockMode { mode });
            }
            self.lock_resource(txn, id.parent(), mode.intention())?;
        }

        self.lock_resource(txn, id, mode)
    }

    fn lock_resource(&self, txn: &Transaction, id: LockDataId, mode: LockMode) -> Result<()> {
        let txn_id = txn.id();
        let mut lock_table = self.lock_table.lock();
        let queue = lock_table.entry(id).or_default();

        if let Some(pos) = queue.position(txn_id) {
            let held = queue.requests[pos].lock_mode;
            if held.covers(mode) {
                return Ok(());
            }

            let upgraded = held.join(mode);
            if let Some(holder) = queue.conflicting_holder(txn_id, upgraded) {
                warn!(
                    "Txn {} cannot upgrade {} -> {} on {}: txn {} holds {}",
                    txn_id, held, upgraded, id, holder.txn_id, holder.lock_mode
                );
                return Err(Self::abort(txn, AbortReason::UpgradeConflict));
            }

            queue.requests[pos].lock_mode = upgraded;
            queue.recompute_group_mode();
            debug!("Txn {} upgraded {} -> {} on {}", txn_id, held, upgraded, id);
            return Ok(());
        }

        if let Some(holder) = queue.conflicting_holder(txn_id, mode) {
            warn!(
                "Txn {} requested {} on {} held by txn {} in {}",
                txn_id, mode, id, holder.txn_id, holder.lock_mode
            );
            return Err(Self::abort(txn, AbortReason::DeadlockPrevention));
        }

        queue.requests.push(LockRequest::granted(txn_id, mode));
        queue.group_lock_mode = queue.group_lock_mode.join(mode);
        txn.add_lock(id);
        debug!("Txn {} granted {} on {} (group {})", txn_id, mode, id, queue.group_lock_mode);
        Ok(())
    }

    fn abort(txn: &Transaction, reason: AbortReason) -> TransactionError {
        txn.set_state(TransactionState::Aborted);
        TransactionError::Aborted {
            txn_id: txn.id(),
            reason,
        }
    }

    pub fn acquire_shared_record(&self, txn: &Transaction, rid: Rid, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::record(table_id, rid), LockMode::Shared)
    }

    pub fn acquire_exclusive_record(&self, txn: &Transaction, rid: Rid, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::record(table_id, rid), LockMode::Exclusive)
    }

    pub fn acquire_shared_table(&self, txn: &Transaction, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::table(table_id), LockMode::Shared)
    }

    pub fn acquire_exclusive_table(&self, txn: &Transaction, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::table(table_id), LockMode::Exclusive)
    }

    pub fn acquire_intention_shared_table(&self, txn: &Transaction, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::table(table_id), LockMode::IntentionShared)
    }

    pub fn acquire_intention_exclusive_table(&self, txn: &Transaction, table_id: TableId) -> Result<()> {
        self.acquire(txn, LockDataId::table(table_id), LockMode::IntentionExclusive)
    }

    /// Remove `txn`'s request on `id`
    pub fn release(&self, txn: &Transaction, id: LockDataId) {
        let mut lock_table = self.lock_table.lock();
        let drained = match lock_table.get_mut(&id) {
            Some(queue) => {
                if let Some(pos) = queue.position(txn.id()) {
                    queue.requests.remove(pos);
                    debug!("Txn {} released {}", txn.id(), id);
                }
                queue.recompute_group_mode();
                queue.requests.is_empty()
            }
            None => false,
        };
        // An empty queue is dropped from the table; its group mode reads as NonLock
        if drained {
            lock_table.remove(&id);
        }
        txn.remove_lock(&id);
    }

    /// Release every lock in `txn`'s lock-set. No other transaction can be
    /// waiting on any of them, so the order does not matter.
    pub fn release_all(&self, txn: &Transaction) {
        for id in txn.lock_set() {
            self.release(txn, id);
        }
    }

    /// Current group mode of a resource; `NonLock` when nobody holds it
    pub fn group_lock_mode(&self, id: &LockDataId) -> GroupLockMode {
        self.lock_table
            .lock()
            .get(id)
            .map(|queue| queue.group_lock_mode())
            .unwrap_or(GroupLockMode::NonLock)
    }

    /// Snapshot of the requests on a resource
    pub fn requests(&self, id: &LockDataId) -> Vec<LockRequest> {
        self.lock_table
            .lock()
            .get(id)
            .map(|queue| queue.requests().to_vec())
            .unwrap_or_default()
    }

    /// Mode `txn_id` holds on `id`, if any
    pub fn held_mode(&self, txn_id: TxnId, id: &LockDataId) -> Option<LockMode> {
        self.lock_table
            .lock()
            .get(id)
            .and_then(|queue| queue.position(txn_id).map(|pos| queue.requests[pos].lock_mode))
    }

    /// True if a transaction other than `txn_id` holds a lock on `id`
    pub fn is_locked_by_other(&self, txn_id: TxnId, id: &LockDataId) -> bool {
        self.lock_table
            .lock()
            .get(id)
            .is_some_and(|queue| queue.requests.iter().any(|req| req.txn_id != txn_id))
    }

    /// Number of resources with at least one request
    pub fn locked_resource_count(&self) -> usize {
        self.lock_table.lock().len()
    }

    /// Lock the index range `[start, end)` of a table for `txn`.
    ///
    /// Returns false if another transaction holds an overlapping gap. The
    /// transaction is left untouched; the scanning caller decides whether to
    /// abort.
    pub fn lock_gap(&self, txn: &Transaction, table_id: TableId, start: Iid, end: Iid) -> Result<bool> {
        txn.ensure_active()?;
        Ok(self.gap_lock_table.lock_gap(txn.id(), table_id, start, end))
    }

    /// Abort `txn` if writing at `position` would land inside another
    /// transaction's gap on `table_id`
    pub fn check_gap_conflict(&self, txn: &Transaction, table_id: TableId, position: &Iid) -> Result<()> {
        txn.ensure_active()?;
        if self.gap_lock_table.check_conflict(txn.id(), table_id, position) {
            warn!("Txn {} write at {} on table {} falls inside a gap lock", txn.id(), position, table_id);
            return Err(Self::abort(txn, AbortReason::GapConflict));
        }
        Ok(())
    }

    /// Drop every gap lock held by `txn_id`
    pub fn release_gap_locks(&self, txn_id: TxnId) {
        self.gap_lock_table.release_all(txn_id);
    }

    pub fn gap_locks(&self, table_id: TableId) -> Vec<GapLock> {
        self.gap_lock_table.gaps(table_id)
    }

    pub fn gap_lock_count(&self, txn_id: TxnId) -> usize {
        self.gap_lock_table.gap_count(txn_id)
    }
}
