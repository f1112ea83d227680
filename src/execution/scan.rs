use std::ops::Bound;
use std::sync::Arc;

use log::{debug, warn};

use crate::catalog::TableInfo;
use crate::common::types::{Iid, Rid};
use crate::execution::{Context, ExecutionError, Executor, Result, Tuple};
use crate::index::OrderedIndex;
use crate::storage::StorageError;
use crate::transaction::concurrency::{AbortReason, TransactionError, TransactionState};

/// Resolve a key range into index positions and gap-lock it.
///
/// The locked interval covers exactly the keys the bounds admit, with open
/// ends mapped to `Iid::Min` / `Iid::Max`. Positions follow key order, so the
/// lock keeps covering the same keys while other entries come and go. If
/// another transaction holds an overlapping gap the caller's transaction is
/// marked aborted.
pub fn lock_index_range(
    ctx: &Context,
    table: &TableInfo,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
) -> Result<(Iid, Iid)> {
    let info = table
        .index()
        .ok_or_else(|| ExecutionError::NoIndex(table.name().to_string()))?;
    let (start, end) = info.index.resolve_range(lower, upper);

    let txn = ctx.txn();
    if !ctx
        .lock_manager()
        .lock_gap(txn, table.table_id(), start.clone(), end.clone())?
    {
        warn!(
            "Txn {} gap [{}, {}) on {} overlaps another transaction's gap",
            txn.id(),
            start,
            end,
            table.name()
        );
        txn.set_state(TransactionState::Aborted);
        return Err(TransactionError::Aborted {
            txn_id: txn.id(),
            reason: AbortReason::GapConflict,
        }
        .into());
    }
    Ok((start, end))
}

/// Full table scan under a shared table lock
pub struct SeqScanExecutor {
    ctx: Context,
    table: Arc<TableInfo>,
    rids: Vec<Rid>,
    cursor: usize,
}

impl SeqScanExecutor {
    pub fn new(ctx: Context, table: Arc<TableInfo>) -> Self {
        Self {
            ctx,
            table,
            rids: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.ctx
            .lock_manager()
            .acquire_shared_table(self.ctx.txn(), self.table.table_id())?;
        self.rids = self.table.store().scan();
        self.cursor = 0;
        debug!("Txn {} scanning {} ({} rows)", self.ctx.txn().id(), self.table.name(), self.rids.len());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let Some(&rid) = self.rids.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let data = self.table.store().get(rid)?;
        Ok(Some(Tuple { rid, data }))
    }
}

/// Key range scan over a table's index.
///
/// The range is gap-locked before the first row is produced, and each row is
/// read under a shared record lock.
pub struct IndexScanExecutor {
    ctx: Context,
    table: Arc<TableInfo>,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    rids: Vec<Rid>,
    cursor: usize,
}

impl IndexScanExecutor {
    pub fn new(ctx: Context, table: Arc<TableInfo>, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> Self {
        Self {
            ctx,
            table,
            lower,
            upper,
            rids: Vec::new(),
            cursor: 0,
        }
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        let (lower, upper) = (as_slice_bound(&self.lower), as_slice_bound(&self.upper));
        let (start, end) = lock_index_range(&self.ctx, &self.table, lower, upper)?;

        let info = self
            .table
            .index()
            .ok_or_else(|| ExecutionError::NoIndex(self.table.name().to_string()))?;
        self.rids = info.index.rids_between(&start, &end);
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        while let Some(&rid) = self.rids.get(self.cursor) {
            self.cursor += 1;
            self.ctx
                .lock_manager()
                .acquire_shared_record(self.ctx.txn(), rid, self.table.table_id())?;
            match self.table.store().get(rid) {
                Ok(data) => return Ok(Some(Tuple { rid, data })),
                // Deleted by a transaction that finished after the range was read
                Err(StorageError::RecordNotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}
