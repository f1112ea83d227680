// Key-range (gap) locks guarding index ranges against phantom inserts

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Iid, TableId, TxnId};

/// A gap lock held by one transaction on `[start, end)` of a table's index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapLock {
    pub txn_id: TxnId,
    pub start: Iid,
    pub end: Iid,
}

impl GapLock {
    pub fn new(txn_id: TxnId, start: Iid, end: Iid) -> Self {
        Self { txn_id, start, end }
    }

    /// A range whose end does not lie past its start covers no key
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Intervals sharing only an endpoint do not overlap, nor do empty ones
    pub fn overlaps(&self, start: &Iid, end: &Iid) -> bool {
        !self.is_empty() && start < end && self.start < *end && *start < self.end
    }

    pub fn contains(&self, position: &Iid) -> bool {
        self.start <= *position && *position < self.end
    }
}

/// Per-table lists of active gap locks
#[derive(Debug, Default)]
pub struct GapLockTable {
    gap_locks: Mutex<HashMap<TableId, Vec<GapLock>>>,
}

impl GapLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to lock `[start, end)` on `table_id` for `txn_id`.
    ///
    /// Returns false when the range overlaps a gap held by another
    /// transaction. Gaps of the same transaction may overlap freely.
    pub fn lock_gap(&self, txn_id: TxnId, table_id: TableId, start: Iid, end: Iid) -> bool {
        let gap = GapLock::new(txn_id, start, end);
        let mut gap_locks = self.gap_locks.lock();
        let gaps = gap_locks.entry(table_id).or_default();

        if let Some(held) = gaps
            .iter()
            .find(|held| held.txn_id != txn_id && held.overlaps(&gap.start, &gap.end))
        {
            debug!(
                "Gap [{}, {}) on table {} for txn {} overlaps txn {}'s [{}, {})",
                gap.start, gap.end, table_id, txn_id, held.txn_id, held.start, held.end
            );
            return false;
        }

        debug!("Txn {} locked gap [{}, {}) on table {}", txn_id, gap.start, gap.end, table_id);
        gaps.push(gap);
        true
    }

    /// True iff `position` lies inside a gap held by a transaction other than `txn_id`
    pub fn check_conflict(&self, txn_id: TxnId, table_id: TableId, position: &Iid) -> bool {
        let gap_locks = self.gap_locks.lock();
        gap_locks
            .get(&table_id)
            .map(|gaps| gaps.iter().any(|gap| gap.txn_id != txn_id && gap.contains(position)))
            .unwrap_or(false)
    }

    /// Drop every gap owned by `txn_id`
    pub fn release_all(&self, txn_id: TxnId) {
        let mut gap_locks = self.gap_locks.lock();
        gap_locks.retain(|_, gaps| {
            gaps.retain(|gap| gap.txn_id != txn_id);
            !gaps.is_empty()
        });
    }

    /// Gaps currently held on a table
    pub fn gaps(&self, table_id: TableId) -> Vec<GapLock> {
        self.gap_locks.lock().get(&table_id).cloned().unwrap_or_default()
    }

    pub fn gap_count(&self, txn_id: TxnId) -> usize {
        self.gap_locks
            .lock()
            .values()
            .flat_map(|gaps| gaps.iter())
            .filter(|gap| gap.txn_id == txn_id)
            .count()
    }
}
