use log::debug;

use crate::catalog::TableInfo;
use crate::common::types::Rid;
use crate::execution::{Context, Result};
use crate::index::OrderedIndex;
use crate::transaction::concurrency::{LockDataId, WriteRecord};
use crate::transaction::wal::{LogRecordContent, LogRecordType};

/// Insert `row` into `table`.
///
/// Takes IX on the table and refuses to write inside another transaction's
/// gap. The new slot is reserved and locked exclusively before the row is
/// written, so no other transaction can see it first.
pub fn insert_tuple(ctx: &Context, table: &TableInfo, row: &[u8]) -> Result<Rid> {
    let txn = ctx.txn();
    let lock_manager = ctx.lock_manager();
    let table_id = table.table_id();

    lock_manager.acquire_intention_exclusive_table(txn, table_id)?;
    if let Some(info) = table.index() {
        let position = info.index.lower_bound(info.key_of(row));
        lock_manager.check_gap_conflict(txn, table_id, &position)?;
    }

    // A free slot another transaction still locks, e.g. one freed by its
    // uncommitted delete, must stay free for that transaction's undo
    let store = table.store();
    let rid = store.reserve(&|rid| {
        lock_manager.is_locked_by_other(txn.id(), &LockDataId::record(table_id, rid))
    })?;
    if let Err(e) = lock_manager.acquire_exclusive_record(txn, rid, table_id) {
        store.cancel_reservation(rid);
        return Err(e.into());
    }
    if let Err(e) = store.insert_at(rid, row) {
        store.cancel_reservation(rid);
        return Err(e.into());
    }
    txn.append_write_record(WriteRecord::insert(table.name(), rid))?;
    if let Some(info) = table.index() {
        info.index.insert_entry(info.key_of(row), rid);
    }

    ctx.log_write(LogRecordType::Insert, LogRecordContent::insert(table_id, rid, row.to_vec()))?;
    debug!("Txn {} inserted {} into {}", txn.id(), rid, table.name());
    Ok(rid)
}

/// Delete the row at `rid`, returning its old contents
pub fn delete_tuple(ctx: &Context, table: &TableInfo, rid: Rid) -> Result<Vec<u8>> {
    let txn = ctx.txn();
    let table_id = table.table_id();
    ctx.lock_manager().acquire_exclusive_record(txn, rid, table_id)?;

    let before = table.store().get(rid)?;
    txn.append_write_record(WriteRecord::delete(table.name(), rid, before.clone()))?;
    ctx.log_write(LogRecordType::Delete, LogRecordContent::delete(table_id, rid, before.clone()))?;
    table.remove_row(rid)?;

    debug!("Txn {} deleted {} from {}", txn.id(), rid, table.name());
    Ok(before)
}

/// Overwrite the row at `rid` with `row`, returning its old contents.
///
/// Moving an indexed row to a new key is a write at the new key's position
/// and is checked against gap locks like an insert.
pub fn update_tuple(ctx: &Context, table: &TableInfo, rid: Rid, row: &[u8]) -> Result<Vec<u8>> {
    let txn = ctx.txn();
    let lock_manager = ctx.lock_manager();
    let table_id = table.table_id();
    lock_manager.acquire_exclusive_record(txn, rid, table_id)?;

    let before = table.store().get(rid)?;
    if let Some(info) = table.index() {
        if info.key_of(&before) != info.key_of(row) {
            let position = info.index.lower_bound(info.key_of(row));
            lock_manager.check_gap_conflict(txn, table_id, &position)?;
        }
    }

    txn.append_write_record(WriteRecord::update(table.name(), rid, before.clone()))?;
    ctx.log_write(
        LogRecordType::Update,
        LogRecordContent::update(table_id, rid, before.clone(), row.to_vec()),
    )?;
    table.replace_row(rid, row)?;

    debug!("Txn {} updated {} in {}", txn.id(), rid, table.name());
    Ok(before)
}

/// Read the row at `rid` under a shared record lock
pub fn read_tuple(ctx: &Context, table: &TableInfo, rid: Rid) -> Result<Vec<u8>> {
    ctx.lock_manager().acquire_shared_record(ctx.txn(), rid, table.table_id())?;
    Ok(table.store().get(rid)?)
}
