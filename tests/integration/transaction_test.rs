use std::ops::Bound;
use std::sync::Arc;

use anyhow::Result;
use tessdb::execution::{self, Executor, IndexScanExecutor, SeqScanExecutor};
use tessdb::transaction::wal::LogRecordType;
use tessdb::{AbortReason, GroupLockMode, LockDataId, TransactionError, TransactionState};

#[path = "../common/mod.rs"]
mod common;

use common::{create_test_db, key, payload, row, table_config};

#[test]
fn test_abort_removes_inserted_row() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;

    let (txn, ctx) = db.begin()?;
    let rid = execution::insert_tuple(&ctx, &table, &row(1, 10))?;
    assert!(table.store().contains(rid));

    db.tm.abort(&txn)?;
    assert!(!table.store().contains(rid));
    assert_eq!(txn.lock_set_len(), 0);
    assert_eq!(txn.state(), TransactionState::Aborted);
    Ok(())
}

#[test]
fn test_abort_restores_deleted_row_in_place() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;
    let (setup, ctx) = db.begin()?;
    let rid = execution::insert_tuple(&ctx, &table, &row(1, 10))?;
    db.tm.commit(&setup)?;

    let (txn, ctx) = db.begin()?;
    let before = execution::delete_tuple(&ctx, &table, rid)?;
    // the freed slot is handed to the next insert of the same transaction
    let reused = execution::insert_tuple(&ctx, &table, &row(2, 20))?;
    assert_eq!(reused, rid);

    db.tm.abort(&txn)?;
    assert_eq!(table.store().get(rid)?, before);
    assert_eq!(table.store().scan(), vec![rid]);
    assert_eq!(txn.lock_set_len(), 0);
    Ok(())
}

#[test]
fn test_abort_restores_updated_row() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;
    let (setup, ctx) = db.begin()?;
    let rid = execution::insert_tuple(&ctx, &table, &row(1, 10))?;
    db.tm.commit(&setup)?;

    let (txn, ctx) = db.begin()?;
    execution::update_tuple(&ctx, &table, rid, &row(1, 11))?;
    execution::update_tuple(&ctx, &table, rid, &row(1, 12))?;
    assert_eq!(payload(&table.store().get(rid)?), 12);

    db.tm.abort(&txn)?;
    assert_eq!(table.store().get(rid)?, row(1, 10));
    assert_eq!(txn.lock_set_len(), 0);
    Ok(())
}

#[test]
fn test_abort_puts_index_back() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_indexed_table("t", table_config(), 0, 4)?;
    let index = table.index().expect("indexed table").index.clone();

    let (setup, ctx) = db.begin()?;
    let a = execution::insert_tuple(&ctx, &table, &row(10, 0))?;
    let b = execution::insert_tuple(&ctx, &table, &row(20, 0))?;
    db.tm.commit(&setup)?;

    let (txn, ctx) = db.begin()?;
    execution::update_tuple(&ctx, &table, a, &row(15, 0))?;
    execution::delete_tuple(&ctx, &table, b)?;
    execution::insert_tuple(&ctx, &table, &row(30, 0))?;
    assert_eq!(index.range(&key(0), &key(99)).len(), 2);

    db.tm.abort(&txn)?;
    assert_eq!(index.range(&key(10), &key(10)), vec![a]);
    assert_eq!(index.range(&key(20), &key(20)), vec![b]);
    assert!(index.range(&key(11), &key(19)).is_empty());
    assert!(index.range(&key(21), &key(99)).is_empty());
    assert_eq!(index.range(&key(0), &key(99)), vec![a, b]);
    Ok(())
}

#[test]
fn test_commit_clears_state_then_flushes() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;

    let (txn, ctx) = db.begin()?;
    execution::insert_tuple(&ctx, &table, &row(1, 1))?;
    execution::insert_tuple(&ctx, &table, &row(2, 2))?;
    assert!(db.log.read_all()?.is_empty());

    db.tm.commit(&txn)?;
    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(txn.write_set_len(), 0);
    assert_eq!(txn.lock_set_len(), 0);
    assert_eq!(db.lm.locked_resource_count(), 0);
    assert_eq!(db.log.flushed_lsn(), txn.last_lsn());

    let types: Vec<LogRecordType> = db
        .log
        .read_all()?
        .into_iter()
        .filter(|record| record.txn_id == txn.id())
        .map(|record| record.record_type)
        .collect();
    assert_eq!(
        types,
        vec![LogRecordType::Begin, LogRecordType::Insert, LogRecordType::Insert, LogRecordType::Commit]
    );
    Ok(())
}

#[test]
fn test_reader_blocks_writer_until_commit() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;
    let id = LockDataId::table(table.table_id());

    let (a, _) = db.begin()?;
    let (b, _) = db.begin()?;
    db.lm.acquire_shared_table(&a, table.table_id())?;

    match db.lm.acquire_exclusive_table(&b, table.table_id()) {
        Err(TransactionError::Aborted { reason, .. }) => assert_eq!(reason, AbortReason::DeadlockPrevention),
        other => panic!("Expected abort, got {:?}", other),
    }
    assert_eq!(b.state(), TransactionState::Aborted);
    assert_eq!(a.lock_set_len(), 1);
    db.tm.abort(&b)?;

    db.tm.commit(&a)?;
    assert_eq!(db.lm.group_lock_mode(&id), GroupLockMode::NonLock);
    Ok(())
}

#[test]
fn test_registry_tracks_only_live_transactions() -> Result<()> {
    let db = create_test_db()?;
    let (a, _) = db.begin()?;
    let (b, _) = db.begin()?;
    let (c, _) = db.begin()?;
    assert_eq!(db.tm.active_transaction_ids(), vec![a.id(), b.id(), c.id()]);

    db.tm.commit(&a)?;
    db.tm.abort(&b)?;
    assert_eq!(db.tm.active_transaction_ids(), vec![c.id()]);
    assert!(db.tm.get_transaction(a.id()).is_none());
    assert!(Arc::ptr_eq(&db.tm.get_transaction(c.id()).expect("live"), &c));
    Ok(())
}

#[test]
fn test_multi_statement_session_reuses_transaction() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;
    let (txn, ctx) = db.begin()?;
    execution::insert_tuple(&ctx, &table, &row(1, 1))?;

    let same = db.tm.begin(Some(txn.clone()))?;
    assert!(Arc::ptr_eq(&txn, &same));
    execution::insert_tuple(&ctx, &table, &row(2, 2))?;
    assert_eq!(same.write_set_len(), 2);
    db.tm.commit(&same)?;
    Ok(())
}

#[test]
fn test_phantom_insert_aborts_and_rolls_back() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_indexed_table("t", table_config(), 0, 4)?;
    let (setup, ctx) = db.begin()?;
    for k in [10, 20, 30, 40] {
        execution::insert_tuple(&ctx, &table, &row(k, 0))?;
    }
    db.tm.commit(&setup)?;

    let (scanner, scan_ctx) = db.begin()?;
    let mut scan = IndexScanExecutor::new(
        scan_ctx,
        table.clone(),
        Bound::Included(key(20)),
        Bound::Excluded(key(40)),
    );
    assert_eq!(scan.collect_tuples()?.len(), 2);

    let (writer, ctx) = db.begin()?;
    let kept = execution::insert_tuple(&ctx, &table, &row(5, 0))?;
    let err = execution::insert_tuple(&ctx, &table, &row(25, 0)).unwrap_err();
    assert_eq!(err.abort_reason(), Some(AbortReason::GapConflict));
    assert!(writer.is_aborted());

    db.tm.abort(&writer)?;
    assert!(!table.store().contains(kept));
    assert_eq!(table.store().scan().len(), 4);

    db.tm.commit(&scanner)?;
    let (_, ctx) = db.begin()?;
    execution::insert_tuple(&ctx, &table, &row(25, 0))?;
    Ok(())
}

#[test]
fn test_seq_scan_sees_committed_rows() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", table_config())?;
    let (setup, ctx) = db.begin()?;
    for k in 0..20 {
        execution::insert_tuple(&ctx, &table, &row(k, k))?;
    }
    db.tm.commit(&setup)?;

    let (txn, ctx) = db.begin()?;
    let rows = SeqScanExecutor::new(ctx, table.clone()).collect_tuples()?;
    assert_eq!(rows.len(), 20);
    assert!(rows.iter().all(|t| payload(&t.data) == u32::from_be_bytes([t.data[0], t.data[1], t.data[2], t.data[3]])));
    db.tm.commit(&txn)?;
    Ok(())
}

#[test]
fn test_commit_of_aborted_transaction_is_an_error() -> Result<()> {
    let db = create_test_db()?;
    let (txn, _) = db.begin()?;
    db.tm.abort(&txn)?;
    assert!(matches!(db.tm.commit(&txn), Err(TransactionError::InvalidState(_))));
    assert!(matches!(db.tm.abort(&txn), Ok(())));
    Ok(())
}
