use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessdb::execution;
use tessdb::transaction::concurrency::{LockDataId, LockMode};
use tessdb::{GroupLockMode, Iid, LockManager, Rid, Transaction};

#[path = "../common/mod.rs"]
mod common;

use common::{create_test_db, payload, row, table_config};

const THREADS: u64 = 8;

/// Read-modify-write increments under no-wait locking: every committed
/// increment is visible and every aborted one is rolled back
#[test]
fn test_concurrent_increments_are_serialized() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("counters", table_config())?;

    let (setup, ctx) = db.begin()?;
    let rids: Vec<Rid> = (0..4)
        .map(|k| execution::insert_tuple(&ctx, &table, &row(k, 0)))
        .collect::<std::result::Result<_, _>>()?;
    db.tm.commit(&setup)?;

    let committed: Vec<AtomicU32> = rids.iter().map(|_| AtomicU32::new(0)).collect();

    crossbeam::scope(|s| {
        for worker in 0..THREADS {
            let (db, table, rids, committed) = (&db, &table, &rids, &committed);
            s.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(worker);
                for _ in 0..200 {
                    let slot = rng.gen_range(0..rids.len());
                    let rid = rids[slot];
                    let (txn, ctx) = db.begin().unwrap();

                    let outcome = execution::read_tuple(&ctx, table, rid).and_then(|current| {
                        let next = row(slot as u32, payload(&current) + 1);
                        execution::update_tuple(&ctx, table, rid, &next)
                    });
                    match outcome {
                        Ok(_) => {
                            db.tm.commit(&txn).unwrap();
                            committed[slot].fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            assert!(e.abort_reason().is_some(), "unexpected error {}", e);
                            assert!(txn.is_aborted());
                            db.tm.abort(&txn).unwrap();
                        }
                    }
                }
            });
        }
    })
    .unwrap();

    for (slot, rid) in rids.iter().enumerate() {
        assert_eq!(payload(&table.store().get(*rid)?), committed[slot].load(Ordering::SeqCst));
    }
    assert!(committed.iter().map(|c| c.load(Ordering::SeqCst)).sum::<u32>() > 0);
    assert_eq!(db.lm.locked_resource_count(), 0);
    assert!(db.tm.active_transaction_ids().is_empty());
    Ok(())
}

/// Granted table locks of concurrently live transactions are always pairwise
/// compatible, and everything drains once they finish
#[test]
fn test_random_table_locks_stay_compatible() {
    let lm = LockManager::new();
    let next_id = AtomicU32::new(1);
    let tables = 3u32;

    crossbeam::scope(|s| {
        for worker in 0..THREADS {
            let (lm, next_id) = (&lm, &next_id);
            s.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(100 + worker);
                for _ in 0..300 {
                    let txn = Transaction::new(next_id.fetch_add(1, Ordering::SeqCst));
                    for _ in 0..3 {
                        let table = rng.gen_range(0..tables);
                        let mode = LockMode::ALL[rng.gen_range(0..LockMode::ALL.len())];
                        let id = LockDataId::table(table);
                        if lm.acquire(&txn, id, mode).is_err() {
                            assert!(txn.is_aborted());
                            break;
                        }
                        let requests = lm.requests(&id);
                        for a in &requests {
                            for b in &requests {
                                if a.txn_id != b.txn_id {
                                    assert!(a.lock_mode.is_compatible_with(b.lock_mode));
                                }
                            }
                        }
                    }
                    lm.release_all(&txn);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(lm.locked_resource_count(), 0);
    for table in 0..tables {
        assert_eq!(lm.group_lock_mode(&LockDataId::table(table)), GroupLockMode::NonLock);
    }
}

/// Gap locks granted to different live transactions never overlap
#[test]
fn test_concurrent_gap_locks_never_overlap() {
    let lm = LockManager::new();
    let txns: Vec<Transaction> = (1..=THREADS as u32).map(Transaction::new).collect();

    crossbeam::scope(|s| {
        for (worker, txn) in txns.iter().enumerate() {
            let lm = &lm;
            s.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(200 + worker as u64);
                for _ in 0..50 {
                    let start: u32 = rng.gen_range(0..200);
                    let len = rng.gen_range(1..6);
                    let (lo, hi) = (start.to_be_bytes(), (start + len).to_be_bytes());
                    lm.lock_gap(txn, 9, Iid::before(&lo), Iid::before(&hi)).unwrap();
                }
            });
        }
    })
    .unwrap();

    let gaps = lm.gap_locks(9);
    for a in &gaps {
        for b in &gaps {
            if a.txn_id != b.txn_id {
                assert!(!a.overlaps(&b.start, &b.end), "{:?} overlaps {:?}", a, b);
            }
        }
    }
    for txn in &txns {
        lm.release_gap_locks(txn.id());
    }
    assert!(lm.gap_locks(9).is_empty());
}
