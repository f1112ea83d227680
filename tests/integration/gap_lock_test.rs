use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessdb::{AbortReason, Iid, LockManager, Transaction, TransactionError, TransactionState};

const TABLE: u32 = 1;

fn p(n: u32) -> Iid {
    Iid::before(&n.to_be_bytes())
}

#[test]
fn test_adjacent_gaps_coexist_and_overlap_is_rejected() {
    let lm = LockManager::new();
    let (a, b, c) = (Transaction::new(1), Transaction::new(2), Transaction::new(3));

    assert!(lm.lock_gap(&a, TABLE, p(1), p(5)).unwrap());
    assert!(lm.lock_gap(&b, TABLE, p(5), p(9)).unwrap());
    assert!(!lm.lock_gap(&c, TABLE, p(2), p(6)).unwrap());

    // a rejected gap does not abort the scanner
    assert_eq!(c.state(), TransactionState::Growing);
    assert_eq!(lm.gap_locks(TABLE).len(), 2);
}

#[test]
fn test_same_transaction_gaps_never_conflict() {
    let lm = LockManager::new();
    let a = Transaction::new(1);
    assert!(lm.lock_gap(&a, TABLE, p(0), p(10)).unwrap());
    assert!(lm.lock_gap(&a, TABLE, p(3), p(4)).unwrap());
    assert!(lm.lock_gap(&a, TABLE, Iid::Min, Iid::Max).unwrap());
    assert_eq!(lm.gap_lock_count(1), 3);
}

#[test]
fn test_gaps_on_different_tables_are_independent() {
    let lm = LockManager::new();
    let (a, b) = (Transaction::new(1), Transaction::new(2));
    assert!(lm.lock_gap(&a, TABLE, Iid::Min, Iid::Max).unwrap());
    assert!(lm.lock_gap(&b, TABLE + 1, Iid::Min, Iid::Max).unwrap());
}

#[test]
fn test_write_inside_foreign_gap_aborts_writer() {
    let lm = LockManager::new();
    let (scanner, writer) = (Transaction::new(1), Transaction::new(2));
    assert!(lm.lock_gap(&scanner, TABLE, p(2), p(6)).unwrap());

    // the owner may write into its own gap
    lm.check_gap_conflict(&scanner, TABLE, &p(3)).unwrap();

    // the end of the interval is outside it
    lm.check_gap_conflict(&writer, TABLE, &p(6)).unwrap();
    lm.check_gap_conflict(&writer, TABLE, &p(1)).unwrap();

    match lm.check_gap_conflict(&writer, TABLE, &p(2)) {
        Err(TransactionError::Aborted { txn_id, reason }) => {
            assert_eq!(txn_id, 2);
            assert_eq!(reason, AbortReason::GapConflict);
        }
        other => panic!("Expected GapConflict, got {:?}", other),
    }
    assert!(writer.is_aborted());
}

#[test]
fn test_release_frees_the_range() {
    let lm = LockManager::new();
    let (a, b) = (Transaction::new(1), Transaction::new(2));
    assert!(lm.lock_gap(&a, TABLE, p(0), p(8)).unwrap());
    assert!(!lm.lock_gap(&b, TABLE, p(4), p(12)).unwrap());

    lm.release_gap_locks(1);
    assert_eq!(lm.gap_lock_count(1), 0);
    assert!(lm.lock_gap(&b, TABLE, p(4), p(12)).unwrap());
    lm.check_gap_conflict(&a, TABLE, &p(2)).unwrap();
}

#[test]
fn test_pairwise_grant_matches_interval_overlap() {
    let mut rng = StdRng::seed_from_u64(0x6a9);
    for _ in 0..500 {
        let lm = LockManager::new();
        let (a, b) = (Transaction::new(1), Transaction::new(2));

        let (s1, len1) = (rng.gen_range(0..20), rng.gen_range(1..8));
        let (s2, len2) = (rng.gen_range(0..20), rng.gen_range(1..8));
        let (e1, e2) = (s1 + len1, s2 + len2);

        assert!(lm.lock_gap(&a, TABLE, p(s1), p(e1)).unwrap());
        let overlaps = s1 < e2 && s2 < e1;
        assert_eq!(
            lm.lock_gap(&b, TABLE, p(s2), p(e2)).unwrap(),
            !overlaps,
            "[{}, {}) vs [{}, {})",
            s1,
            e1,
            s2,
            e2
        );
    }
}

#[test]
fn test_closed_range_ends_past_its_last_key() {
    let lm = LockManager::new();
    let (a, b, writer) = (Transaction::new(1), Transaction::new(2), Transaction::new(3));
    let k = |n: u32| n.to_be_bytes();

    // [k10, k20] and (k20, k30] share no key
    assert!(lm.lock_gap(&a, TABLE, Iid::before(&k(10)), Iid::after(&k(20))).unwrap());
    assert!(lm.lock_gap(&b, TABLE, Iid::after(&k(20)), Iid::after(&k(30))).unwrap());

    lm.check_gap_conflict(&writer, TABLE, &Iid::before(&k(9))).unwrap();
    lm.check_gap_conflict(&writer, TABLE, &Iid::before(&k(31))).unwrap();
    let err = lm.check_gap_conflict(&writer, TABLE, &Iid::before(&k(20))).unwrap_err();
    assert_eq!(err.abort_reason(), Some(AbortReason::GapConflict));
}
