use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{debug, info, warn};

use tessdb::execution::{self, Context, Executor, IndexScanExecutor};
use tessdb::{
    AbortReason, Catalog, LockManager, LogManager, LogManagerConfig, TableHeapConfig, TableInfo,
    TransactionManager,
};

/// Runs concurrent no-wait transactions against in-memory tables and reports
/// how many committed and why the rest aborted
#[derive(Parser)]
#[command(author, version, about = "TessDB lock manager demo")]
struct Args {
    /// Log directory path
    #[arg(short, long, default_value = "logs")]
    log_dir: PathBuf,

    /// Worker threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Transactions per worker
    #[arg(long, default_value_t = 100)]
    txns: usize,

    /// Number of tables
    #[arg(long, default_value_t = 2)]
    tables: usize,

    /// Rows seeded into each table
    #[arg(long, default_value_t = 64)]
    records: u32,
}

#[derive(Default)]
struct Stats {
    committed: AtomicUsize,
    deadlock_prevention: AtomicUsize,
    upgrade_conflict: AtomicUsize,
    gap_conflict: AtomicUsize,
}

impl Stats {
    fn record_abort(&self, reason: AbortReason) {
        let counter = match reason {
            AbortReason::DeadlockPrevention => &self.deadlock_prevention,
            AbortReason::UpgradeConflict => &self.upgrade_conflict,
            AbortReason::GapConflict => &self.gap_conflict,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

const ROW_SIZE: usize = 16;

fn row(key: u32, payload: u64) -> Vec<u8> {
    let mut row = Vec::with_capacity(ROW_SIZE);
    row.extend_from_slice(&key.to_be_bytes());
    row.extend_from_slice(&payload.to_le_bytes());
    row.extend_from_slice(&[0; 4]);
    row
}

/// One transaction's worth of work; which statement runs is picked from `seed`
fn run_statements(ctx: &Context, table: &Arc<TableInfo>, seed: u64, records: u32) -> execution::Result<()> {
    let key = (seed % u64::from(records.max(1))) as u32;
    match seed % 4 {
        0 => {
            let lower = key.to_be_bytes().to_vec();
            let upper = (key + 4).to_be_bytes().to_vec();
            let mut scan = IndexScanExecutor::new(
                ctx.clone(),
                table.clone(),
                std::ops::Bound::Included(lower),
                std::ops::Bound::Included(upper),
            );
            let rows = scan.collect_tuples()?;
            debug!("Txn {} read {} rows", ctx.txn().id(), rows.len());
        }
        1 => {
            execution::insert_tuple(ctx, table, &row(records + key, seed))?;
        }
        _ => {
            let rids = table.store().scan();
            if let Some(&rid) = rids.get(key as usize % rids.len().max(1)) {
                let current = execution::read_tuple(ctx, table, rid)?;
                let mut updated = current.clone();
                updated[4..12].copy_from_slice(&seed.to_le_bytes());
                execution::update_tuple(ctx, table, rid, &updated)?;
            }
        }
    }
    Ok(())
}

fn seed_tables(catalog: &Catalog, tm: &TransactionManager, args: &Args) -> Result<Vec<Arc<TableInfo>>> {
    let config = TableHeapConfig {
        record_size: ROW_SIZE,
        records_per_page: 64,
    };
    let mut tables = Vec::with_capacity(args.tables);
    for n in 0..args.tables {
        let table = catalog.create_indexed_table(&format!("t{}", n), config, 0, 4)?;
        let txn = tm.begin(None)?;
        let ctx = Context::for_transaction(tm, txn.clone());
        for key in 0..args.records {
            execution::insert_tuple(&ctx, &table, &row(key, 0))?;
        }
        tm.commit(&txn)?;
        tables.push(table);
    }
    Ok(tables)
}

fn run_worker(
    worker: usize,
    tm: &TransactionManager,
    tables: &[Arc<TableInfo>],
    stats: &Stats,
    args: &Args,
) -> Result<()> {
    for i in 0..args.txns {
        let seed = (worker * args.txns + i) as u64 * 2_654_435_761;
        let table = &tables[(seed as usize) % tables.len()];
        let txn = tm.begin(None)?;
        let ctx = Context::for_transaction(tm, txn.clone());
        match run_statements(&ctx, table, seed, args.records) {
            Ok(()) => {
                tm.commit(&txn)?;
                stats.committed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                match e.abort_reason() {
                    Some(reason) => stats.record_abort(reason),
                    None => warn!("Txn {} failed: {}", txn.id(), e),
                }
                tm.abort(&txn)?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(args.tables > 0, "--tables must be at least 1");

    let log = Arc::new(
        LogManager::new(LogManagerConfig {
            log_dir: args.log_dir.clone(),
            force_sync: false,
            ..LogManagerConfig::default()
        })
        .with_context(|| format!("opening log in {}", args.log_dir.display()))?,
    );
    let catalog = Arc::new(Catalog::new());
    let tm = TransactionManager::new(Arc::new(LockManager::new()), log.clone(), catalog.clone());

    let tables = seed_tables(&catalog, &tm, &args)?;
    info!("Seeded {} tables with {} rows each", tables.len(), args.records);

    let stats = Stats::default();
    crossbeam::scope(|s| -> Result<()> {
        let handles: Vec<_> = (0..args.threads)
            .map(|worker| {
                let (tm, tables, stats, args) = (&tm, &tables, &stats, &args);
                s.spawn(move |_| run_worker(worker, tm, tables, stats, args))
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }
        Ok(())
    })
    .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;

    println!("committed:           {}", stats.committed.load(Ordering::Relaxed));
    println!("deadlock prevention: {}", stats.deadlock_prevention.load(Ordering::Relaxed));
    println!("upgrade conflict:    {}", stats.upgrade_conflict.load(Ordering::Relaxed));
    println!("gap conflict:        {}", stats.gap_conflict.load(Ordering::Relaxed));
    println!("log flushed through LSN {}", log.flushed_lsn());
    Ok(())
}
