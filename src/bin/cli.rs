use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};

use tessdb::execution::{self, Context};
use tessdb::transaction::concurrency::LockDataId;
use tessdb::transaction::wal::{LogRecordContent, LogSink};
use tessdb::{
    Catalog, Iid, LockManager, LockMode, LogManager, LogManagerConfig, TableHeapConfig,
    TransactionManager,
};

#[derive(Parser)]
#[command(author, version, about = "TessDB CLI - inspect the lock manager and the write-ahead log")]
struct Cli {
    /// Log directory path
    #[arg(short, long, default_value = "logs")]
    log_dir: PathBuf,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the table-level lock compatibility matrix
    Matrix,

    /// Run a built-in locking scenario and narrate it
    Scenario {
        #[arg(value_enum)]
        name: ScenarioName,
    },

    /// Print every record in the write-ahead log
    DumpLog {
        /// Log file name inside the log directory
        #[arg(short, long, default_value = "tessdb.wal")]
        file: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    /// S plus IX on one table becomes SIX
    Upgrade,
    /// Shared reader against an exclusive writer
    Conflict,
    /// Adjacent and overlapping gap locks
    Gaps,
    /// Insert, update and delete rolled back by abort
    Undo,
}

fn print_matrix() {
    print!("{:>5}", "");
    for requested in LockMode::ALL {
        print!("{:>5}", requested.to_string());
    }
    println!();
    for held in LockMode::ALL {
        print!("{:>5}", held.to_string());
        for requested in LockMode::ALL {
            let cell = if held.is_compatible_with(requested) { "1" } else { "0" };
            print!("{:>5}", cell);
        }
        println!();
    }
}

fn outcome<T, E: std::fmt::Display>(result: &std::result::Result<T, E>) -> String {
    match result {
        Ok(_) => "granted".to_string(),
        Err(e) => format!("failed ({})", e),
    }
}

fn run_scenario(name: ScenarioName, log_dir: PathBuf) -> Result<()> {
    let log = Arc::new(LogManager::new(LogManagerConfig {
        log_dir,
        ..LogManagerConfig::default()
    })?);
    let catalog = Arc::new(Catalog::new());
    let lm = Arc::new(LockManager::new());
    let tm = TransactionManager::new(lm.clone(), log.clone(), catalog.clone());
    let config = TableHeapConfig {
        record_size: 8,
        records_per_page: 16,
    };

    match name {
        ScenarioName::Upgrade => {
            let table = catalog.create_table("t", config)?;
            let id = LockDataId::table(table.table_id());
            let a = tm.begin(None)?;
            let b = tm.begin(None)?;
            lm.acquire_shared_table(&a, table.table_id())?;
            lm.acquire_intention_exclusive_table(&a, table.table_id())?;
            println!("txn {} holds S + IX: group mode {}", a.id(), lm.group_lock_mode(&id));
            let is = lm.acquire_intention_shared_table(&b, table.table_id());
            println!("txn {} IS: {}", b.id(), outcome(&is));
            let s = lm.acquire_shared_table(&b, table.table_id());
            println!("txn {} S:  {} -> state {:?}", b.id(), outcome(&s), b.state());
            tm.abort(&b)?;
            tm.commit(&a)?;
        }
        ScenarioName::Conflict => {
            let table = catalog.create_table("t", config)?;
            let id = LockDataId::table(table.table_id());
            let a = tm.begin(None)?;
            let b = tm.begin(None)?;
            lm.acquire_shared_table(&a, table.table_id())?;
            let x = lm.acquire_exclusive_table(&b, table.table_id());
            println!("txn {} X: {} -> state {:?}", b.id(), outcome(&x), b.state());
            tm.abort(&b)?;
            println!("after abort of {}: group mode {}", b.id(), lm.group_lock_mode(&id));
            tm.commit(&a)?;
            println!("after commit of {}: group mode {}", a.id(), lm.group_lock_mode(&id));
        }
        ScenarioName::Gaps => {
            let table = catalog.create_table("t", config)?;
            let (a, b, c) = (tm.begin(None)?, tm.begin(None)?, tm.begin(None)?);
            let p = |n: u32| Iid::before(format!("p{}", n).as_bytes());
            for (txn, start, end) in [(&a, 1, 5), (&b, 5, 9), (&c, 2, 6)] {
                let granted = lm.lock_gap(txn, table.table_id(), p(start), p(end))?;
                println!(
                    "txn {} gap [p{}, p{}): {}",
                    txn.id(),
                    start,
                    end,
                    if granted { "granted" } else { "rejected" }
                );
            }
            for txn in [a, b, c] {
                tm.commit(&txn)?;
            }
        }
        ScenarioName::Undo => {
            let table = catalog.create_indexed_table("t", config, 0, 4)?;
            let setup = tm.begin(None)?;
            let ctx = Context::for_transaction(&tm, setup.clone());
            let kept = execution::insert_tuple(&ctx, &table, b"key1aaaa")?;
            let doomed = execution::insert_tuple(&ctx, &table, b"key2bbbb")?;
            tm.commit(&setup)?;

            let txn = tm.begin(None)?;
            let ctx = Context::for_transaction(&tm, txn.clone());
            execution::update_tuple(&ctx, &table, kept, b"key9zzzz")?;
            execution::delete_tuple(&ctx, &table, doomed)?;
            let fresh = execution::insert_tuple(&ctx, &table, b"key3cccc")?;
            println!("txn {} wrote {} records; rolling back", txn.id(), txn.write_set_len());
            tm.abort(&txn)?;

            for rid in [kept, doomed, fresh] {
                match table.store().get(rid) {
                    Ok(row) => println!("{} = {}", rid, String::from_utf8_lossy(&row)),
                    Err(e) => println!("{}: {}", rid, e),
                }
            }
        }
    }
    log.flush_to_disk()?;
    Ok(())
}

fn dump_log(log_dir: PathBuf, file: String) -> Result<()> {
    let log = LogManager::new(LogManagerConfig {
        log_dir: log_dir.clone(),
        log_file_name: file.clone(),
        ..LogManagerConfig::default()
    })
    .with_context(|| format!("opening {}", log_dir.join(&file).display()))?;

    for record in log.read_all()? {
        match &record.content {
            LogRecordContent::Data(data) => println!(
                "{:>6} txn {:>4} prev {:>6} {:?} table {} rid {} before {} after {}",
                record.lsn,
                record.txn_id,
                record.prev_lsn,
                record.record_type,
                data.table_id,
                data.rid,
                data.before_image.as_deref().map(hex::encode).unwrap_or_else(|| "-".to_string()),
                data.after_image.as_deref().map(hex::encode).unwrap_or_else(|| "-".to_string()),
            ),
            LogRecordContent::Transaction(_) => println!(
                "{:>6} txn {:>4} prev {:>6} {:?}",
                record.lsn, record.txn_id, record.prev_lsn, record.record_type
            ),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Matrix => print_matrix(),
        Commands::Scenario { name } => run_scenario(name, cli.log_dir)?,
        Commands::DumpLog { file } => dump_log(cli.log_dir, file)?,
    }
    Ok(())
}
