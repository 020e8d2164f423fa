use clap::Parser;
use loyalty_ledger::application::ledger::LoyaltyLedger;
use loyalty_ledger::application::worker::{ReconciliationWorker, WorkerConfig};
use loyalty_ledger::domain::ports::LedgerStoreRef;
use loyalty_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use loyalty_ledger::interfaces::accrual::{AccrualClientConfig, HttpAccrualClient};
use loyalty_ledger::interfaces::csv::balance_writer::BalanceWriter;
use loyalty_ledger::interfaces::csv::order_reader::OrderReader;
use loyalty_ledger::logger::init_logger;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base address of the accrual calculation service
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    accrual_address: String,

    /// Path to persistent database. If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(short = 'd', long, env = "DATABASE_URI")]
    db_path: Option<PathBuf>,

    /// CSV file of `user,order` rows to submit before reconciliation starts
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Seconds between reconciliation passes
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: u64,

    /// Maximum simultaneous accrual lookups
    #[arg(long, default_value_t = 8)]
    max_in_flight: usize,

    /// Run a single reconciliation pass and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli) -> Result<LedgerStoreRef> {
    use loyalty_ledger::infrastructure::rocksdb::RocksDBStore;

    match &cli.db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(_cli: &Cli) -> Result<LedgerStoreRef> {
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug);

    let store = open_store(&cli)?;
    // Fail fast when storage is unusable rather than polling against it.
    store.select_pending().await.into_diagnostic()?;
    let ledger = LoyaltyLedger::new(store.clone());

    if let Some(path) = &cli.orders {
        let file = File::open(path).into_diagnostic()?;
        for submission in OrderReader::new(file).submissions() {
            match submission {
                Ok(row) => {
                    if let Err(e) = ledger.register_order(row.user, &row.order).await {
                        tracing::warn!(user = row.user, order = %row.order, error = %e, "Could not register order");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Could not read order row"),
            }
        }
    }

    let accrual = HttpAccrualClient::new(AccrualClientConfig::new(cli.accrual_address.clone()))
        .into_diagnostic()?;
    let worker = ReconciliationWorker::new(
        store,
        Arc::new(accrual),
        WorkerConfig {
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
            max_in_flight: cli.max_in_flight,
        },
    );

    if cli.once {
        worker.tick().await.into_diagnostic()?;
    } else {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        tokio::signal::ctrl_c().await.into_diagnostic()?;
        tracing::info!("Shutdown requested, draining current pass");
        shutdown.cancel();
        handle.await.into_diagnostic()?;
    }

    let balances = ledger.balances().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(balances).into_diagnostic()?;

    Ok(())
}
