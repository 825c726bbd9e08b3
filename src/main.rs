use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use vendorflow::application::engine::FulfillmentEngine;
use vendorflow::config::EngineConfig;
use vendorflow::domain::money::{Money, TaxRate};
use vendorflow::domain::ports::OrderRepositoryHandle;
use vendorflow::infrastructure::clock::SystemClock;
use vendorflow::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryOrderRepository, InMemoryProductStore,
};
use vendorflow::infrastructure::payment::SimulatedPaymentGateway;
use vendorflow::interfaces::csv::catalog_reader::CatalogReader;
use vendorflow::interfaces::csv::report_writer::{OrderWriter, StockWriter};
use vendorflow::interfaces::csv::request_reader::RequestReader;
use vendorflow::interfaces::script::RequestRunner;
use vendorflow::telemetry::init_tracing;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog CSV file (id,vendor,name,image,price,stock,sold,active)
    catalog: PathBuf,

    /// Request script CSV file
    requests: PathBuf,

    /// JSON engine configuration. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tax rate applied to every order subtotal, between 0 and 1
    #[arg(long)]
    tax_rate: Option<Decimal>,

    /// Flat fee for home delivery
    #[arg(long)]
    shipping_fee: Option<Decimal>,

    /// Payment gateway deadline in milliseconds
    #[arg(long)]
    payment_timeout_ms: Option<u64>,

    /// Path to persistent order database (optional). Requires the
    /// `storage-rocksdb` feature.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Also write final stock counters to this CSV file
    #[arg(long)]
    stock_out: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path).into_diagnostic()?,
            None => EngineConfig::default(),
        };
        if let Some(rate) = self.tax_rate {
            config.tax_rate = TaxRate::new(rate).into_diagnostic()?;
        }
        if let Some(fee) = self.shipping_fee {
            config.shipping_fee = Money::new(fee).into_diagnostic()?;
        }
        if let Some(timeout_ms) = self.payment_timeout_ms {
            config.payment_timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

#[cfg(feature = "storage-rocksdb")]
fn order_repository(db_path: Option<&Path>) -> Result<OrderRepositoryHandle> {
    use vendorflow::infrastructure::rocksdb::RocksDBOrderRepository;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "using RocksDB order repository");
            Ok(Arc::new(RocksDBOrderRepository::open(path).into_diagnostic()?))
        }
        None => Ok(Arc::new(InMemoryOrderRepository::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn order_repository(db_path: Option<&Path>) -> Result<OrderRepositoryHandle> {
    if let Some(path) = db_path {
        warn!(
            path = %path.display(),
            "built without the storage-rocksdb feature, keeping orders in memory"
        );
    }
    Ok(Arc::new(InMemoryOrderRepository::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.engine_config()?;

    let catalog = File::open(&cli.catalog).into_diagnostic()?;
    let mut products = Vec::new();
    for product in CatalogReader::new(catalog).products() {
        match product {
            Ok(product) => products.push(product),
            Err(e) => warn!(error = %e, "skipping catalog row"),
        }
    }
    info!(products = products.len(), "catalog loaded");

    let engine = FulfillmentEngine::new(
        Arc::new(InMemoryProductStore::with_products(products)),
        Arc::new(InMemoryCartStore::new()),
        Arc::new(SimulatedPaymentGateway::new()),
        order_repository(cli.db_path.as_deref())?,
        Arc::new(SystemClock),
        &config,
    );

    // Process requests
    let requests = File::open(&cli.requests).into_diagnostic()?;
    let mut runner = RequestRunner::new(&engine);
    for (row, record) in RequestReader::new(requests).requests().enumerate() {
        let line = row + 2;
        match record {
            Ok(record) => {
                let op = record.op;
                if let Err(e) = runner.apply(record).await {
                    error!(line, ?op, error = %e, "request failed");
                }
            }
            Err(e) => error!(line, error = %e, "unreadable request"),
        }
    }

    let orders = runner.placed_orders().await.into_diagnostic()?;
    let stdout = io::stdout();
    OrderWriter::new(stdout.lock())
        .write_orders(&orders)
        .into_diagnostic()?;

    if let Some(path) = &cli.stock_out {
        let stock = engine.stock_levels().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        StockWriter::new(file).write_products(&stock).into_diagnostic()?;
    }

    Ok(())
}
