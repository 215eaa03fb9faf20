use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use lobx_sor::analytics::depth;
use lobx_sor::analytics::metrics::MetricsAnalyzer;
use lobx_sor::config::AppConfig;
use lobx_sor::engine::router::SmartRouter;
use lobx_sor::market_data::adapters::AdapterRegistry;
use lobx_sor::market_data::aggregator::AggregationEngine;
use lobx_sor::persist::memory::MemorySnapshotStore;
use lobx_sor::persist::postgres::PostgresSnapshotStore;
use lobx_sor::persist::sled_store::SledSnapshotStore;
use lobx_sor::persist::SnapshotStore;
use lobx_sor::service::{OrderBookService, QuantityInput};
use lobx_sor::telemetry;
use lobx_sor::VenueId;

const EXIT_NOT_FOUND: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "lobx-sor", version, about = "Multi-venue order book aggregation and smart order routing")]
struct Cli {
    /// Config file (defaults to an optional ./lobx.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Single-line JSON instead of pretty output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct BookArgs {
    /// Base asset, e.g. BTC
    symbol: String,

    /// Comma-separated venue ids; defaults to the configured set
    #[arg(short, long, value_delimiter = ',')]
    exchanges: Vec<String>,
}

impl BookArgs {
    fn venues(&self) -> Option<&[String]> {
        (!self.exchanges.is_empty()).then_some(self.exchanges.as_slice())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidated book with NBBO, per-venue rows and metrics
    Aggregate(BookArgs),
    /// Cumulative depth series
    Depth {
        #[command(flatten)]
        book: BookArgs,
        /// Write CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// One venue's normalised book
    Single {
        venue: String,
        symbol: String,
        #[arg(long, default_value_t = 100)]
        depth: u32,
    },
    /// Best bid and offer across venues
    Nbbo(BookArgs),
    /// Whales, walls and liquidity statistics
    Metrics(BookArgs),
    /// Whale orders and price walls only
    Whales(BookArgs),
    /// Split an order across venues
    #[command(alias = "smart-route")]
    Route {
        #[command(flatten)]
        book: BookArgs,
        #[arg(long)]
        side: String,
        #[arg(long)]
        quantity: String,
    },
    /// Aggregate now and persist the result
    SaveSnapshot(BookArgs),
    /// Load a saved snapshot by id
    GetSnapshot { id: String },
    /// List saved snapshots, newest first
    Snapshots {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Rank venues by spread and by liquidity
    #[command(alias = "compare-exchanges")]
    Compare(BookArgs),
    /// Supported venue ids
    Venues,
}

impl Command {
    fn needs_store(&self) -> bool {
        matches!(self, Command::SaveSnapshot(_) | Command::GetSnapshot { .. } | Command::Snapshots { .. })
    }
}

async fn open_store(cfg: &AppConfig, needed: bool) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    if !needed {
        return Ok(Arc::new(MemorySnapshotStore::new()));
    }
    match cfg.database_url() {
        Some(url) => {
            info!("using postgres snapshot store");
            Ok(Arc::new(PostgresSnapshotStore::connect(&url).await.context("connecting to postgres")?))
        }
        None => {
            let path = &cfg.storage.sled_path;
            debug!(path = %path.display(), "using sled snapshot store");
            let store = SledSnapshotStore::open(path)
                .with_context(|| format!("opening snapshot store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

fn emit<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if compact {
        serde_json::to_writer(&mut out, value)?;
    } else {
        serde_json::to_writer_pretty(&mut out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

async fn run(cli: Cli, cfg: AppConfig) -> anyhow::Result<ExitCode> {
    let registry = AdapterRegistry::standard(&cfg.adapter_settings())?;
    let engine = AggregationEngine::new(
        registry,
        cfg.engine_settings(),
        MetricsAnalyzer::new(cfg.analyzer_settings()),
    );
    let store = open_store(&cfg, cli.command.needs_store()).await?;
    let service = OrderBookService::new(
        engine,
        SmartRouter::new(cfg.router_settings()),
        store,
        cfg.default_venue_ids(),
        cfg.top_levels,
    );
    let compact = cli.compact;

    match cli.command {
        Command::Aggregate(b) => emit(&service.aggregate(&b.symbol, b.venues()).await?, compact)?,
        Command::Depth { book, csv } => {
            let chart = service.depth(&book.symbol, book.venues()).await?;
            if csv {
                depth::write_csv(&chart, io::stdout().lock())?;
            } else {
                emit(&chart, compact)?;
            }
        }
        Command::Single { venue, symbol, depth } => emit(&service.single(&venue, &symbol, depth).await?, compact)?,
        Command::Nbbo(b) => emit(&service.nbbo(&b.symbol, b.venues()).await?, compact)?,
        Command::Metrics(b) => emit(&service.metrics(&b.symbol, b.venues()).await?, compact)?,
        Command::Whales(b) => emit(&service.whales(&b.symbol, b.venues()).await?, compact)?,
        Command::Route { book, side, quantity } => {
            let quantity = QuantityInput::Text(quantity);
            emit(&service.smart_route(&book.symbol, &side, &quantity, book.venues()).await?, compact)?
        }
        Command::SaveSnapshot(b) => emit(&service.save_snapshot(&b.symbol, b.venues()).await?, compact)?,
        Command::GetSnapshot { id } => match service.get_snapshot(&id).await? {
            Some(snapshot) => emit(&snapshot, compact)?,
            None => {
                eprintln!("snapshot `{}` not found", id);
                return Ok(ExitCode::from(EXIT_NOT_FOUND));
            }
        },
        Command::Snapshots { symbol, limit, offset } => {
            emit(&service.snapshots(symbol.as_deref(), limit, offset).await?, compact)?
        }
        Command::Compare(b) => emit(&service.compare_exchanges(&b.symbol, b.venues()).await?, compact)?,
        Command::Venues => emit(&VenueId::ALL, compact)?,
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    telemetry::init_tracing(&cfg.log_filter);
    telemetry::init_metrics(cfg.metrics_port)?;

    // Dropping `run` on Ctrl-C cancels every in-flight venue request.
    tokio::select! {
        result = run(cli, cfg) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}
