//! LPG stock ledger - command line reports
//!
//! Loads a JSON array of stored movements, rebuilds every lineage and prints
//! the requested report as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lpg_stock_backend::{AppError, Config, InMemoryMovementStore, StockLedgerService};
use serde::Serialize;
use shared::{BottleType, Category, Client, DateWindow, GroupingDimension, LineageKey, Movement};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lpg-ledger")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file of stored movements (defaults to input.movements_path)
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// The report to generate
    #[command(subcommand)]
    report: Report,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Annotated rows of every lineage, or of one lineage
    Ledger {
        #[command(flatten)]
        lineage: LineageArgs,
    },
    /// Consolidated state of every lineage
    States,
    /// Lineages whose last count deviates beyond the threshold
    Discrepancies {
        /// Absolute écart to exceed (defaults to ledger.discrepancy_threshold)
        #[arg(short, long)]
        threshold: Option<u32>,
    },
    /// Entries, exits and stock grouped by category, site or bottle type
    Summary {
        /// category, site or bottle_type
        #[arg(short, long, default_value = "category")]
        by: GroupingDimension,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Movement counters for a period
    Stats {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Current stock of every lineage against the alert threshold
    Levels {
        /// Only lineages at or below the threshold
        #[arg(long)]
        low: bool,
    },
    /// Lineages that went negative before any count
    Negatives,
    /// Whether a lineage can supply a quantity
    Check {
        #[command(flatten)]
        lineage: LineageArgs,
        #[arg(short, long)]
        quantity: u32,
    },
}

#[derive(clap::Args, Debug)]
struct LineageArgs {
    #[arg(long)]
    category: Option<Category>,
    #[arg(long)]
    bottle_type: Option<BottleType>,
    #[arg(long)]
    client: Option<Client>,
}

impl LineageArgs {
    fn key(&self) -> Option<LineageKey> {
        Some(LineageKey::new(self.category?, self.bottle_type?, self.client))
    }
}

#[derive(clap::Args, Debug)]
struct WindowArgs {
    /// First day included (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl WindowArgs {
    fn window(&self) -> DateWindow {
        DateWindow::new(self.from, self.to)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lpg_ledger=info,lpg_stock_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Service errors carry a bilingual detail for callers
            match e.downcast_ref::<AppError>().map(AppError::report) {
                Some(detail) => match serde_json::to_string_pretty(&detail) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("error: {e:#}"),
                },
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load configuration")?;
    tracing::info!("Environment: {}", config.environment);

    let path = args
        .file
        .or_else(|| config.input.movements_path.as_ref().map(PathBuf::from))
        .context("no movement file given and input.movements_path is not set")?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let movements: Vec<Movement> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse movements in {}", path.display()))?;
    tracing::info!(movements = movements.len(), file = %path.display(), "Movements loaded");

    let service = StockLedgerService::new(
        InMemoryMovementStore::with_movements(movements),
        config.ledger,
        config.alerts,
    );

    match args.report {
        Report::Ledger { lineage } => match lineage.key() {
            Some(key) => print(&service.lineage_entries(key).await?),
            None => print(&service.ledger().await?.rows().collect::<Vec<_>>()),
        },
        Report::States => print(&service.stock_states().await?),
        Report::Discrepancies { threshold } => print(&service.discrepancies(threshold).await?),
        Report::Summary { by, window } => print(&service.summarize(window.window(), by).await?),
        Report::Stats { window } => print(&service.stats(window.window()).await?),
        Report::Levels { low: true } => print(&service.low_stock().await?),
        Report::Levels { low: false } => print(&service.stock_levels().await?),
        Report::Negatives => print(&service.unexplained_negatives().await?),
        Report::Check { lineage, quantity } => {
            let key = lineage
                .key()
                .context("--category and --bottle-type are required")?;
            print(&service.check_availability(key, quantity).await?)
        }
    }?;

    Ok(())
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
