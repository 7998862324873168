//! GridStat ETL - IEA Monthly Electricity Statistics Pipeline
//!
//! Standardises the production and balance extracts, pivots them into
//! monthly fact tables, builds a star schema, gates it with data-quality
//! checks and derives generation-mix and trade KPIs.

mod config;
mod data;
mod kpi;
mod pipeline;
mod quality;
mod star;
mod transform;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::PipelineConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transform::BusinessClassifier;

#[derive(Parser, Debug)]
#[command(name = "gridstat-etl")]
#[command(about = "Batch ETL for IEA monthly electricity statistics")]
struct Args {
    /// Data root holding raw/, output/ and processed/
    #[arg(short, long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run every stage end to end (default)
    Run,
    /// Validate the written monthly fact tables
    Quality,
    /// Rebuild dimensions and star facts from the written monthly facts
    Star,
    /// Recompute KPIs from the written star schema
    Kpis,
    /// Print category profiles of the raw extracts
    Explore,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = PipelineConfig::from_root(&args.data_dir);
    info!(data_dir = %args.data_dir.display(), "GridStat ETL starting");

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let summary = pipeline::run(&cfg, &BusinessClassifier::default())?;
            println!("\n=== PIPELINE COMPLETE ===");
            for table in &summary.tables {
                println!("{:<45} {:>8} rows {:>4} cols", table.name, table.rows, table.columns);
            }
        }
        Command::Quality => {
            println!("---- RUNNING DATA QUALITY CHECKS ----");
            let report = pipeline::run_quality(&cfg)?;
            println!("All data quality checks PASSED.\n");
            println!("Production fact rows: {}", report.production_rows);
            println!("Trade fact rows: {}", report.trade_rows);
            println!("Distinct production countries: {}", report.production_countries);
            println!("Distinct trade countries: {}", report.trade_countries);
        }
        Command::Star => {
            println!("STAR FACT TABLES BUILT");
            for table in pipeline::run_star(&cfg)? {
                println!("{}: {} rows", table.name, table.rows);
            }
        }
        Command::Kpis => {
            let (generation, trade) = pipeline::run_kpis(&cfg)?;
            println!("\n=== Production KPIs sample ===");
            println!(
                "{}",
                generation
                    .select([
                        "country_id",
                        "date_id",
                        "low_carbon_gwh",
                        "low_carbon_share_pct",
                        "fossil_gwh",
                        "fossil_share_pct",
                    ])?
                    .head(Some(5))
            );
            println!("\n=== Trade KPIs sample ===");
            println!(
                "{}",
                trade
                    .select(["country_id", "date_id", "net_imports_gwh", "import_dependency_pct"])?
                    .head(Some(5))
            );
        }
        Command::Explore => pipeline::explore(&cfg)?,
    }

    Ok(())
}
