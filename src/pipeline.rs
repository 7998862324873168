//! Pipeline orchestration: extract → standardise → classify → pivot →
//! quality gate → dimensions → star facts → KPIs, plus the OECD processed
//! dataset and the run summary.

use crate::config::{self, PipelineConfig};
use crate::data::columns::text_values;
use crate::data::{DataLoader, DataProcessor};
use crate::kpi::KpiCalculator;
use crate::quality;
use crate::star::{DimensionBuilder, FactAssembler, StarFacts};
use crate::transform::{build_processed_dataset, BusinessClassifier, Reshaper};
use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use tracing::{info, info_span};

/// Shape of one written artefact.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

impl TableSummary {
    fn of(name: &str, df: &DataFrame) -> Self {
        Self {
            name: name.to_string(),
            rows: df.height(),
            columns: df.width(),
        }
    }
}

/// Outcome of a full run, written as JSON next to the outputs.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tables: Vec<TableSummary>,
    pub production_countries: usize,
    pub trade_countries: usize,
}

/// Monthly fact tables built from the raw extracts.
pub struct MonthlyFacts {
    pub production: DataFrame,
    pub trade: DataFrame,
    /// Standardised balance extract, the input of the processed dataset.
    pub balance: DataFrame,
}

/// Pass/fail report of the quality stage.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub production_rows: usize,
    pub trade_rows: usize,
    pub production_countries: usize,
    pub trade_countries: usize,
}

fn distinct_countries(df: &DataFrame) -> Result<usize> {
    Ok(text_values(df, "country")?
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .len())
}

/// Extract, standardise, filter and pivot both raw extracts.
pub fn build_monthly_facts(
    cfg: &PipelineConfig,
    classifier: &BusinessClassifier,
) -> Result<MonthlyFacts> {
    let _span = info_span!("transform").entered();

    let production_raw =
        DataLoader::read_production_extract(cfg).context("extracting production dataset")?;
    let production_std = DataProcessor::standardise_production(&production_raw)
        .context("standardising production dataset")?;
    let production_members = classifier.filter_entities(&production_std)?;
    let production = Reshaper::pivot_production_fuels(&production_members, classifier)
        .context("pivoting production fuels")?;

    let balance_raw =
        DataLoader::read_balance_extract(cfg).context("extracting balance dataset")?;
    let balance = DataProcessor::standardise_balance(&balance_raw)
        .context("standardising balance dataset")?;
    let balance_members = classifier.filter_entities(&balance)?;
    let trade = Reshaper::pivot_balance_features(&balance_members)
        .context("pivoting balance features")?;

    info!(
        production_rows = production.height(),
        trade_rows = trade.height(),
        "monthly facts built"
    );
    Ok(MonthlyFacts {
        production,
        trade,
        balance,
    })
}

/// Run both fact-table validations; the first violation aborts.
pub fn check_facts(production: &DataFrame, trade: &DataFrame) -> Result<QualityReport> {
    let _span = info_span!("quality").entered();
    quality::validate_production_fact(production)?;
    quality::validate_trade_fact(trade)?;
    Ok(QualityReport {
        production_rows: production.height(),
        trade_rows: trade.height(),
        production_countries: distinct_countries(production)?,
        trade_countries: distinct_countries(trade)?,
    })
}

/// Validate the monthly facts already written to the output directory.
pub fn run_quality(cfg: &PipelineConfig) -> Result<QualityReport> {
    let production = DataLoader::read_table(&cfg.output(config::PRODUCTION_FACT))?;
    let trade = DataLoader::read_table(&cfg.output(config::TRADE_FACT))?;
    check_facts(&production, &trade)
}

/// Build and write dimensions and star facts from written monthly facts.
pub fn run_star(cfg: &PipelineConfig) -> Result<Vec<TableSummary>> {
    let production = DataLoader::read_table(&cfg.output(config::PRODUCTION_FACT))?;
    let trade = DataLoader::read_table(&cfg.output(config::TRADE_FACT))?;
    write_star(cfg, &production, &trade)
}

fn write_star(
    cfg: &PipelineConfig,
    production: &DataFrame,
    trade: &DataFrame,
) -> Result<Vec<TableSummary>> {
    let _span = info_span!("star").entered();

    let dim_country = DimensionBuilder::country(&[production, trade])?;
    let dim_date = DimensionBuilder::date(&[production, trade])?;
    DataLoader::write_table(&dim_country, &cfg.output(config::DIM_COUNTRY))?;
    DataLoader::write_table(&dim_date, &cfg.output(config::DIM_DATE))?;

    let production_star = FactAssembler::build_star(
        production,
        &dim_country,
        &dim_date,
        quality::PRODUCTION_FACT_NAME,
    )?;
    let trade_star =
        FactAssembler::build_star(trade, &dim_country, &dim_date, quality::TRADE_FACT_NAME)?;
    DataLoader::write_table(&production_star, &cfg.output(config::PRODUCTION_STAR))?;
    DataLoader::write_table(&trade_star, &cfg.output(config::TRADE_STAR))?;

    Ok(vec![
        TableSummary::of(config::DIM_COUNTRY, &dim_country),
        TableSummary::of(config::DIM_DATE, &dim_date),
        TableSummary::of(config::PRODUCTION_STAR, &production_star),
        TableSummary::of(config::TRADE_STAR, &trade_star),
    ])
}

/// Compute KPIs over the analytics view of the written star schema.
pub fn run_kpis(cfg: &PipelineConfig) -> Result<(DataFrame, DataFrame)> {
    let _span = info_span!("kpis").entered();
    let StarFacts { production, trade } = FactAssembler::load_star_facts(cfg)?;

    let generation = KpiCalculator::generation_mix(&production)?;
    let trade = KpiCalculator::trade_metrics(&trade)?;
    DataLoader::write_table(&generation, &cfg.output(config::GENERATION_MIX_KPIS))?;
    DataLoader::write_table(&trade, &cfg.output(config::TRADE_KPIS))?;
    Ok((generation, trade))
}

/// Full pipeline run. Any failing stage aborts with its error.
pub fn run(cfg: &PipelineConfig, classifier: &BusinessClassifier) -> Result<RunSummary> {
    info!("ETL pipeline started");

    let facts = build_monthly_facts(cfg, classifier)?;
    let report = check_facts(&facts.production, &facts.trade)?;
    DataLoader::write_table(&facts.production, &cfg.output(config::PRODUCTION_FACT))?;
    DataLoader::write_table(&facts.trade, &cfg.output(config::TRADE_FACT))?;

    let mut tables = vec![
        TableSummary::of(config::PRODUCTION_FACT, &facts.production),
        TableSummary::of(config::TRADE_FACT, &facts.trade),
    ];
    tables.extend(write_star(cfg, &facts.production, &facts.trade)?);

    let (generation, trade_kpis) = run_kpis(cfg)?;
    tables.push(TableSummary::of(config::GENERATION_MIX_KPIS, &generation));
    tables.push(TableSummary::of(config::TRADE_KPIS, &trade_kpis));

    let processed = {
        let _span = info_span!("processed").entered();
        build_processed_dataset(&facts.balance, classifier)?
    };
    DataLoader::write_table(&processed, &cfg.processed(config::PROCESSED_OECD))?;
    tables.push(TableSummary::of(config::PROCESSED_OECD, &processed));

    let summary = RunSummary {
        tables,
        production_countries: report.production_countries,
        trade_countries: report.trade_countries,
    };
    let summary_path = cfg.output(config::RUN_SUMMARY);
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    info!("ETL pipeline finished successfully");
    Ok(summary)
}

/// Write seeded random samples of both standardised extracts.
///
/// Extracts shorter than the sample size are written whole.
pub fn write_inspection_samples(cfg: &PipelineConfig, rows: usize) -> Result<Vec<TableSummary>> {
    let production = DataProcessor::standardise_production(&DataLoader::read_production_extract(cfg)?)?;
    let balance = DataProcessor::standardise_balance(&DataLoader::read_balance_extract(cfg)?)?;

    let mut written = Vec::with_capacity(2);
    for (name, df) in [
        (config::PRODUCTION_SAMPLE, &production),
        (config::BALANCE_SAMPLE, &balance),
    ] {
        let sample = df.sample_n_literal(
            rows.min(df.height()),
            false,
            true,
            Some(config::INSPECTION_SAMPLE_SEED),
        )?;
        DataLoader::write_table(&sample, &cfg.output(name))?;
        info!(file = name, rows = sample.height(), "inspection sample written");
        written.push(TableSummary::of(name, &sample));
    }
    Ok(written)
}

/// Category profile of both raw extracts, for manual inspection.
pub fn explore(cfg: &PipelineConfig) -> Result<()> {
    let balance = DataProcessor::clean_column_names(&DataLoader::read_balance_extract(cfg)?)?;
    println!("\n=== ACTUAL COLUMN NAMES ===");
    println!(
        "{:?}",
        balance
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    );
    for (title, column) in [
        ("UNIQUE BALANCE VALUES", "balance"),
        ("UNIQUE PRODUCT VALUES", "product"),
        ("UNIQUE COUNTRIES", "country"),
    ] {
        println!("\n=== {title} ===");
        println!("{:?}", DataProcessor::distinct_values(&balance, column)?);
    }

    let production = DataProcessor::clean_column_names(&DataLoader::read_production_extract(cfg)?)?;
    let counts = DataProcessor::value_counts(&production, "product")?;
    println!("\n=== PRODUCTION PRODUCT PROFILE ===");
    println!("Total distinct products: {}", counts.len());
    for (product, count) in counts.iter().take(20) {
        println!("{count:>10}  {product}");
    }

    println!("\n--- EXPORTING SAMPLE VIEWS FOR MANUAL INSPECTION ---");
    for table in write_inspection_samples(cfg, config::INSPECTION_SAMPLE_ROWS)? {
        println!(" - {} ({} rows)", cfg.output(&table.name).display(), table.rows);
    }
    Ok(())
}
