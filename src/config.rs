//! Pipeline Configuration Module
//! Data directory layout and the fixed artefact file names.

use std::path::{Path, PathBuf};

/// Raw production-by-fuel extract (long format, header on first line).
pub const PRODUCTION_EXTRACT: &str = "iea_electricity_production.csv";
/// Raw balance-by-category extract (long format, metadata rows before header).
pub const BALANCE_EXTRACT: &str = "monthly_electricity_data_0825.csv";
/// Number of metadata lines preceding the balance extract header.
pub const BALANCE_METADATA_ROWS: usize = 8;

pub const PRODUCTION_FACT: &str = "fact_electricity_production_monthly.csv";
pub const TRADE_FACT: &str = "fact_electricity_trade_monthly.csv";
pub const DIM_COUNTRY: &str = "dim_country.csv";
pub const DIM_DATE: &str = "dim_date.csv";
pub const PRODUCTION_STAR: &str = "fact_electricity_production_star.csv";
pub const TRADE_STAR: &str = "fact_electricity_trade_star.csv";
pub const GENERATION_MIX_KPIS: &str = "kpi_generation_mix.csv";
pub const TRADE_KPIS: &str = "kpi_trade_metrics.csv";
pub const RUN_SUMMARY: &str = "pipeline_summary.json";
pub const PROCESSED_OECD: &str = "oecd_energy_fact.csv";

/// Random row samples of the standardised extracts, for manual inspection.
pub const PRODUCTION_SAMPLE: &str = "sample_dataset1_standardised.csv";
pub const BALANCE_SAMPLE: &str = "sample_dataset2_standardised.csv";
pub const INSPECTION_SAMPLE_ROWS: usize = 5000;
pub const INSPECTION_SAMPLE_SEED: u64 = 42;

/// Directory layout for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub output_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_root("data")
    }
}

impl PipelineConfig {
    /// Derive `raw/`, `output/` and `processed/` under a single data root.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            raw_dir: root.join("raw"),
            output_dir: root.join("output"),
            processed_dir: root.join("processed"),
        }
    }

    pub fn raw(&self, file_name: &str) -> PathBuf {
        self.raw_dir.join(file_name)
    }

    pub fn output(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn processed(&self, file_name: &str) -> PathBuf {
        self.processed_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_derived_from_root() {
        let cfg = PipelineConfig::from_root("/tmp/etl");
        assert_eq!(cfg.raw(BALANCE_EXTRACT), PathBuf::from("/tmp/etl/raw/monthly_electricity_data_0825.csv"));
        assert_eq!(cfg.output(DIM_DATE), PathBuf::from("/tmp/etl/output/dim_date.csv"));
        assert_eq!(cfg.processed(PROCESSED_OECD), PathBuf::from("/tmp/etl/processed/oecd_energy_fact.csv"));
    }

    #[test]
    fn default_root_is_relative_data_dir() {
        assert_eq!(PipelineConfig::default().output_dir, PathBuf::from("data/output"));
    }
}
