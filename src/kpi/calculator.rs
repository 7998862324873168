//! KPI Calculator Module
//! Row-wise generation-mix and trade-dependency metrics over star facts.

use crate::data::columns::has_column;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

pub const LOW_CARBON_FUELS: [&str; 6] = [
    "hydro",
    "wind",
    "solar",
    "geothermal",
    "other_renewables",
    "combustible_renewables",
];

pub const FOSSIL_FUELS: [&str; 4] = [
    "coal",
    "natural_gas",
    "oil",
    "other_combustible_non_renewables",
];

pub const NUCLEAR: &str = "nuclear";
pub const NOT_SPECIFIED: &str = "not_specified";

/// Base columns required by the trade metrics.
const TRADE_BASE: [&str; 3] = ["total_imports", "total_exports", "net_electricity_production"];

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("KPI input is missing required column '{0}'")]
    MissingColumn(String),
}

/// Sum of `columns` with nulls counted as zero; absent columns contribute zero.
fn sum_of(df: &DataFrame, columns: &[&str]) -> Expr {
    columns
        .iter()
        .map(|c| {
            if has_column(df, c) {
                col(*c).cast(DataType::Float64).fill_null(lit(0.0))
            } else {
                lit(0.0)
            }
        })
        .reduce(|acc, e| acc + e)
        .unwrap_or_else(|| lit(0.0))
}

/// `numerator / denominator * 100`, null when the denominator is zero or null.
fn percentage(numerator: &str, denominator: &str) -> Expr {
    when(col(denominator).eq(lit(0.0)))
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(col(numerator) / col(denominator) * lit(100.0))
}

/// Handles KPI derivation over assembled fact tables.
pub struct KpiCalculator;

impl KpiCalculator {
    /// Add generation-mix KPIs to a production fact table.
    ///
    /// Adds `total_generation_gwh`, `low_carbon_gwh`, `fossil_gwh`,
    /// `nuclear_gwh` and the matching `*_share_pct` columns.
    pub fn generation_mix(df: &DataFrame) -> Result<DataFrame, KpiError> {
        info!(rows = df.height(), "calculating generation mix KPIs");

        let all_fuels: Vec<&str> = LOW_CARBON_FUELS
            .iter()
            .chain(FOSSIL_FUELS.iter())
            .copied()
            .chain([NUCLEAR, NOT_SPECIFIED])
            .collect();

        let out = df
            .clone()
            .lazy()
            .with_columns([
                sum_of(df, &all_fuels).alias("total_generation_gwh"),
                sum_of(df, &LOW_CARBON_FUELS).alias("low_carbon_gwh"),
                sum_of(df, &FOSSIL_FUELS).alias("fossil_gwh"),
                sum_of(df, &[NUCLEAR]).alias("nuclear_gwh"),
            ])
            .with_columns([
                percentage("low_carbon_gwh", "total_generation_gwh").alias("low_carbon_share_pct"),
                percentage("fossil_gwh", "total_generation_gwh").alias("fossil_share_pct"),
                percentage("nuclear_gwh", "total_generation_gwh").alias("nuclear_share_pct"),
            ])
            .collect()?;

        info!("generation KPI calculations complete");
        Ok(out)
    }

    /// Add `net_imports_gwh` and `import_dependency_pct` to a trade fact table.
    ///
    /// A negative `net_imports_gwh` marks a net exporter.
    pub fn trade_metrics(df: &DataFrame) -> Result<DataFrame, KpiError> {
        info!(rows = df.height(), "calculating trade KPIs");

        if let Some(missing) = TRADE_BASE.iter().find(|c| !has_column(df, c)) {
            return Err(KpiError::MissingColumn(missing.to_string()));
        }

        let out = df
            .clone()
            .lazy()
            .with_columns([(col("total_imports").cast(DataType::Float64)
                - col("total_exports").cast(DataType::Float64))
            .alias("net_imports_gwh")])
            .with_columns([(col("net_imports_gwh")
                + col("net_electricity_production").cast(DataType::Float64))
            .alias("net_supply_gwh")])
            .with_columns([percentage("net_imports_gwh", "net_supply_gwh").alias("import_dependency_pct")])
            .collect()?
            .drop("net_supply_gwh")?;

        info!("trade KPI calculations complete");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::float_values;

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should not be null");
        assert!((actual - expected).abs() < 1e-2, "{actual} != {expected}");
    }

    #[test]
    fn generation_mix_treats_nulls_as_zero() {
        let df = df!(
            "country_id" => &[1i64],
            "date_id" => &[1i64],
            "coal" => &[None::<f64>],
            "oil" => &[None::<f64>],
            "natural_gas" => &[None::<f64>],
            "nuclear" => &[1000.0],
            "hydro" => &[200.0],
            "wind" => &[0.0],
            "solar" => &[0.0],
            "not_specified" => &[0.0],
        )
        .unwrap();

        let kpis = KpiCalculator::generation_mix(&df).unwrap();
        approx(float_values(&kpis, "total_generation_gwh").unwrap()[0], 1200.0);
        approx(float_values(&kpis, "low_carbon_gwh").unwrap()[0], 200.0);
        approx(float_values(&kpis, "fossil_gwh").unwrap()[0], 0.0);
        approx(float_values(&kpis, "low_carbon_share_pct").unwrap()[0], 16.67);
        approx(float_values(&kpis, "nuclear_share_pct").unwrap()[0], 83.33);
    }

    #[test]
    fn zero_generation_gives_null_shares() {
        let df = df!(
            "coal" => &[Some(0.0), Some(50.0)],
            "hydro" => &[None::<f64>, Some(50.0)],
        )
        .unwrap();
        let kpis = KpiCalculator::generation_mix(&df).unwrap();
        let shares = float_values(&kpis, "low_carbon_share_pct").unwrap();
        assert_eq!(shares[0], None);
        approx(shares[1], 50.0);
    }

    #[test]
    fn named_shares_never_exceed_total() {
        let df = df!(
            "coal" => &[10.0, 0.0, 3.0],
            "hydro" => &[5.0, 1.0, 0.0],
            "nuclear" => &[5.0, 0.0, 7.0],
            "not_specified" => &[Some(2.0), None, Some(1.0)],
        )
        .unwrap();
        let kpis = KpiCalculator::generation_mix(&df).unwrap();
        let low = float_values(&kpis, "low_carbon_share_pct").unwrap();
        let fossil = float_values(&kpis, "fossil_share_pct").unwrap();
        let nuclear = float_values(&kpis, "nuclear_share_pct").unwrap();
        for i in 0..kpis.height() {
            let sum = low[i].unwrap() + fossil[i].unwrap() + nuclear[i].unwrap();
            assert!(sum <= 100.0 + 1e-9, "row {i}: {sum}");
        }
    }

    #[test]
    fn trade_metrics_for_germany_january_2020() {
        let df = df!(
            "country" => &["Germany"],
            "year" => &[2020i64],
            "month" => &[1i64],
            "total_imports" => &[100.0],
            "total_exports" => &[40.0],
            "net_electricity_production" => &[500.0],
        )
        .unwrap();

        let kpis = KpiCalculator::trade_metrics(&df).unwrap();
        approx(float_values(&kpis, "net_imports_gwh").unwrap()[0], 60.0);
        approx(float_values(&kpis, "import_dependency_pct").unwrap()[0], 10.71);
        assert!(!has_column(&kpis, "net_supply_gwh"));
    }

    #[test]
    fn net_exporter_and_zero_denominator() {
        let df = df!(
            "total_imports" => &[10.0, 50.0],
            "total_exports" => &[30.0, 100.0],
            "net_electricity_production" => &[100.0, 50.0],
        )
        .unwrap();
        let kpis = KpiCalculator::trade_metrics(&df).unwrap();
        let net = float_values(&kpis, "net_imports_gwh").unwrap();
        let dependency = float_values(&kpis, "import_dependency_pct").unwrap();
        approx(net[0], -20.0);
        approx(dependency[0], -25.0);
        // -50 + 50 = 0
        assert_eq!(dependency[1], None);
    }

    #[test]
    fn trade_metrics_require_base_columns() {
        let df = df!("total_imports" => &[1.0]).unwrap();
        assert!(matches!(
            KpiCalculator::trade_metrics(&df),
            Err(KpiError::MissingColumn(c)) if c == "total_exports"
        ));
    }
}
