//! Quality Gate Module
//! Composable read-only table checks and the per-fact validation routines.
//! Every check either returns `Ok(())` or the first violation it finds.

use crate::data::columns::{float_values, has_column, is_numeric, text_values};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

pub const PRODUCTION_FACT_NAME: &str = "fact_electricity_production_monthly";
pub const TRADE_FACT_NAME: &str = "fact_electricity_trade_monthly";

/// Key and surrogate columns excluded from measure checks.
const KEY_COLUMNS: [&str; 5] = ["country", "year", "month", "country_id", "date_id"];

/// One row taking part in a duplicate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRow {
    pub row: usize,
    pub key: String,
}

fn render_rows(rows: &[DuplicateRow]) -> String {
    rows.iter()
        .map(|r| format!("row {} ({})", r.row, r.key))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pct(ratio: &f64) -> f64 {
    ratio * 100.0
}

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("[QUALITY FAIL] {table} is missing column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("[QUALITY FAIL] {table} is empty.")]
    Empty { table: String },
    #[error("[QUALITY FAIL] {table} has {count} null values in '{column}'")]
    NullValues {
        table: String,
        column: String,
        count: usize,
    },
    #[error("[QUALITY FAIL] {table} has duplicate primary keys on {columns:?}: {}", render_rows(.rows))]
    DuplicateKeys {
        table: String,
        columns: Vec<String>,
        rows: Vec<DuplicateRow>,
    },
    #[error("[QUALITY FAIL] {table} contains {count} negative values in '{column}' (min {min})")]
    NegativeValues {
        table: String,
        column: String,
        count: usize,
        min: f64,
    },
    #[error("[QUALITY FAIL] {table}.{column} null ratio {:.2}% exceeds threshold {:.2}%", pct(.observed), pct(.threshold))]
    NullRatioExceeded {
        table: String,
        column: String,
        observed: f64,
        threshold: f64,
    },
}

/// Null-ratio tolerance for one fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityPolicy {
    pub max_null_ratio: f64,
    pub exempt_columns: Vec<String>,
}

impl QualityPolicy {
    /// Fuel mixes are sparse by geography.
    pub fn production() -> Self {
        Self {
            max_null_ratio: 0.50,
            exempt_columns: vec!["not_specified".to_string()],
        }
    }

    pub fn trade() -> Self {
        Self {
            max_null_ratio: 0.40,
            exempt_columns: Vec::new(),
        }
    }
}

fn require(df: &DataFrame, column: &str, table: &str) -> Result<(), QualityError> {
    if has_column(df, column) {
        Ok(())
    } else {
        Err(QualityError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

/// Names of all numeric columns.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Numeric columns that are measures rather than natural or surrogate keys.
pub fn measure_columns(df: &DataFrame) -> Vec<String> {
    numeric_columns(df)
        .into_iter()
        .filter(|c| !KEY_COLUMNS.contains(&c.as_str()))
        .collect()
}

pub fn check_not_empty(df: &DataFrame, table: &str) -> Result<(), QualityError> {
    if df.height() == 0 {
        return Err(QualityError::Empty {
            table: table.to_string(),
        });
    }
    Ok(())
}

pub fn check_not_null(df: &DataFrame, columns: &[&str], table: &str) -> Result<(), QualityError> {
    for column in columns {
        require(df, column, table)?;
        let count = df.column(column)?.null_count();
        if count > 0 {
            return Err(QualityError::NullValues {
                table: table.to_string(),
                column: column.to_string(),
                count,
            });
        }
    }
    Ok(())
}

/// Fails when two or more rows share the same values on `columns`.
///
/// Every row taking part in a duplicate is reported, not only the repeats.
pub fn check_unique_key(df: &DataFrame, columns: &[&str], table: &str) -> Result<(), QualityError> {
    let mut parts: Vec<Vec<Option<String>>> = Vec::with_capacity(columns.len());
    for column in columns {
        require(df, column, table)?;
        parts.push(text_values(df, column)?);
    }

    let keys: Vec<Vec<Option<&str>>> = (0..df.height())
        .map(|row| parts.iter().map(|values| values[row].as_deref()).collect())
        .collect();

    let mut counts: HashMap<&[Option<&str>], usize> = HashMap::new();
    for key in &keys {
        *counts.entry(key.as_slice()).or_default() += 1;
    }

    let rows: Vec<DuplicateRow> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| counts[key.as_slice()] > 1)
        .map(|(row, key)| DuplicateRow {
            row,
            key: key
                .iter()
                .map(|v| v.unwrap_or("null"))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    if !rows.is_empty() {
        return Err(QualityError::DuplicateKeys {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        });
    }
    Ok(())
}

pub fn check_non_negative(df: &DataFrame, columns: &[&str], table: &str) -> Result<(), QualityError> {
    for column in columns {
        require(df, column, table)?;
        let negatives: Vec<f64> = float_values(df, column)?
            .into_iter()
            .flatten()
            .filter(|v| *v < 0.0)
            .collect();
        if !negatives.is_empty() {
            return Err(QualityError::NegativeValues {
                table: table.to_string(),
                column: column.to_string(),
                count: negatives.len(),
                min: negatives.iter().copied().fold(f64::INFINITY, f64::min),
            });
        }
    }
    Ok(())
}

/// Fails on the first column (in column order) whose null fraction exceeds
/// `max_null_ratio`. Columns listed in `exempt` are skipped.
pub fn check_null_threshold(
    df: &DataFrame,
    max_null_ratio: f64,
    exempt: &[&str],
    table: &str,
) -> Result<(), QualityError> {
    let height = df.height();
    if height == 0 {
        return Ok(());
    }

    let violation = df
        .get_columns()
        .par_iter()
        .filter(|col| !exempt.contains(&col.name().as_str()))
        .map(|col| (col.name().to_string(), col.null_count() as f64 / height as f64))
        .find_first(|(_, ratio)| *ratio > max_null_ratio);

    match violation {
        Some((column, observed)) => Err(QualityError::NullRatioExceeded {
            table: table.to_string(),
            column,
            observed,
            threshold: max_null_ratio,
        }),
        None => Ok(()),
    }
}

fn validate_fact(df: &DataFrame, table: &str, policy: &QualityPolicy) -> Result<(), QualityError> {
    check_not_empty(df, table)?;
    check_unique_key(df, &["country", "year", "month"], table)?;

    let measures = measure_columns(df);
    let measures: Vec<&str> = measures.iter().map(String::as_str).collect();
    debug!(table, measures = ?measures, "checking measure columns");
    check_non_negative(df, &measures, table)?;

    let exempt: Vec<&str> = policy.exempt_columns.iter().map(String::as_str).collect();
    check_null_threshold(df, policy.max_null_ratio, &exempt, table)?;

    info!(table, rows = df.height(), columns = df.width(), "quality checks passed");
    Ok(())
}

pub fn validate_production_fact(df: &DataFrame) -> Result<(), QualityError> {
    validate_fact(df, PRODUCTION_FACT_NAME, &QualityPolicy::production())
}

pub fn validate_trade_fact(df: &DataFrame) -> Result<(), QualityError> {
    validate_fact(df, TRADE_FACT_NAME, &QualityPolicy::trade())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> DataFrame {
        df!(
            "country" => &["Germany", "Germany", "France"],
            "year" => &[2020i64, 2020, 2020],
            "month" => &[1i64, 2, 1],
            "coal" => &[Some(10.0), None, Some(3.0)],
            "wind" => &[Some(1.0), Some(2.0), Some(0.0)],
            "not_specified" => &[None::<f64>, None, None],
        )
        .unwrap()
    }

    #[test]
    fn valid_production_fact_passes() {
        validate_production_fact(&production()).unwrap();
    }

    #[test]
    fn empty_table_fails() {
        let df = production().head(Some(0));
        let err = validate_production_fact(&df).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[QUALITY FAIL] fact_electricity_production_monthly is empty."
        );
    }

    #[test]
    fn duplicate_keys_name_every_offending_row() {
        let df = df!(
            "country" => &["Germany", "France", "Germany"],
            "year" => &[2020i64, 2020, 2020],
            "month" => &[1i64, 1, 1],
            "total_imports" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        match check_unique_key(&df, &["country", "year", "month"], TRADE_FACT_NAME).unwrap_err() {
            QualityError::DuplicateKeys { rows, .. } => {
                assert_eq!(
                    rows,
                    vec![
                        DuplicateRow { row: 0, key: "Germany, 2020, 1".to_string() },
                        DuplicateRow { row: 2, key: "Germany, 2020, 1".to_string() },
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_key_is_distinct_from_literal_null_text() {
        let df = df!(
            "country" => &[None, Some("null")],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
        )
        .unwrap();
        check_unique_key(&df, &["country", "year", "month"], TRADE_FACT_NAME).unwrap();

        let repeated = df!(
            "country" => &[None::<&str>, None],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
        )
        .unwrap();
        assert!(matches!(
            check_unique_key(&repeated, &["country", "year", "month"], TRADE_FACT_NAME),
            Err(QualityError::DuplicateKeys { .. })
        ));
    }

    #[test]
    fn negative_measure_fails_naming_column() {
        let mut df = production();
        df.with_column(Column::new("wind".into(), vec![Some(1.0), Some(-2.0), None]))
            .unwrap();
        let err = validate_production_fact(&df).unwrap_err();
        assert!(matches!(
            &err,
            QualityError::NegativeValues { column, count: 1, .. } if column == "wind"
        ));
    }

    #[test]
    fn null_ratio_reports_observed_and_threshold() {
        let df = df!(
            "country" => &["Germany", "France"],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
            "total_imports" => &[Some(1.0), None],
        )
        .unwrap();
        let err = validate_trade_fact(&df).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[QUALITY FAIL] fact_electricity_trade_monthly.total_imports null ratio 50.00% exceeds threshold 40.00%"
        );
    }

    #[test]
    fn exempt_columns_skip_null_ratio() {
        let df = production();
        // not_specified is 100% null but exempt for production facts
        check_null_threshold(&df, 0.5, &["not_specified"], PRODUCTION_FACT_NAME).unwrap();
        assert!(check_null_threshold(&df, 0.5, &[], PRODUCTION_FACT_NAME).is_err());
    }

    #[test]
    fn not_null_detects_missing_keys() {
        let df = df!("country_id" => &[Some(1i64), None]).unwrap();
        assert!(matches!(
            check_not_null(&df, &["country_id"], "dim_country"),
            Err(QualityError::NullValues { count: 1, .. })
        ));
    }

    #[test]
    fn measure_columns_exclude_keys() {
        assert_eq!(measure_columns(&production()), vec!["coal", "wind", "not_specified"]);
    }
}
