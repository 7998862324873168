//! Data Processor Module
//! Column/value standardisation of the raw extracts, plus the melt (unpivot)
//! and profiling helpers used for inspection.

use super::columns::{has_column, text_values};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Categorical columns trimmed in the production extract.
const PRODUCTION_TEXT_COLUMNS: [&str; 2] = ["country", "product"];
/// Categorical columns trimmed in the balance extract.
const BALANCE_TEXT_COLUMNS: [&str; 3] = ["country", "balance", "product"];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
    #[error("Column '{column}' row {row}: cannot parse period '{token}' as abbreviated month-year (e.g. Jan-20)")]
    UnparseablePeriod {
        column: String,
        row: usize,
        token: String,
    },
    #[error("Column '{column}' row {row}: non-numeric value '{token}'")]
    NonNumericValue {
        column: String,
        row: usize,
        token: String,
    },
    #[error("Column '{column}' row {row}: value is missing")]
    MissingValue { column: String, row: usize },
    #[error("Column 'month' row {row}: {month} is not a calendar month")]
    InvalidMonth { row: usize, month: i64 },
}

/// Normalise a column or category label to snake_case.
///
/// Trims, lower-cases, turns spaces and hyphens into underscores and drops
/// brackets and commas, so `"Final Consumption (Calculated)"` becomes
/// `final_consumption_calculated`.
pub fn normalise_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            '(' | ')' | ',' => {}
            ' ' | '-' | '_' => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
            }
            c => out.extend(c.to_lowercase()),
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Parse an abbreviated month-year period such as `Jan-20` into (year, month).
pub fn parse_period(token: &str) -> Option<(i64, i64)> {
    let date = NaiveDate::parse_from_str(&format!("01-{}", token.trim()), "%d-%b-%y").ok()?;
    Some((date.year() as i64, date.month() as i64))
}

/// Handles standardisation and reshaping helpers over raw tables.
pub struct DataProcessor;

impl DataProcessor {
    /// Rename every column through [`normalise_name`]. The input is untouched.
    pub fn clean_column_names(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let columns: Vec<Column> = df
            .get_columns()
            .iter()
            .map(|c| c.clone().with_name(normalise_name(c.name()).into()))
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    /// Standardise the production-by-fuel extract.
    ///
    /// Output keeps the extract's columns with `year`/`month` as `i64` and
    /// `value` as `f64`.
    pub fn standardise_production(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let mut out = Self::clean_column_names(df)?;
        Self::trim_text_columns(&mut out, &PRODUCTION_TEXT_COLUMNS)?;

        let years = Self::coerce_int(&out, "year")?;
        let months = Self::coerce_int(&out, "month")?;
        if let Some((row, &month)) = months
            .iter()
            .enumerate()
            .find(|(_, m)| !(1..=12).contains(*m))
        {
            return Err(ProcessorError::InvalidMonth { row, month });
        }
        let values = Self::coerce_float(&out, "value")?;

        out.with_column(Column::new("year".into(), years))?;
        out.with_column(Column::new("month".into(), months))?;
        out.with_column(values)?;

        debug!(rows = out.height(), columns = out.width(), "production extract standardised");
        Ok(out)
    }

    /// Standardise the balance-by-category extract.
    ///
    /// `time` is decomposed into `year` and `month`; the `unit` column is
    /// dropped since the extract carries a single unit.
    pub fn standardise_balance(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let mut out = Self::clean_column_names(df)?;
        Self::trim_text_columns(&mut out, &BALANCE_TEXT_COLUMNS)?;
        Self::trim_text_columns(&mut out, &["time"])?;

        let periods = text_values(&out, "time")?;
        let mut years = Vec::with_capacity(periods.len());
        let mut months = Vec::with_capacity(periods.len());
        for (row, token) in periods.iter().enumerate() {
            let token = token.as_deref().unwrap_or_default();
            let (year, month) =
                parse_period(token).ok_or_else(|| ProcessorError::UnparseablePeriod {
                    column: "time".to_string(),
                    row,
                    token: token.to_string(),
                })?;
            years.push(year);
            months.push(month);
        }
        let values = Self::coerce_float(&out, "value")?;

        out.with_column(Column::new("year".into(), years))?;
        out.with_column(Column::new("month".into(), months))?;
        out.with_column(values)?;
        if has_column(&out, "unit") {
            out = out.drop("unit")?;
        }

        debug!(rows = out.height(), columns = out.width(), "balance extract standardised");
        Ok(out)
    }

    /// Transform wide data back to long format (inverse of the pivot).
    ///
    /// Output columns: [id_cols.., "category", "value"]. Null cells are skipped.
    pub fn melt_wide(
        df: &DataFrame,
        id_cols: &[&str],
        value_cols: &[&str],
    ) -> Result<DataFrame, ProcessorError> {
        let mut rows: Vec<IdxSize> = Vec::new();
        let mut categories: Vec<String> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for value_col in value_cols {
            let column = Self::require(df, value_col)?;
            let value_f64 = column.cast(&DataType::Float64)?;
            let value_ca = value_f64.f64()?;

            for (i, v) in value_ca.into_iter().enumerate() {
                if let Some(v) = v {
                    rows.push(i as IdxSize);
                    categories.push(value_col.to_string());
                    values.push(v);
                }
            }
        }

        let mut out = df
            .select(id_cols.iter().copied())?
            .take(&IdxCa::from_vec("row".into(), rows))?;
        out.with_column(Column::new("category".into(), categories))?;
        out.with_column(Column::new("value".into(), values))?;
        Ok(out)
    }

    /// Sorted distinct non-null values of a column.
    pub fn distinct_values(df: &DataFrame, column: &str) -> Result<Vec<String>, ProcessorError> {
        Ok(Self::value_counts(df, column)?
            .into_iter()
            .map(|(value, _)| value)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    /// Occurrence count per distinct value, most frequent first.
    pub fn value_counts(
        df: &DataFrame,
        column: &str,
    ) -> Result<Vec<(String, usize)>, ProcessorError> {
        Self::require(df, column)?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in text_values(df, column)?.into_iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, ProcessorError> {
        df.column(name)
            .map_err(|_| ProcessorError::MissingColumn(name.to_string()))
    }

    fn trim_text_columns(df: &mut DataFrame, names: &[&str]) -> Result<(), ProcessorError> {
        for name in names {
            if !has_column(df, name) {
                continue;
            }
            let trimmed: Vec<Option<String>> = text_values(df, name)?
                .into_iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect();
            df.with_column(Column::new((*name).into(), trimmed))?;
        }
        Ok(())
    }

    fn coerce_int(df: &DataFrame, name: &str) -> Result<Vec<i64>, ProcessorError> {
        let column = Self::require(df, name)?;
        let parsed: Vec<Option<i64>> = match column.dtype() {
            DataType::String => column
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, token)| match token.map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(t) => t.parse::<i64>().map(Some).map_err(|_| {
                        ProcessorError::NonNumericValue {
                            column: name.to_string(),
                            row,
                            token: t.to_string(),
                        }
                    }),
                })
                .collect::<Result<_, _>>()?,
            _ => column
                .strict_cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .collect(),
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| ProcessorError::MissingValue {
                    column: name.to_string(),
                    row,
                })
            })
            .collect()
    }

    fn coerce_float(df: &DataFrame, name: &str) -> Result<Column, ProcessorError> {
        let column = Self::require(df, name)?;
        let values: Vec<Option<f64>> = match column.dtype() {
            DataType::String => column
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, token)| match token.map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(t) => t.parse::<f64>().map(Some).map_err(|_| {
                        ProcessorError::NonNumericValue {
                            column: name.to_string(),
                            row,
                            token: t.to_string(),
                        }
                    }),
                })
                .collect::<Result<_, _>>()?,
            _ => column
                .strict_cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect(),
        };
        Ok(Column::new(name.into(), values))
    }
}
