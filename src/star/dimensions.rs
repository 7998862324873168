//! Dimension Builder Module
//! Surrogate-keyed country and date dimensions derived from fact natural keys.

use crate::data::columns::{has_column, int_values, text_values};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

pub const COUNTRY_ID: &str = "country_id";
pub const DATE_ID: &str = "date_id";

#[derive(Error, Debug)]
pub enum DimensionError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Fact table is missing natural key column '{0}'")]
    MissingColumn(String),
    #[error("{year}-{month} is not a calendar month")]
    InvalidCalendarMonth { year: i64, month: i64 },
}

/// Builds dimension tables from the union of fact-table natural keys.
pub struct DimensionBuilder;

impl DimensionBuilder {
    /// `[country_id, country]`, names sorted lexicographically, ids from 1.
    pub fn country(facts: &[&DataFrame]) -> Result<DataFrame, DimensionError> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for fact in facts {
            Self::require(fact, "country")?;
            names.extend(text_values(fact, "country")?.into_iter().flatten());
        }

        let ids: Vec<i64> = (1..=names.len() as i64).collect();
        let names: Vec<String> = names.into_iter().collect();
        let dim = DataFrame::new(vec![
            Column::new(COUNTRY_ID.into(), ids),
            Column::new("country".into(), names),
        ])?;

        info!(rows = dim.height(), "dim_country built");
        Ok(dim)
    }

    /// `[date_id, year, month, date_start, month_name, year_month]`, chronological.
    pub fn date(facts: &[&DataFrame]) -> Result<DataFrame, DimensionError> {
        let mut periods: BTreeSet<(i64, i64)> = BTreeSet::new();
        for fact in facts {
            Self::require(fact, "year")?;
            Self::require(fact, "month")?;
            let years = int_values(fact, "year")?;
            let months = int_values(fact, "month")?;
            periods.extend(
                years
                    .into_iter()
                    .zip(months)
                    .filter_map(|(y, m)| Some((y?, m?))),
            );
        }

        let n = periods.len();
        let mut years = Vec::with_capacity(n);
        let mut months = Vec::with_capacity(n);
        let mut starts = Vec::with_capacity(n);
        let mut month_names = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for (year, month) in periods {
            let start = i32::try_from(year)
                .ok()
                .zip(u32::try_from(month).ok())
                .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
                .ok_or(DimensionError::InvalidCalendarMonth { year, month })?;
            years.push(year);
            months.push(month);
            starts.push(start.format("%Y-%m-%d").to_string());
            month_names.push(start.format("%B").to_string());
            labels.push(start.format("%Y-%m").to_string());
        }

        let ids: Vec<i64> = (1..=n as i64).collect();
        let dim = DataFrame::new(vec![
            Column::new(DATE_ID.into(), ids),
            Column::new("year".into(), years),
            Column::new("month".into(), months),
            Column::new("date_start".into(), starts),
            Column::new("month_name".into(), month_names),
            Column::new("year_month".into(), labels),
        ])?;

        info!(
            rows = dim.height(),
            first = dim_label(&dim, 0).as_deref().unwrap_or("-"),
            last = dim_label(&dim, n.saturating_sub(1)).as_deref().unwrap_or("-"),
            "dim_date built"
        );
        Ok(dim)
    }

    fn require(df: &DataFrame, name: &str) -> Result<(), DimensionError> {
        if has_column(df, name) {
            Ok(())
        } else {
            Err(DimensionError::MissingColumn(name.to_string()))
        }
    }
}

fn dim_label(dim: &DataFrame, row: usize) -> Option<String> {
    text_values(dim, "year_month").ok()?.get(row).cloned().flatten()
}
