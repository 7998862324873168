//! Pivot Engine Module
//! Reshapes long-format (key, category, value) rows into wide fact tables.

use super::classifier::{BusinessClassifier, ClassifierError, BALANCE, COUNTRY, PRODUCT_CLEAN};
use crate::data::columns::{has_column, float_values, int_values, text_values};
use crate::data::normalise_name;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// Natural key of every monthly fact table.
pub const NATURAL_KEY: [&str; 3] = ["country", "year", "month"];

/// Balance bucket carrying free-text remarks rather than a measure.
const REMARKS: &str = "remarks";

#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
    #[error("Key column '{column}' is null at row {row}")]
    NullKey { column: String, row: usize },
    #[error("Category '{0}' collides with a key column")]
    CategoryCollision(String),
}

type NaturalKey = (String, i64, i64);

/// Long-to-wide reshaping with sum aggregation.
pub struct Reshaper;

impl Reshaper {
    /// Pivot `category`/`value` pairs into one column per category.
    ///
    /// One output row per distinct (`entity`, year, month), sorted by key.
    /// Category columns are sorted and renamed through `normalise_name`.
    /// Values sharing a key and category are summed; a cell with no
    /// non-null contribution stays null.
    pub fn pivot(
        df: &DataFrame,
        entity: &str,
        category: &str,
        value: &str,
    ) -> Result<DataFrame, PivotError> {
        for name in [entity, "year", "month", category, value] {
            if !has_column(df, name) {
                return Err(PivotError::MissingColumn(name.to_string()));
            }
        }

        let entities = text_values(df, entity)?;
        let years = int_values(df, "year")?;
        let months = int_values(df, "month")?;
        let categories = text_values(df, category)?;
        let values = float_values(df, value)?;

        let mut columns: BTreeSet<String> = BTreeSet::new();
        let mut cells: BTreeMap<NaturalKey, BTreeMap<String, Option<f64>>> = BTreeMap::new();

        for row in 0..df.height() {
            let Some(label) = &categories[row] else {
                continue;
            };
            let null_key = |column: &str| PivotError::NullKey {
                column: column.to_string(),
                row,
            };
            let key = (
                entities[row].clone().ok_or_else(|| null_key(entity))?,
                years[row].ok_or_else(|| null_key("year"))?,
                months[row].ok_or_else(|| null_key("month"))?,
            );

            let name = normalise_name(label);
            if name == entity || name == "year" || name == "month" {
                return Err(PivotError::CategoryCollision(name));
            }
            columns.insert(name.clone());

            let cell = cells.entry(key).or_default().entry(name).or_insert(None);
            if let Some(v) = values[row] {
                *cell = Some(cell.unwrap_or(0.0) + v);
            }
        }

        let mut key_entity = Vec::with_capacity(cells.len());
        let mut key_year = Vec::with_capacity(cells.len());
        let mut key_month = Vec::with_capacity(cells.len());
        let mut wide: BTreeMap<&str, Vec<Option<f64>>> = columns
            .iter()
            .map(|c| (c.as_str(), Vec::with_capacity(cells.len())))
            .collect();

        for ((e, y, m), row_cells) in &cells {
            key_entity.push(e.clone());
            key_year.push(*y);
            key_month.push(*m);
            for (name, values) in wide.iter_mut() {
                values.push(row_cells.get(*name).copied().flatten());
            }
        }

        let mut out = vec![
            Column::new(normalise_name(entity).into(), key_entity),
            Column::new("year".into(), key_year),
            Column::new("month".into(), key_month),
        ];
        out.extend(
            wide.into_iter()
                .map(|(name, values)| Column::new(name.into(), values)),
        );

        let out = DataFrame::new(out)?;
        debug!(rows = out.height(), categories = columns.len(), "pivot complete");
        Ok(out)
    }

    /// Production fact: valid fuel categories only, one column per fuel.
    pub fn pivot_production_fuels(
        df: &DataFrame,
        classifier: &BusinessClassifier,
    ) -> Result<DataFrame, PivotError> {
        let classified = classifier.classify_products(df)?;
        let fuels = classifier.retain_fuels(&classified, PRODUCT_CLEAN)?;
        let out = Self::pivot(&fuels, COUNTRY, PRODUCT_CLEAN, "value")?;
        info!(rows = out.height(), columns = out.width(), "production fuels pivoted");
        Ok(out)
    }

    /// Trade fact: one column per balance, without the remarks bucket.
    pub fn pivot_balance_features(df: &DataFrame) -> Result<DataFrame, PivotError> {
        let mut out = Self::pivot(df, COUNTRY, BALANCE, "value")?;
        if has_column(&out, REMARKS) {
            out = out.drop(REMARKS)?;
        }
        info!(rows = out.height(), columns = out.width(), "balance features pivoted");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataProcessor;
    use std::collections::BTreeSet;

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sums_duplicates_and_leaves_absent_categories_null() {
        let long = df!(
            "country" => &["Germany", "Germany", "Germany", "France"],
            "year" => &[2020i64, 2020, 2020, 2020],
            "month" => &[1i64, 1, 1, 1],
            "balance" => &["Total Imports", "Total Imports", "Total Exports", "Total Imports"],
            "value" => &[60.0, 40.0, 40.0, 7.0],
        )
        .unwrap();

        let wide = Reshaper::pivot(&long, "country", "balance", "value").unwrap();
        assert_eq!(column_names(&wide), vec!["country", "year", "month", "total_exports", "total_imports"]);
        // sorted by key: France before Germany
        assert_eq!(
            text_values(&wide, "country").unwrap(),
            vec![Some("France".to_string()), Some("Germany".to_string())]
        );
        assert_eq!(float_values(&wide, "total_imports").unwrap(), vec![Some(7.0), Some(100.0)]);
        assert_eq!(float_values(&wide, "total_exports").unwrap(), vec![None, Some(40.0)]);
    }

    #[test]
    fn null_only_cells_stay_null() {
        let long = df!(
            "country" => &["Germany", "Germany"],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
            "balance" => &["Total Imports", "Total Exports"],
            "value" => &[None, Some(3.0)],
        )
        .unwrap();
        let wide = Reshaper::pivot(&long, "country", "balance", "value").unwrap();
        assert_eq!(float_values(&wide, "total_imports").unwrap(), vec![None]);
    }

    #[test]
    fn drops_remarks_bucket() {
        let long = df!(
            "country" => &["Germany", "Germany"],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
            "balance" => &["Remarks", "Net Electricity Production"],
            "value" => &[0.0, 500.0],
        )
        .unwrap();
        let wide = Reshaper::pivot_balance_features(&long).unwrap();
        assert_eq!(column_names(&wide), vec!["country", "year", "month", "net_electricity_production"]);
    }

    #[test]
    fn production_pivot_keeps_only_valid_fuels() {
        let long = df!(
            "country" => &["Germany", "Germany", "Germany", "Germany"],
            "product" => &["Coal", "Electricity", "Other combustible non-renewables", "Wind"],
            "year" => &[2020i64, 2020, 2020, 2020],
            "month" => &[3i64, 3, 3, 3],
            "value" => &[10.0, 99.0, 1.0, 5.0],
        )
        .unwrap();
        let wide = Reshaper::pivot_production_fuels(&long, &BusinessClassifier::default()).unwrap();
        assert_eq!(
            column_names(&wide),
            vec!["country", "year", "month", "coal", "other_combustible_non_renewables", "wind"]
        );
    }

    #[test]
    fn null_key_component_is_rejected() {
        let long = df!(
            "country" => &[None, Some("Germany")],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
            "balance" => &["Total Imports", "Total Imports"],
            "value" => &[1.0, 2.0],
        )
        .unwrap();
        assert!(matches!(
            Reshaper::pivot(&long, "country", "balance", "value"),
            Err(PivotError::NullKey { row: 0, .. })
        ));
    }

    #[test]
    fn melt_recovers_pivoted_triples() {
        let long = df!(
            "country" => &["Germany", "Germany", "France"],
            "year" => &[2020i64, 2020, 2021],
            "month" => &[1i64, 1, 5],
            "balance" => &["total_imports", "total_exports", "total_imports"],
            "value" => &[100.0, 40.0, 7.0],
        )
        .unwrap();
        let wide = Reshaper::pivot(&long, "country", "balance", "value").unwrap();
        let melted = DataProcessor::melt_wide(
            &wide,
            &NATURAL_KEY,
            &["total_exports", "total_imports"],
        )
        .unwrap();

        let triples = |df: &DataFrame, category: &str| -> BTreeSet<(String, i64, i64, String, i64)> {
            let c = text_values(df, "country").unwrap();
            let y = int_values(df, "year").unwrap();
            let m = int_values(df, "month").unwrap();
            let k = text_values(df, category).unwrap();
            let v = float_values(df, "value").unwrap();
            (0..df.height())
                .map(|i| {
                    (
                        c[i].clone().unwrap(),
                        y[i].unwrap(),
                        m[i].unwrap(),
                        k[i].clone().unwrap(),
                        v[i].unwrap() as i64,
                    )
                })
                .collect()
        };
        assert_eq!(triples(&long, "balance"), triples(&melted, "category"));
    }
}
