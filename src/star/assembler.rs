//! Fact Assembler Module
//! Joins monthly facts to the country/date dimensions, producing the pure
//! star variant (surrogate keys only) and the analytics variant (natural
//! and surrogate keys side by side).

use super::dimensions::{COUNTRY_ID, DATE_ID};
use crate::config::{self, PipelineConfig};
use crate::data::columns::text_values;
use crate::data::{DataLoader, LoaderError};
use crate::quality::{self, QualityError};
use crate::transform::NATURAL_KEY;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

/// Temporary row index restoring the fact's order after the joins.
const FACT_ROW: &str = "__fact_row";

#[derive(Error, Debug)]
pub enum StarError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error("{table}: {missing} rows have no country_id after dimension join (e.g. {example})")]
    MissingCountryKey {
        table: String,
        missing: usize,
        example: String,
    },
    #[error("{table}: {missing} rows have no date_id after dimension join (e.g. {example})")]
    MissingDateKey {
        table: String,
        missing: usize,
        example: String,
    },
}

/// Monthly facts with natural and surrogate keys, ready for KPIs.
#[derive(Debug, Clone)]
pub struct StarFacts {
    pub production: DataFrame,
    pub trade: DataFrame,
}

/// Attaches surrogate keys and enforces referential completeness and grain.
pub struct FactAssembler;

impl FactAssembler {
    /// Left-join `fact` to both dimensions, appending `country_id` and `date_id`.
    ///
    /// Natural keys are retained. Fails when any row lacks a surrogate key or
    /// when two rows share the same (`country_id`, `date_id`).
    pub fn attach_keys(
        fact: &DataFrame,
        dim_country: &DataFrame,
        dim_date: &DataFrame,
        table: &str,
    ) -> Result<DataFrame, StarError> {
        let country_keys = dim_country
            .clone()
            .lazy()
            .select([col("country"), col(COUNTRY_ID).cast(DataType::Int64)]);
        let date_keys = dim_date.clone().lazy().select([
            col("year").cast(DataType::Int64),
            col("month").cast(DataType::Int64),
            col(DATE_ID).cast(DataType::Int64),
        ]);

        let out = fact
            .with_row_index(FACT_ROW.into(), None)?
            .lazy()
            .join(
                country_keys,
                [col("country")],
                [col("country")],
                JoinArgs::new(JoinType::Left),
            )
            .join(
                date_keys,
                [col("year"), col("month")],
                [col("year"), col("month")],
                JoinArgs::new(JoinType::Left),
            )
            .sort([FACT_ROW], SortMultipleOptions::default())
            .collect()?
            .drop(FACT_ROW)?;

        Self::require_resolved(&out, COUNTRY_ID, table)?;
        Self::require_resolved(&out, DATE_ID, table)?;

        quality::check_unique_key(&out, &[COUNTRY_ID, DATE_ID], table)?;
        info!(table, rows = out.height(), "fact resolved to dimensional keys");
        Ok(out)
    }

    /// Fails when `key` has nulls after the join, naming the first
    /// unresolved natural key.
    fn require_resolved(keyed: &DataFrame, key: &str, table: &str) -> Result<(), StarError> {
        let missing = keyed.column(key)?.null_count();
        if missing == 0 {
            return Ok(());
        }

        let first = keyed
            .column(key)?
            .is_null()
            .into_iter()
            .position(|is_null| is_null == Some(true))
            .unwrap_or_default();
        let unresolved = keyed.slice(first as i64, 1);
        let render = |values: Vec<Option<String>>| {
            values
                .into_iter()
                .next()
                .flatten()
                .unwrap_or_else(|| "null".to_string())
        };
        let example = format!(
            "{} {}-{}",
            render(text_values(&unresolved, "country")?),
            render(text_values(&unresolved, "year")?),
            render(text_values(&unresolved, "month")?),
        );

        let table = table.to_string();
        Err(if key == COUNTRY_ID {
            StarError::MissingCountryKey { table, missing, example }
        } else {
            StarError::MissingDateKey { table, missing, example }
        })
    }

    /// Pure star variant: drop the natural key columns.
    pub fn finalise(keyed: &DataFrame) -> Result<DataFrame, StarError> {
        let mut out = keyed.clone();
        for key in NATURAL_KEY {
            out = out.drop(key)?;
        }
        Ok(out)
    }

    /// Attach keys and drop natural keys in one step.
    pub fn build_star(
        fact: &DataFrame,
        dim_country: &DataFrame,
        dim_date: &DataFrame,
        table: &str,
    ) -> Result<DataFrame, StarError> {
        Self::finalise(&Self::attach_keys(fact, dim_country, dim_date, table)?)
    }

    /// Load written dimensions and monthly facts, returning the analytics
    /// variant of both fact tables.
    pub fn load_star_facts(cfg: &PipelineConfig) -> Result<StarFacts, StarError> {
        info!("loading dimension tables");
        let dim_country = DataLoader::read_table(&cfg.output(config::DIM_COUNTRY))?;
        quality::check_not_null(&dim_country, &[COUNTRY_ID], "dim_country")?;
        quality::check_unique_key(&dim_country, &[COUNTRY_ID], "dim_country")?;
        let dim_date = DataLoader::read_table(&cfg.output(config::DIM_DATE))?;
        quality::check_not_null(&dim_date, &[DATE_ID], "dim_date")?;
        quality::check_unique_key(&dim_date, &[DATE_ID], "dim_date")?;

        info!("loading monthly fact tables");
        let production = DataLoader::read_table(&cfg.output(config::PRODUCTION_FACT))?;
        let trade = DataLoader::read_table(&cfg.output(config::TRADE_FACT))?;

        let facts = StarFacts {
            production: Self::attach_keys(
                &production,
                &dim_country,
                &dim_date,
                quality::PRODUCTION_FACT_NAME,
            )?,
            trade: Self::attach_keys(&trade, &dim_country, &dim_date, quality::TRADE_FACT_NAME)?,
        };
        info!("star schema facts ready with natural and surrogate keys");
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::int_values;
    use crate::star::DimensionBuilder;

    fn fact() -> DataFrame {
        df!(
            "country" => &["Germany", "France"],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 2],
            "total_imports" => &[100.0, 7.0],
        )
        .unwrap()
    }

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn attaches_surrogate_keys_and_keeps_natural_keys() {
        let fact = fact();
        let dim_country = DimensionBuilder::country(&[&fact]).unwrap();
        let dim_date = DimensionBuilder::date(&[&fact]).unwrap();

        let keyed = FactAssembler::attach_keys(&fact, &dim_country, &dim_date, "trade").unwrap();
        assert_eq!(
            column_names(&keyed),
            vec!["country", "year", "month", "total_imports", "country_id", "date_id"]
        );
        // France=1, Germany=2; 2020-01=1, 2020-02=2
        assert_eq!(int_values(&keyed, COUNTRY_ID).unwrap(), vec![Some(2), Some(1)]);
        assert_eq!(int_values(&keyed, DATE_ID).unwrap(), vec![Some(1), Some(2)]);

        let star = FactAssembler::finalise(&keyed).unwrap();
        assert_eq!(column_names(&star), vec!["total_imports", "country_id", "date_id"]);
    }

    #[test]
    fn missing_country_fails_naming_table() {
        let fact = fact();
        let other = df!("country" => &["Germany"]).unwrap();
        let dim_country = DimensionBuilder::country(&[&other]).unwrap();
        let dim_date = DimensionBuilder::date(&[&fact]).unwrap();

        let err = FactAssembler::attach_keys(&fact, &dim_country, &dim_date, "trade").unwrap_err();
        assert_eq!(
            err.to_string(),
            "trade: 1 rows have no country_id after dimension join (e.g. France 2020-2)"
        );
    }

    #[test]
    fn missing_date_fails() {
        let fact = fact();
        let dim_country = DimensionBuilder::country(&[&fact]).unwrap();
        let partial = df!("year" => &[2020i64], "month" => &[1i64]).unwrap();
        let dim_date = DimensionBuilder::date(&[&partial]).unwrap();

        assert!(matches!(
            FactAssembler::attach_keys(&fact, &dim_country, &dim_date, "trade"),
            Err(StarError::MissingDateKey { missing: 1, .. })
        ));
    }

    #[test]
    fn grain_violation_fails() {
        let fact = df!(
            "country" => &["Germany", "Germany"],
            "year" => &[2020i64, 2020],
            "month" => &[1i64, 1],
            "total_imports" => &[1.0, 2.0],
        )
        .unwrap();
        let dim_country = DimensionBuilder::country(&[&fact]).unwrap();
        let dim_date = DimensionBuilder::date(&[&fact]).unwrap();

        assert!(matches!(
            FactAssembler::attach_keys(&fact, &dim_country, &dim_date, "trade"),
            Err(StarError::Quality(QualityError::DuplicateKeys { .. }))
        ));
    }
}
