//! Business Classifier Module
//! Static lookup tables (fuel groups, OECD membership, validation totals,
//! renames) and the row filters/flags derived from them.

use crate::data::columns::{has_column, int_values, text_values};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

pub const COUNTRY: &str = "country";
pub const PRODUCT: &str = "product";
pub const BALANCE: &str = "balance";
pub const PRODUCT_CLEAN: &str = "product_clean";
pub const FUEL_GROUP: &str = "fuel_group";
pub const IS_ATOMIC_FUEL: &str = "is_atomic_fuel";
pub const IS_VALIDATION_TOTAL: &str = "is_validation_total";
pub const IS_OECD_MEMBER: &str = "is_oecd_member";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Required column '{0}' is missing")]
    MissingColumn(String),
}

/// Semantic fuel family of a product label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuelGroup {
    LowCarbon,
    Fossil,
    Nuclear,
    Other,
}

impl FuelGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelGroup::LowCarbon => "LOW_CARBON",
            FuelGroup::Fossil => "FOSSIL",
            FuelGroup::Nuclear => "NUCLEAR",
            FuelGroup::Other => "OTHER",
        }
    }
}

fn label_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Set of labels matched case-insensitively after trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    pub fn new(labels: &[&str]) -> Self {
        Self(labels.iter().map(|l| label_key(l)).collect())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(&label_key(label))
    }
}

/// 1:1 label substitution; labels not in the map pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap(BTreeMap<String, String>);

impl LabelMap {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(from, to)| (label_key(from), to.to_string()))
                .collect(),
        )
    }

    pub fn apply(&self, label: &str) -> String {
        self.0
            .get(&label_key(label))
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }
}

/// Inclusive (year, month) window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: (i64, i64),
    pub end: (i64, i64),
}

impl PeriodWindow {
    pub fn contains(&self, year: i64, month: i64) -> bool {
        (self.start..=self.end).contains(&(year, month))
    }
}

/// Business rules consumed by [`BusinessClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub product_renames: LabelMap,
    pub low_carbon: LabelSet,
    pub fossil: LabelSet,
    pub nuclear: LabelSet,
    pub validation_totals: LabelSet,
    pub excluded_entities: LabelSet,
    pub country_renames: LabelMap,
    /// `None` keeps every entity that is not an excluded aggregate.
    pub members: Option<LabelSet>,
    pub valid_balances: LabelSet,
    pub valid_fuels: LabelSet,
    pub period: PeriodWindow,
}

impl ClassifierRules {
    /// Rules for the IEA monthly electricity statistics extracts.
    pub fn iea_default() -> Self {
        Self {
            product_renames: LabelMap::new(&[
                ("Coal, Peat and Manufactured Gases", "Coal"),
                ("Oil and Petroleum Products", "Oil"),
            ]),
            low_carbon: LabelSet::new(&[
                "Hydro",
                "Wind",
                "Solar",
                "Geothermal",
                "Other Renewables",
                "Combustible Renewables",
            ]),
            fossil: LabelSet::new(&[
                "Coal",
                "Oil",
                "Natural Gas",
                "Other Combustible Non-Renewables",
            ]),
            nuclear: LabelSet::new(&["Nuclear"]),
            validation_totals: LabelSet::new(&[
                "Electricity",
                "Total Renewables (Hydro, Geo, Solar, Wind, Other)",
                "Total Combustible Fuels",
            ]),
            excluded_entities: LabelSet::new(&[
                "IEA Total",
                "OECD Total",
                "OECD Americas",
                "OECD Europe",
                "OECD Asia Oceania",
            ]),
            country_renames: LabelMap::new(&[
                ("United States of America", "United States"),
                ("Republic of Turkiye", "Turkiye"),
                ("People's Republic of China", "China"),
            ]),
            members: Some(LabelSet::new(&[
                "Australia",
                "Austria",
                "Belgium",
                "Canada",
                "Czech Republic",
                "Denmark",
                "Estonia",
                "Finland",
                "France",
                "Germany",
                "Greece",
                "Hungary",
                "Iceland",
                "Ireland",
                "Italy",
                "Japan",
                "Korea",
                "Latvia",
                "Lithuania",
                "Luxembourg",
                "Mexico",
                "Netherlands",
                "New Zealand",
                "Norway",
                "Poland",
                "Portugal",
                "Slovak Republic",
                "Slovenia",
                "Spain",
                "Sweden",
                "Switzerland",
                "Turkiye",
                "United Kingdom",
                "United States",
            ])),
            valid_balances: LabelSet::new(&[
                "Net Electricity Production",
                "Total Imports",
                "Total Exports",
                "Final Consumption (Calculated)",
                "Distribution Losses",
            ]),
            valid_fuels: LabelSet::new(&[
                "Coal",
                "Oil",
                "Natural gas",
                "Nuclear",
                "Hydro",
                "Wind",
                "Solar",
                "Geothermal",
                "Combustible renewables",
                "Other renewables",
                "Other combustible non-renewables",
                "Not specified",
            ]),
            period: PeriodWindow {
                start: (2015, 1),
                end: (2025, 12),
            },
        }
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::iea_default()
    }
}

/// Applies [`ClassifierRules`] to long-format tables.
pub struct BusinessClassifier {
    rules: ClassifierRules,
}

impl BusinessClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    /// Fuel family of an already-renamed product label.
    pub fn fuel_group(&self, product: &str) -> FuelGroup {
        if self.rules.nuclear.contains(product) {
            FuelGroup::Nuclear
        } else if self.rules.low_carbon.contains(product) {
            FuelGroup::LowCarbon
        } else if self.rules.fossil.contains(product) {
            FuelGroup::Fossil
        } else {
            FuelGroup::Other
        }
    }

    pub fn is_member(&self, country: &str) -> bool {
        self.rules
            .members
            .as_ref()
            .map_or(true, |members| members.contains(country))
    }

    /// Drop aggregates, canonicalise country names, keep whitelisted members.
    pub fn filter_entities(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        let countries = Self::text(df, COUNTRY)?;
        let keep: Vec<bool> = countries
            .iter()
            .map(|c| {
                c.as_deref().is_some_and(|c| {
                    !self.rules.excluded_entities.contains(c)
                        && self.is_member(&self.rules.country_renames.apply(c))
                })
            })
            .collect();

        let out = self.canonicalise_countries(&Self::retain(df, &keep)?)?;
        debug!(
            before = df.height(),
            after = out.height(),
            "entity filter applied"
        );
        Ok(out)
    }

    /// Replace country name variants with their canonical spelling.
    pub fn canonicalise_countries(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        let renamed: Vec<Option<String>> = Self::text(df, COUNTRY)?
            .into_iter()
            .map(|c| c.map(|c| self.rules.country_renames.apply(&c)))
            .collect();
        let mut out = df.clone();
        out.with_column(Column::new(COUNTRY.into(), renamed))?;
        Ok(out)
    }

    /// Add the `is_oecd_member` flag.
    pub fn flag_members(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        let flags: Vec<bool> = Self::text(df, COUNTRY)?
            .iter()
            .map(|c| c.as_deref().is_some_and(|c| self.is_member(c)))
            .collect();
        let mut out = df.clone();
        out.with_column(Column::new(IS_OECD_MEMBER.into(), flags))?;
        Ok(out)
    }

    /// Add `product_clean`, `fuel_group`, `is_atomic_fuel` and `is_validation_total`.
    ///
    /// The validation-total flag is evaluated on the raw product label.
    pub fn classify_products(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        let products = Self::text(df, PRODUCT)?;

        let mut clean = Vec::with_capacity(products.len());
        let mut groups = Vec::with_capacity(products.len());
        let mut atomic = Vec::with_capacity(products.len());
        let mut totals = Vec::with_capacity(products.len());
        for product in &products {
            let raw = product.as_deref().unwrap_or_default();
            let renamed = self.rules.product_renames.apply(raw);
            let group = self.fuel_group(&renamed);
            groups.push(group.as_str());
            atomic.push(group != FuelGroup::Other);
            totals.push(self.rules.validation_totals.contains(raw));
            clean.push(product.as_ref().map(|_| renamed));
        }

        let mut out = df.clone();
        out.with_column(Column::new(PRODUCT_CLEAN.into(), clean))?;
        out.with_column(Column::new(FUEL_GROUP.into(), groups))?;
        out.with_column(Column::new(IS_ATOMIC_FUEL.into(), atomic))?;
        out.with_column(Column::new(IS_VALIDATION_TOTAL.into(), totals))?;
        Ok(out)
    }

    /// Keep rows whose `column` holds one of the valid fuel categories.
    pub fn retain_fuels(&self, df: &DataFrame, column: &str) -> Result<DataFrame, ClassifierError> {
        self.retain_labels(df, column, &self.rules.valid_fuels)
    }

    /// Keep rows whose balance is one of the analysed balances.
    pub fn retain_balances(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        self.retain_labels(df, BALANCE, &self.rules.valid_balances)
    }

    /// Keep rows whose (year, month) falls inside the rules' period window.
    pub fn retain_period(&self, df: &DataFrame) -> Result<DataFrame, ClassifierError> {
        let years = Self::ints(df, "year")?;
        let months = Self::ints(df, "month")?;
        let keep: Vec<bool> = years
            .iter()
            .zip(&months)
            .map(|(y, m)| match (y, m) {
                (Some(y), Some(m)) => self.rules.period.contains(*y, *m),
                _ => false,
            })
            .collect();
        Self::retain(df, &keep)
    }

    fn retain_labels(
        &self,
        df: &DataFrame,
        column: &str,
        labels: &LabelSet,
    ) -> Result<DataFrame, ClassifierError> {
        let keep: Vec<bool> = Self::text(df, column)?
            .iter()
            .map(|v| v.as_deref().is_some_and(|v| labels.contains(v)))
            .collect();
        Self::retain(df, &keep)
    }

    fn retain(df: &DataFrame, keep: &[bool]) -> Result<DataFrame, ClassifierError> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(df.filter(&mask)?)
    }

    fn text(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>, ClassifierError> {
        if !has_column(df, column) {
            return Err(ClassifierError::MissingColumn(column.to_string()));
        }
        Ok(text_values(df, column)?)
    }

    fn ints(df: &DataFrame, column: &str) -> Result<Vec<Option<i64>>, ClassifierError> {
        if !has_column(df, column) {
            return Err(ClassifierError::MissingColumn(column.to_string()));
        }
        Ok(int_values(df, column)?)
    }
}

impl Default for BusinessClassifier {
    fn default() -> Self {
        Self::new(ClassifierRules::iea_default())
    }
}
