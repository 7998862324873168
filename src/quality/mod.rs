//! Quality module - data-quality gates for fact tables
//!
//! Stated validation totals (e.g. the `Electricity` product) are not
//! reconciled against the sum of their constituent fuels.

mod checks;

pub use checks::{
    check_not_null, check_unique_key, validate_production_fact, validate_trade_fact,
    QualityError, PRODUCTION_FACT_NAME, TRADE_FACT_NAME,
};
