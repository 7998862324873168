//! KPI module - generation mix and trade metrics

mod calculator;

pub use calculator::KpiCalculator;
