//! OECD processed dataset: the standardised balance extract restricted to
//! member countries, analysed balances and the study window, with fuel
//! classification columns attached.

use super::classifier::{BusinessClassifier, ClassifierError, IS_OECD_MEMBER};
use crate::data::columns::int_values;
use polars::prelude::*;
use tracing::info;

pub fn build_processed_dataset(
    balance: &DataFrame,
    classifier: &BusinessClassifier,
) -> Result<DataFrame, ClassifierError> {
    let windowed = classifier.retain_period(balance)?;
    let flagged = classifier.flag_members(&classifier.canonicalise_countries(&windowed)?)?;
    let mask = flagged.column(IS_OECD_MEMBER)?.bool()?.clone();
    let members = flagged.filter(&mask)?;
    let balances = classifier.retain_balances(&members)?;
    let mut out = classifier.classify_products(&balances)?;

    let labels: Vec<String> = int_values(&out, "year")?
        .into_iter()
        .zip(int_values(&out, "month")?)
        .map(|(y, m)| format!("{:04}-{:02}", y.unwrap_or_default(), m.unwrap_or_default()))
        .collect();
    out.with_column(Column::new("year_month".into(), labels))?;

    info!(rows = out.height(), "processed OECD dataset built");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::text_values;
    use crate::transform::classifier::FUEL_GROUP;

    #[test]
    fn restricts_to_members_balances_and_window() {
        let balance = df!(
            "country" => &["Germany", "Brazil", "Germany", "Germany", "Republic of Turkiye"],
            "balance" => &["Net Electricity Production", "Total Imports", "Remarks", "Total Imports", "Total Exports"],
            "product" => &["Oil and Petroleum Products", "Electricity", "Electricity", "Electricity", "Electricity"],
            "year" => &[2020i64, 2020, 2020, 2014, 2025],
            "month" => &[1i64, 1, 1, 12, 8],
            "value" => &[5.0, 1.0, 0.0, 3.0, 9.0],
        )
        .unwrap();

        let out = build_processed_dataset(&balance, &BusinessClassifier::default()).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            text_values(&out, "country").unwrap(),
            vec![Some("Germany".to_string()), Some("Turkiye".to_string())]
        );
        assert_eq!(
            text_values(&out, "year_month").unwrap(),
            vec![Some("2020-01".to_string()), Some("2025-08".to_string())]
        );
        assert_eq!(
            text_values(&out, FUEL_GROUP).unwrap(),
            vec![Some("FOSSIL".to_string()), Some("OTHER".to_string())]
        );
    }
}
