//! Column access helpers shared by every stage.
//! Typed extraction of column values into plain vectors.

use polars::prelude::*;

/// True when `df` carries a column named `name`.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Numeric dtypes treated as measures by the quality gate and KPIs.
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Values of `name` rendered as text; numeric columns are cast.
pub fn text_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

/// Values of `name` as `i64`. Fails on values that cannot be represented.
pub fn int_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let casted = df.column(name)?.strict_cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

/// Values of `name` as `f64`. Fails on values that cannot be represented.
pub fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let casted = df.column(name)?.strict_cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_typed_values() {
        let df = df!(
            "country" => &["Germany", "France"],
            "year" => &[2020i64, 2021],
            "value" => &[Some(1.5), None],
        )
        .unwrap();

        assert!(has_column(&df, "year"));
        assert!(!has_column(&df, "month"));
        assert_eq!(
            text_values(&df, "year").unwrap(),
            vec![Some("2020".to_string()), Some("2021".to_string())]
        );
        assert_eq!(int_values(&df, "year").unwrap(), vec![Some(2020), Some(2021)]);
        assert_eq!(float_values(&df, "value").unwrap(), vec![Some(1.5), None]);
        assert!(is_numeric(df.column("value").unwrap().dtype()));
        assert!(!is_numeric(df.column("country").unwrap().dtype()));
    }
}
