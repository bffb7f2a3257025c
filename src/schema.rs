// Column classification and numeric coercion

use crate::data::{Table, Value};
use crate::error::SchemaError;
use std::collections::HashSet;

/// Marker tokens that identify summable columns (sales amounts, counts).
pub const DEFAULT_MEASURE_TOKENS: &[&str] = &[
    "매출", "금액", "건수", "인구수", "세대수", "점포수", "sales", "amount", "count",
];

/// Decides whether a column holds a measure, by substring tokens in its name.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureMatcher {
    tokens: Vec<String>,
}

impl Default for MeasureMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MEASURE_TOKENS.iter().copied())
    }
}

impl MeasureMatcher {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Case-insensitive substring match against any token.
    pub fn is_measure_column(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.tokens.iter().any(|t| name.contains(t.as_str()))
    }

    /// Measure columns of `table`, in header order.
    pub fn measure_columns<'a>(&self, table: &'a Table) -> Vec<&'a str> {
        table
            .headers
            .iter()
            .filter(|h| self.is_measure_column(h))
            .map(String::as_str)
            .collect()
    }
}

/// Coerce a measure cell to a number. Missing values and anything that does
/// not parse become zero. Thousands separators in text are accepted.
pub fn coerce_measure(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) if f.is_finite() => *f,
        Value::Float(_) | Value::Missing => 0.0,
        Value::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|&c| c != ',').collect();
            match cleaned.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => 0.0,
            }
        }
    }
}

/// Number of distinct display values in a column.
pub fn cardinality(table: &Table, column: &str) -> Result<usize, SchemaError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| SchemaError::missing(column, &table.headers))?;
    let distinct: HashSet<String> = table.column(idx).map(|v| v.to_string()).collect();
    Ok(distinct.len())
}

/// A column is categorical when it is not purely numeric and has at most
/// `threshold` distinct values.
pub fn is_categorical_column(
    table: &Table,
    column: &str,
    threshold: usize,
) -> Result<bool, SchemaError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| SchemaError::missing(column, &table.headers))?;

    if is_numeric_at(table, idx) {
        return Ok(false);
    }
    Ok(cardinality(table, column)? <= threshold)
}

/// True when the column has at least one value and every non-missing value
/// is numeric.
pub fn is_numeric_column(table: &Table, column: &str) -> Result<bool, SchemaError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| SchemaError::missing(column, &table.headers))?;
    Ok(is_numeric_at(table, idx))
}

pub(crate) fn is_numeric_at(table: &Table, idx: usize) -> bool {
    let mut seen = false;
    for value in table.column(idx) {
        match value {
            Value::Missing => {}
            v if v.is_numeric() => seen = true,
            _ => return false,
        }
    }
    seen
}

/// Categorical columns of `table`, in header order.
pub fn categorical_columns(table: &Table, threshold: usize) -> Vec<&str> {
    table
        .headers
        .iter()
        .filter(|h| is_categorical_column(table, h, threshold).unwrap_or(false))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_strings(
            vec!["자치구명".into(), "업종명".into(), "월매출액".into(), "메모".into()],
            vec![
                vec!["강남구".into(), "카페".into(), "100".into(), "a".into()],
                vec!["강남구".into(), "한식".into(), "N/A".into(), "b".into()],
                vec!["서초구".into(), "카페".into(), "".into(), "c".into()],
            ],
        )
    }

    #[test]
    fn test_is_measure_column() {
        let m = MeasureMatcher::default();
        assert!(m.is_measure_column("당월_매출_금액"));
        assert!(m.is_measure_column("총인구수"));
        assert!(m.is_measure_column("Sales"));
        assert!(!m.is_measure_column("자치구명"));
        assert!(!m.is_measure_column("행정구역"));
    }

    #[test]
    fn test_custom_tokens() {
        let m = MeasureMatcher::new(["  Qty ", ""]);
        assert_eq!(m.tokens(), &["qty".to_string()]);
        assert!(m.is_measure_column("order_qty"));
    }

    #[test]
    fn test_measure_columns() {
        let t = sample();
        assert_eq!(MeasureMatcher::default().measure_columns(&t), vec!["월매출액"]);
    }

    #[test]
    fn test_coerce_measure() {
        assert_eq!(coerce_measure(&Value::Int(5)), 5.0);
        assert_eq!(coerce_measure(&Value::Float(2.5)), 2.5);
        assert_eq!(coerce_measure(&Value::Missing), 0.0);
        assert_eq!(coerce_measure(&Value::Text("N/A".into())), 0.0);
        assert_eq!(coerce_measure(&Value::Text(" 1,234 ".into())), 1234.0);
        assert_eq!(coerce_measure(&Value::Text("inf".into())), 0.0);
    }

    #[test]
    fn test_is_categorical_column() {
        let t = sample();
        assert!(is_categorical_column(&t, "자치구명", 10).unwrap());
        assert!(!is_categorical_column(&t, "메모", 2).unwrap());
        // "N/A" makes the measure column textual, but it is still too diverse at 2
        assert!(!is_categorical_column(&t, "월매출액", 2).unwrap());
        assert!(is_categorical_column(&t, "없음", 10).is_err());
    }

    #[test]
    fn test_numeric_column_excluded_from_categorical() {
        let t = Table::from_strings(
            vec!["n".into()],
            vec![vec!["1".into()], vec!["".into()], vec!["2".into()]],
        );
        assert!(is_numeric_column(&t, "n").unwrap());
        assert!(!is_categorical_column(&t, "n", 10).unwrap());
    }

    #[test]
    fn test_categorical_columns() {
        let t = sample();
        assert_eq!(categorical_columns(&t, 2), vec!["자치구명", "업종명"]);
    }
}
