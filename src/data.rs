use serde::Serialize;
use std::fmt;

/// A single cell. Typed once on load; display form is what filters compare.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Missing,
}

impl Value {
    /// Type a raw CSV field. Empty (after trimming) means missing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view without coercion; text and missing give `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Missing => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Row-major table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string cells, typing each one with [`Value::parse`].
    pub fn from_strings(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.iter().map(|s| Value::parse(s)).collect())
            .collect();
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate the cells of one column, top to bottom.
    pub fn column<'a>(&'a self, index: usize) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| &row[index])
    }

    /// First `n` rows, for previews.
    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parse_types() {
        assert_eq!(Value::parse("42"), Value::Int(42));
        assert_eq!(Value::parse(" 1.5 "), Value::Float(1.5));
        assert_eq!(Value::parse(""), Value::Missing);
        assert_eq!(Value::parse("   "), Value::Missing);
        assert_eq!(Value::parse("강남구"), Value::Text("강남구".to_string()));
        assert_eq!(Value::parse("N/A"), Value::Text("N/A".to_string()));
        assert_eq!(Value::parse("NaN"), Value::Text("NaN".to_string()));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(100).to_string(), "100");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Missing.to_string(), "");
    }

    #[test]
    fn test_head_and_lookup() {
        let table = Table::from_strings(
            vec!["a".to_string(), "b".to_string()],
            vec![
                vec!["1".to_string(), "x".to_string()],
                vec!["2".to_string(), "y".to_string()],
            ],
        );
        assert_eq!(table.column_index("b"), Some(1));
        assert!(!table.has_column("c"));
        assert_eq!(table.head(1).row_count(), 1);
        let col: Vec<String> = table.column(1).map(|v| v.to_string()).collect();
        assert_eq!(col, vec!["x", "y"]);
    }
}
