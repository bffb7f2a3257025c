// Categorical row filtering

use crate::data::Table;
use crate::error::SchemaError;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// What a single filter call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterApplied {
    /// Rows outside the allowed set were dropped.
    Subset { kept: usize, dropped: usize },
    /// Every observed value was allowed; the input passes through.
    AllSelected,
    /// Nothing was selected; treated as "no filter".
    EmptySelectionIgnored,
}

/// Result of [`filter`]. Borrows the input when nothing was removed.
#[derive(Debug, Clone)]
pub struct Filtered<'a> {
    pub table: Cow<'a, Table>,
    pub applied: FilterApplied,
}

impl<'a> Filtered<'a> {
    pub fn into_owned(self) -> Table {
        self.table.into_owned()
    }
}

/// Distinct display values of `column`, in first-occurrence order.
pub fn unique_values(table: &Table, column: &str) -> Result<Vec<String>, SchemaError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| SchemaError::missing(column, &table.headers))?;

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for value in table.column(idx) {
        let key = value.to_string();
        if seen.insert(key.clone()) {
            ordered.push(key);
        }
    }
    Ok(ordered)
}

/// Keep rows whose `column` value is in `allowed`.
///
/// An empty `allowed` set returns the table unfiltered, since selecting
/// nothing almost always means "no filter". A set covering every observed
/// value also returns the input untouched.
pub fn filter<'a>(
    table: &'a Table,
    column: &str,
    allowed: &BTreeSet<String>,
) -> Result<Filtered<'a>, SchemaError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| SchemaError::missing(column, &table.headers))?;

    if allowed.is_empty() {
        warn!(column, "empty selection, showing all rows");
        return Ok(Filtered {
            table: Cow::Borrowed(table),
            applied: FilterApplied::EmptySelectionIgnored,
        });
    }

    let keep: Vec<bool> = table
        .column(idx)
        .map(|v| allowed.contains(&v.to_string()))
        .collect();

    if keep.iter().all(|&k| k) {
        debug!(column, "all values selected");
        return Ok(Filtered {
            table: Cow::Borrowed(table),
            applied: FilterApplied::AllSelected,
        });
    }

    let rows: Vec<_> = table
        .rows
        .iter()
        .zip(&keep)
        .filter(|(_, keep)| **keep)
        .map(|(row, _)| row.clone())
        .collect();

    let kept = rows.len();
    let dropped = table.row_count() - kept;
    debug!(column, kept, dropped, "filter applied");

    Ok(Filtered {
        table: Cow::Owned(Table {
            headers: table.headers.clone(),
            rows,
        }),
        applied: FilterApplied::Subset { kept, dropped },
    })
}

/// Ordered per-column selections, applied one after another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    entries: Vec<(String, BTreeSet<String>)>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the selection for `column`, keeping its original slot
    /// when replacing.
    pub fn select<I, S>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = set,
            None => self.entries.push((column.to_string(), set)),
        }
        self
    }

    /// Select every observed value of `column` (the initial sidebar state).
    pub fn select_all(&mut self, table: &Table, column: &str) -> Result<&mut Self, SchemaError> {
        let values = unique_values(table, column)?;
        Ok(self.select(column, values))
    }

    pub fn remove(&mut self, column: &str) {
        self.entries.retain(|(c, _)| c != column);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn sales() -> Table {
        Table::from_strings(
            vec!["region".into(), "category".into(), "sales".into()],
            vec![
                vec!["강남구".into(), "카페".into(), "100".into()],
                vec!["강남구".into(), "카페".into(), "50".into()],
                vec!["서초구".into(), "카페".into(), "30".into()],
                vec!["서초구".into(), "한식".into(), "70".into()],
            ],
        )
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_subset_preserves_order() {
        let t = sales();
        let f = filter(&t, "region", &set(&["강남구"])).unwrap();
        assert_eq!(f.applied, FilterApplied::Subset { kept: 2, dropped: 2 });
        assert_eq!(f.table.row_count(), 2);
        assert_eq!(f.table.rows[0][2], Value::Int(100));
        assert_eq!(f.table.rows[1][2], Value::Int(50));
        assert_eq!(f.table.headers, t.headers);
    }

    #[test]
    fn test_filter_all_values_is_identity() {
        let t = sales();
        let all: BTreeSet<String> = unique_values(&t, "region").unwrap().into_iter().collect();
        let f = filter(&t, "region", &all).unwrap();
        assert_eq!(f.applied, FilterApplied::AllSelected);
        assert!(matches!(f.table, Cow::Borrowed(_)));
        assert_eq!(*f.table, t);
    }

    #[test]
    fn test_filter_empty_selection_returns_original() {
        let t = sales();
        let f = filter(&t, "category", &BTreeSet::new()).unwrap();
        assert_eq!(f.applied, FilterApplied::EmptySelectionIgnored);
        assert_eq!(*f.table, t);
    }

    #[test]
    fn test_filter_missing_column() {
        let t = sales();
        let err = filter(&t, "업종", &set(&["카페"])).unwrap_err();
        assert_eq!(err.column(), "업종");
    }

    #[test]
    fn test_filter_no_match_is_empty() {
        let t = sales();
        let f = filter(&t, "region", &set(&["마포구"])).unwrap();
        assert_eq!(f.table.row_count(), 0);
    }

    #[test]
    fn test_cascaded_filters() {
        let t = sales();
        let by_region = filter(&t, "region", &set(&["서초구"])).unwrap().into_owned();
        let by_cat = filter(&by_region, "category", &set(&["한식"])).unwrap();
        assert_eq!(by_cat.table.row_count(), 1);
        assert_eq!(by_cat.table.rows[0][2], Value::Int(70));
    }

    #[test]
    fn test_numeric_values_match_display_form() {
        let t = sales();
        let f = filter(&t, "sales", &set(&["100", "30"])).unwrap();
        assert_eq!(f.table.row_count(), 2);
    }

    #[test]
    fn test_unique_values_first_occurrence() {
        let t = sales();
        assert_eq!(unique_values(&t, "region").unwrap(), vec!["강남구", "서초구"]);
        assert_eq!(unique_values(&t, "category").unwrap(), vec!["카페", "한식"]);
    }

    #[test]
    fn test_selection_replace_keeps_slot() {
        let mut sel = FilterSelection::new();
        sel.select("region", ["강남구"]).select("category", ["카페"]);
        sel.select("region", ["서초구"]);
        let cols: Vec<&str> = sel.iter().map(|(c, _)| c).collect();
        assert_eq!(cols, vec!["region", "category"]);
        let (_, region) = sel.iter().next().unwrap();
        assert!(region.contains("서초구"));
        sel.remove("region");
        assert_eq!(sel.iter().count(), 1);
    }

    #[test]
    fn test_select_all() {
        let t = sales();
        let mut sel = FilterSelection::new();
        sel.select_all(&t, "region").unwrap();
        let (_, values) = sel.iter().next().unwrap();
        assert_eq!(values.len(), 2);
        assert!(sel.select_all(&t, "nope").is_err());
    }
}
