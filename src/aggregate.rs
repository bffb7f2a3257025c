use crate::data::{Table, Value};
use crate::error::SchemaError;
use crate::schema::coerce_measure;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// Reduction applied to the measure within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOp {
    #[default]
    Sum,
    Mean,
    Count,
}

impl AggOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggOp::Sum => "sum",
            AggOp::Mean => "mean",
            AggOp::Count => "count",
        }
    }
}

impl FromStr for AggOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggOp::Sum),
            "mean" | "avg" => Ok(AggOp::Mean),
            "count" => Ok(AggOp::Count),
            other => Err(format!("Unknown aggregation '{}' (expected sum, mean or count)", other)),
        }
    }
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    rows: usize,
}

impl Accumulator {
    fn finish(&self, op: AggOp) -> f64 {
        match op {
            AggOp::Sum => self.sum,
            AggOp::Mean if self.rows == 0 => 0.0,
            AggOp::Mean => self.sum / self.rows as f64,
            AggOp::Count => self.rows as f64,
        }
    }
}

/// One row per distinct `group` value, in first-occurrence order, with the
/// measure reduced by `op`. Non-numeric and missing measure values count as 0.
pub fn aggregate(
    table: &Table,
    group: &str,
    measure: &str,
    op: AggOp,
) -> Result<Table, SchemaError> {
    aggregate_by(table, &[group], measure, op)
}

/// Header of the reduced measure in an aggregate table: the measure name,
/// or `<measure>_<op>` when a group column already uses that name.
pub fn measure_column_name(groups: &[&str], measure: &str, op: AggOp) -> String {
    if groups.contains(&measure) {
        format!("{}_{}", measure, op.name())
    } else {
        measure.to_string()
    }
}

/// Like [`aggregate`], keyed on the combination of several columns.
pub fn aggregate_by(
    table: &Table,
    groups: &[&str],
    measure: &str,
    op: AggOp,
) -> Result<Table, SchemaError> {
    let group_idx = groups
        .iter()
        .map(|g| {
            table
                .column_index(g)
                .ok_or_else(|| SchemaError::missing(g, &table.headers))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let measure_idx = table
        .column_index(measure)
        .ok_or_else(|| SchemaError::missing(measure, &table.headers))?;

    let mut accumulators: HashMap<Vec<String>, Accumulator> = HashMap::new();
    // First-occurrence key order, with the original cells for each key
    let mut order: Vec<(Vec<String>, Vec<Value>)> = Vec::new();

    for row in &table.rows {
        let key: Vec<String> = group_idx.iter().map(|&i| row[i].to_string()).collect();

        if !accumulators.contains_key(&key) {
            order.push((key.clone(), group_idx.iter().map(|&i| row[i].clone()).collect()));
        }

        let acc = accumulators.entry(key).or_default();
        acc.sum += coerce_measure(&row[measure_idx]);
        acc.rows += 1;
    }

    let rows: Vec<Vec<Value>> = order
        .into_iter()
        .map(|(key, mut cells)| {
            let value = accumulators.get(&key).map(|a| a.finish(op)).unwrap_or(0.0);
            cells.push(Value::Float(value));
            cells
        })
        .collect();

    debug!(groups = ?groups, measure, ?op, rows = rows.len(), "aggregated");

    let mut headers: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
    headers.push(measure_column_name(groups, measure, op));

    Ok(Table::new(headers, rows))
}

/// Summed measure per group, largest first, keeping at most `n` groups.
/// Ties keep the first-occurrence order of the group values.
pub fn top_n(table: &Table, group: &str, measure: &str, n: usize) -> Result<Table, SchemaError> {
    let mut summed = aggregate(table, group, measure, AggOp::Sum)?;
    sort_by_measure_desc(&mut summed);
    summed.rows.truncate(n);
    Ok(summed)
}

/// Stable descending sort on the last column of an aggregate table.
pub fn sort_by_measure_desc(table: &mut Table) {
    let Some(last) = table.headers.len().checked_sub(1) else {
        return;
    };
    table.rows.sort_by(|a, b| {
        let va = coerce_measure(&a[last]);
        let vb = coerce_measure(&b[last]);
        vb.total_cmp(&va)
    });
}
