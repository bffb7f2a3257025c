// Dashboard session: load → filter → aggregate → chart

use crate::aggregate::{aggregate_by, measure_column_name, top_n, AggOp};
use crate::cache::{CachedTable, TableCache};
use crate::chart::{build_chart, default_title, validate_axes, ChartOptions, ChartSpec};
use crate::config::DashboardConfig;
use crate::csv_reader::{EncodingCandidate, Source};
use crate::data::Table;
use crate::error::{ConfigError, LoadError, SchemaError};
use crate::filter::{filter, FilterApplied, FilterSelection};
use crate::normalize::RenameMap;
use crate::parser::ChartRequest;
use crate::schema::{cardinality, categorical_columns, MeasureMatcher};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A recoverable problem the user should see next to the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The filter column does not exist; that filter was skipped.
    FilterDisabled { column: String, reason: String },
    /// Nothing was selected for the column; all rows are shown.
    EmptySelection { column: String },
    /// The requested chart cannot be drawn from the current data.
    ChartOmitted { reason: String },
    /// No rows left to show.
    EmptyTable,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::FilterDisabled { column, reason } => {
                write!(f, "Filtering on '{}' disabled: {}", column, reason)
            }
            Notice::EmptySelection { column } => {
                write!(f, "No values selected for '{}'; showing all rows", column)
            }
            Notice::ChartOmitted { reason } => write!(f, "Chart omitted: {}", reason),
            Notice::EmptyTable => f.write_str("No data to display"),
        }
    }
}

fn push_notice(notices: &mut Vec<Notice>, notice: Notice) {
    warn!("{}", notice);
    notices.push(notice);
}

/// What to show for one interaction.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub filters: FilterSelection,
    pub chart: Option<ChartRequest>,
}

/// Everything a front end needs to draw one dashboard state.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub source: String,
    pub encoding: EncodingCandidate,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub columns: Vec<String>,
    pub measure_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub preview: Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    pub notices: Vec<Notice>,
}

/// One dashboard session. Owns its configuration and table cache; sessions
/// share nothing.
#[derive(Debug)]
pub struct Dashboard {
    config: DashboardConfig,
    renames: RenameMap,
    measures: MeasureMatcher,
    cache: TableCache,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let renames = config.rename_map()?;
        let measures = config.measure_matcher();
        let cache = TableCache::new(config.cache_capacity);
        Ok(Self {
            config,
            renames,
            measures,
            cache,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Load and normalise `source`, reusing the cached table when the
    /// content is unchanged.
    pub fn load(&mut self, source: &Source) -> Result<CachedTable, LoadError> {
        self.cache
            .get_or_load(source, &self.config.encodings, Some(&self.renames))
    }

    /// Filter selections in effect: configured defaults first, then the
    /// request's own selections, which replace defaults for the same column.
    pub fn effective_filters(&self, request: &FilterSelection) -> FilterSelection {
        let mut selection = FilterSelection::new();
        for (column, values) in &self.config.default_filters {
            selection.select(column, values.iter().cloned());
        }
        for (column, values) in request.iter() {
            selection.select(column, values.iter().cloned());
        }
        selection
    }

    /// Recompute the whole view. Only a load failure is fatal; every other
    /// problem degrades the view and is reported as a [`Notice`].
    pub fn run(&mut self, source: &Source, request: &ViewRequest) -> Result<DashboardView, LoadError> {
        let loaded = self.load(source)?;
        let mut notices = Vec::new();

        let selection = self.effective_filters(&request.filters);
        let filtered = apply_filters(&loaded.table, &selection, &mut notices);
        debug!(
            total = loaded.table.row_count(),
            filtered = filtered.row_count(),
            "filters applied"
        );

        let chart = match &request.chart {
            _ if filtered.is_empty() => {
                push_notice(&mut notices, Notice::EmptyTable);
                None
            }
            Some(chart_request) => {
                let mut options = self.config.chart_options();
                options.title = chart_request.title.clone();
                match chart_for(&filtered, chart_request, &options) {
                    Ok(spec) => Some(spec),
                    Err(reason) => {
                        push_notice(&mut notices, Notice::ChartOmitted { reason });
                        None
                    }
                }
            }
            None => None,
        };

        Ok(DashboardView {
            source: source.name(),
            encoding: loaded.encoding,
            total_rows: loaded.table.row_count(),
            filtered_rows: filtered.row_count(),
            columns: filtered.headers.clone(),
            measure_columns: self
                .measures
                .measure_columns(&filtered)
                .into_iter()
                .map(str::to_string)
                .collect(),
            categorical_columns: categorical_columns(&filtered, self.config.categorical_threshold)
                .into_iter()
                .map(str::to_string)
                .collect(),
            preview: filtered.head(self.config.preview_rows),
            chart,
            notices,
        })
    }
}

/// Apply each selection in turn. A missing column disables that filter only.
pub fn apply_filters<'a>(
    table: &'a Table,
    selection: &FilterSelection,
    notices: &mut Vec<Notice>,
) -> Cow<'a, Table> {
    let mut current: Cow<'a, Table> = Cow::Borrowed(table);

    for (column, allowed) in selection.iter() {
        let next = match filter(&current, column, allowed) {
            Ok(filtered) => {
                if filtered.applied == FilterApplied::EmptySelectionIgnored {
                    notices.push(Notice::EmptySelection {
                        column: column.to_string(),
                    });
                }
                match filtered.table {
                    Cow::Owned(t) => Some(t),
                    Cow::Borrowed(_) => None,
                }
            }
            Err(e) => {
                push_notice(
                    notices,
                    Notice::FilterDisabled {
                        column: column.to_string(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        };
        if let Some(t) = next {
            current = Cow::Owned(t);
        }
    }

    current
}

/// Build the requested chart, aggregating first where the request or a
/// categorical x axis with repeated values calls for it. Errors are rendered
/// as notice text.
pub fn chart_for(
    table: &Table,
    request: &ChartRequest,
    options: &ChartOptions,
) -> Result<ChartSpec, String> {
    let color = if request.kind.is_pie() {
        None
    } else {
        request.color.as_deref()
    };

    let axes = validate_axes(request.kind, table, &request.x, &request.y, color, options)
        .map_err(|e| e.to_string())?;

    let (data, y_column) =
        chart_data(table, request, color, axes.categorical_x).map_err(|e| e.to_string())?;
    if y_column == request.y {
        return build_chart(request.kind, &data, &request.x, &request.y, color, options)
            .map_err(|e| e.to_string());
    }

    // The reduced measure was renamed to keep it apart from its group column
    let options = ChartOptions {
        title: Some(
            options
                .title
                .clone()
                .unwrap_or_else(|| default_title(request.kind, &request.x, &request.y)),
        ),
        ..options.clone()
    };
    let mut spec = build_chart(request.kind, &data, &request.x, &y_column, color, &options)
        .map_err(|e| e.to_string())?;
    spec.y = request.y.clone();
    if color.is_none() {
        for series in &mut spec.series {
            series.name = request.y.clone();
        }
    }
    Ok(spec)
}

/// Rows to plot and the column holding y in them. Explicit top-N or
/// aggregation comes first; otherwise a categorical x with repeated values
/// is summed; otherwise the table is used as is.
fn chart_data<'a>(
    table: &'a Table,
    request: &ChartRequest,
    color: Option<&str>,
    categorical_x: bool,
) -> Result<(Cow<'a, Table>, String), SchemaError> {
    let x = request.x.as_str();
    let y = request.y.as_str();
    let mut groups = vec![x];
    if let Some(c) = color.filter(|c| *c != x) {
        groups.push(c);
    }
    let op = request.agg.unwrap_or_default();
    let reduced_y = measure_column_name(&groups, y, op);

    if let Some(n) = request.top {
        let top = top_n(table, x, y, n)?;
        if groups.len() == 1 && op == AggOp::Sum {
            return Ok((Cow::Owned(top), reduced_y));
        }

        // Reduce within the top groups only, keeping their ranking
        let rank: HashMap<String, usize> = top
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row[0].to_string(), i))
            .collect();
        let x_idx = table
            .column_index(x)
            .ok_or_else(|| SchemaError::missing(x, &table.headers))?;
        let limited = Table::new(
            table.headers.clone(),
            table
                .rows
                .iter()
                .filter(|row| rank.contains_key(&row[x_idx].to_string()))
                .cloned()
                .collect(),
        );
        let mut reduced = aggregate_by(&limited, &groups, y, op)?;
        reduced
            .rows
            .sort_by_key(|row| rank.get(&row[0].to_string()).copied().unwrap_or(usize::MAX));
        return Ok((Cow::Owned(reduced), reduced_y));
    }

    if request.agg.is_some() {
        return Ok((Cow::Owned(aggregate_by(table, &groups, y, op)?), reduced_y));
    }

    if categorical_x && cardinality(table, x)? < table.row_count() {
        debug!(x, y, "summing repeated categories");
        let summed = aggregate_by(table, &groups, y, AggOp::Sum)?;
        return Ok((Cow::Owned(summed), measure_column_name(&groups, y, AggOp::Sum)));
    }

    Ok((Cow::Borrowed(table), y.to_string()))
}
