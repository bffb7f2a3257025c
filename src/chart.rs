// Chart selection: (kind, x, y, color) → renderable specification

use crate::data::{Table, Value};
use crate::error::InvalidAxisError;
use crate::schema::{coerce_measure, is_numeric_at, MeasureMatcher};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Pie,
    Donut,
}

impl ChartKind {
    pub fn is_pie(&self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Donut)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
            ChartKind::Donut => "donut",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "scatter" | "point" => Ok(ChartKind::Scatter),
            "pie" => Ok(ChartKind::Pie),
            "donut" => Ok(ChartKind::Donut),
            other => Err(format!("Unknown chart kind '{}'", other)),
        }
    }
}

/// Position on the x axis: a number for continuous axes, a label otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AxisValue {
    Number(f64),
    Label(String),
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Number(n) => write!(f, "{}", n),
            AxisValue::Label(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: AxisValue,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

/// How numbers should be shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    #[default]
    Thousands,
}

/// Fully resolved chart, ready for an external renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub title: String,
    /// Whether x positions are labels rather than numbers.
    pub categorical_x: bool,
    pub value_format: NumberFormat,
    pub series: Vec<Series>,
}

impl ChartSpec {
    /// Distinct x labels across all series, in first-occurrence order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in &self.series {
            for p in &s.points {
                let label = p.x.to_string();
                if seen.insert(label.clone()) {
                    out.push(label);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ChartOptions {
    /// Largest number of distinct labels a categorical axis may carry.
    pub max_categories: usize,
    pub measures: MeasureMatcher,
    /// Overrides the generated title.
    pub title: Option<String>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            max_categories: 200,
            measures: MeasureMatcher::default(),
            title: None,
        }
    }
}

/// Title text in the dashboards' wording.
pub fn default_title(kind: ChartKind, x: &str, y: &str) -> String {
    match kind {
        ChartKind::Line => format!("{} 변화 추이 ({} 기준)", y, x),
        ChartKind::Bar => format!("{} 막대그래프 ({} 기준)", y, x),
        ChartKind::Scatter => format!("{} vs {} 산점도", x, y),
        ChartKind::Pie | ChartKind::Donut => format!("{}별 {} 비중", x, y),
    }
}

/// Column positions resolved by [`validate_axes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisColumns {
    pub x: usize,
    pub y: usize,
    pub color: Option<usize>,
    pub categorical_x: bool,
}

/// Check that a chart of `kind` can be drawn from `data` without building
/// it. Pie and donut charts ignore `color`.
pub fn validate_axes(
    kind: ChartKind,
    data: &Table,
    x: &str,
    y: &str,
    color: Option<&str>,
    options: &ChartOptions,
) -> Result<AxisColumns, InvalidAxisError> {
    let x_axis = if kind.is_pie() { "labels" } else { "x" };
    let y_axis = if kind.is_pie() { "values" } else { "y" };

    let x_idx = data.column_index(x).ok_or_else(|| InvalidAxisError::MissingColumn {
        axis: x_axis,
        column: x.to_string(),
    })?;
    let y_idx = data.column_index(y).ok_or_else(|| InvalidAxisError::MissingColumn {
        axis: y_axis,
        column: y.to_string(),
    })?;
    let color = if kind.is_pie() { None } else { color };
    let color_idx = match color {
        Some(c) => Some(data.column_index(c).ok_or_else(|| InvalidAxisError::MissingColumn {
            axis: "color",
            column: c.to_string(),
        })?),
        None => None,
    };

    if !options.measures.is_measure_column(y) && !is_numeric_at(data, y_idx) {
        return Err(InvalidAxisError::NonNumeric {
            axis: y_axis,
            column: y.to_string(),
        });
    }

    let categorical_x = kind.is_pie() || kind == ChartKind::Bar || !is_numeric_at(data, x_idx);
    if categorical_x {
        let distinct: HashSet<String> = data.column(x_idx).map(|v| v.to_string()).collect();
        if distinct.len() > options.max_categories {
            return Err(InvalidAxisError::TooManyCategories {
                axis: x_axis,
                column: x.to_string(),
                count: distinct.len(),
                limit: options.max_categories,
            });
        }
    }

    Ok(AxisColumns {
        x: x_idx,
        y: y_idx,
        color: color_idx,
        categorical_x,
    })
}

/// Map a chart request onto `data`. Does not modify or reorder the data.
pub fn build_chart(
    kind: ChartKind,
    data: &Table,
    x: &str,
    y: &str,
    color: Option<&str>,
    options: &ChartOptions,
) -> Result<ChartSpec, InvalidAxisError> {
    let AxisColumns {
        x: x_idx,
        y: y_idx,
        color: color_idx,
        categorical_x,
    } = validate_axes(kind, data, x, y, color, options)?;
    // Pie charts have no series split
    let color = if kind.is_pie() { None } else { color };

    let mut series: Vec<Series> = Vec::new();
    let mut series_index: HashMap<String, usize> = HashMap::new();

    for row in &data.rows {
        let name = match color_idx {
            Some(i) => row[i].to_string(),
            None => y.to_string(),
        };
        let slot = *series_index.entry(name.clone()).or_insert_with(|| {
            series.push(Series { name, points: Vec::new() });
            series.len() - 1
        });

        let x_value = axis_value(&row[x_idx], categorical_x);
        let y_value = coerce_measure(&row[y_idx]);

        if kind.is_pie() && y_value < 0.0 {
            return Err(InvalidAxisError::NegativePieValue { column: y.to_string() });
        }

        series[slot].points.push(Point { x: x_value, y: y_value });
    }

    Ok(ChartSpec {
        kind,
        x: x.to_string(),
        y: y.to_string(),
        color: color.map(str::to_string),
        title: options
            .title
            .clone()
            .unwrap_or_else(|| default_title(kind, x, y)),
        categorical_x,
        value_format: NumberFormat::Thousands,
        series,
    })
}

fn axis_value(value: &Value, categorical: bool) -> AxisValue {
    match (categorical, value.as_f64()) {
        (false, Some(n)) => AxisValue::Number(n),
        _ => AxisValue::Label(value.to_string()),
    }
}

/// Format a number with comma thousands separators, e.g. `1234567.5` →
/// `"1,234,567.5"`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let negative = value < 0.0;
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let text = rounded.to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if negative && rounded != 0.0 {
        grouped.push('-');
    }
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::from_strings(
            vec!["region".into(), "category".into(), "sales".into(), "year".into(), "note".into()],
            vec![
                vec!["강남구".into(), "카페".into(), "100".into(), "2023".into(), "a".into()],
                vec!["강남구".into(), "한식".into(), "N/A".into(), "2024".into(), "b".into()],
                vec!["서초구".into(), "카페".into(), "30".into(), "2024".into(), "c".into()],
            ],
        )
    }

    #[test]
    fn test_bar_chart_categorical_x() {
        let spec = build_chart(ChartKind::Bar, &sales(), "region", "sales", None, &ChartOptions::default()).unwrap();
        assert!(spec.categorical_x);
        assert_eq!(spec.series.len(), 1);
        assert_eq!(spec.series[0].name, "sales");
        assert_eq!(spec.series[0].points[0].x, AxisValue::Label("강남구".into()));
        assert_eq!(spec.series[0].points[1].y, 0.0);
        assert_eq!(spec.title, "sales 막대그래프 (region 기준)");
        assert_eq!(spec.categories(), vec!["강남구", "서초구"]);
    }

    #[test]
    fn test_line_chart_numeric_x() {
        let spec = build_chart(ChartKind::Line, &sales(), "year", "sales", None, &ChartOptions::default()).unwrap();
        assert!(!spec.categorical_x);
        assert_eq!(spec.series[0].points[0].x, AxisValue::Number(2023.0));
    }

    #[test]
    fn test_color_splits_series() {
        let spec = build_chart(ChartKind::Scatter, &sales(), "year", "sales", Some("category"), &ChartOptions::default()).unwrap();
        let names: Vec<&str> = spec.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["카페", "한식"]);
        assert_eq!(spec.series[0].points.len(), 2);
        assert_eq!(spec.color.as_deref(), Some("category"));
    }

    #[test]
    fn test_missing_axis_column() {
        let err = build_chart(ChartKind::Line, &sales(), "month", "sales", None, &ChartOptions::default()).unwrap_err();
        assert_eq!(err, InvalidAxisError::MissingColumn { axis: "x", column: "month".into() });
        let err = build_chart(ChartKind::Pie, &sales(), "region", "amount", None, &ChartOptions::default()).unwrap_err();
        assert_eq!(err, InvalidAxisError::MissingColumn { axis: "values", column: "amount".into() });
        let err = build_chart(ChartKind::Bar, &sales(), "region", "sales", Some("nope"), &ChartOptions::default()).unwrap_err();
        assert!(matches!(err, InvalidAxisError::MissingColumn { axis: "color", .. }));
    }

    #[test]
    fn test_text_y_rejected() {
        let err = build_chart(ChartKind::Line, &sales(), "year", "note", None, &ChartOptions::default()).unwrap_err();
        assert!(matches!(err, InvalidAxisError::NonNumeric { .. }));
    }

    #[test]
    fn test_category_cap() {
        let options = ChartOptions { max_categories: 2, ..ChartOptions::default() };
        let err = build_chart(ChartKind::Bar, &sales(), "note", "sales", None, &options).unwrap_err();
        assert_eq!(
            err,
            InvalidAxisError::TooManyCategories { axis: "x", column: "note".into(), count: 3, limit: 2 }
        );
    }

    #[test]
    fn test_pie_ignores_color_and_rejects_negative() {
        let spec = build_chart(ChartKind::Donut, &sales(), "region", "sales", Some("category"), &ChartOptions::default()).unwrap();
        assert!(spec.color.is_none());
        assert_eq!(spec.title, "region별 sales 비중");

        let t = Table::from_strings(
            vec!["k".into(), "sales".into()],
            vec![vec!["a".into(), "-5".into()]],
        );
        let err = build_chart(ChartKind::Pie, &t, "k", "sales", None, &ChartOptions::default()).unwrap_err();
        assert!(matches!(err, InvalidAxisError::NegativePieValue { .. }));
    }

    #[test]
    fn test_validate_axes_positions() {
        let axes = validate_axes(ChartKind::Scatter, &sales(), "year", "sales", Some("region"), &ChartOptions::default()).unwrap();
        assert_eq!(axes, AxisColumns { x: 3, y: 2, color: Some(0), categorical_x: false });

        let axes = validate_axes(ChartKind::Pie, &sales(), "region", "sales", Some("nope"), &ChartOptions::default()).unwrap();
        assert_eq!(axes.color, None);
        assert!(axes.categorical_x);
    }

    #[test]
    fn test_data_not_mutated() {
        let t = sales();
        let before = t.clone();
        let _ = build_chart(ChartKind::Bar, &t, "region", "sales", None, &ChartOptions::default());
        assert_eq!(t, before);
    }

    #[test]
    fn test_title_override() {
        let options = ChartOptions { title: Some("월별 매출".into()), ..ChartOptions::default() };
        let spec = build_chart(ChartKind::Line, &sales(), "year", "sales", None, &options).unwrap();
        assert_eq!(spec.title, "월별 매출");
    }

    #[test]
    fn test_serializes_to_json() {
        let spec = build_chart(ChartKind::Bar, &sales(), "region", "sales", None, &ChartOptions::default()).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["value_format"], "thousands");
        assert_eq!(json["series"][0]["points"][0]["x"], "강남구");
        assert!(json.get("color").is_none());
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(1000.0), "1,000");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-1234.5), "-1,234.5");
        assert_eq!(format_thousands(12.346), "12.35");
    }

    #[test]
    fn test_chart_kind_from_str() {
        assert_eq!("Donut".parse::<ChartKind>().unwrap(), ChartKind::Donut);
        assert_eq!("point".parse::<ChartKind>().unwrap(), ChartKind::Scatter);
        assert!("area".parse::<ChartKind>().is_err());
    }
}
