// Parsed command-line requests

use crate::aggregate::AggOp;
use crate::chart::ChartKind;

/// `bar(x: 자치구명, y: 월매출액, color: 업종명, agg: sum, top: 10, title: "...")`
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub title: Option<String>,
    /// Explicit aggregation; `None` lets the pipeline decide.
    pub agg: Option<AggOp>,
    /// Keep only the largest N groups.
    pub top: Option<usize>,
}

/// `자치구명=강남구,서초구`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArg {
    pub column: String,
    pub values: Vec<String>,
}
