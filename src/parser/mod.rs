// Command-line argument parsers

pub mod ast;
pub mod chart;
pub mod filter;
pub mod lexer;

pub use ast::{ChartRequest, FilterArg};

use anyhow::{anyhow, Result};

/// Parse a whole `--chart` argument; trailing input is an error.
pub fn chart_request(input: &str) -> Result<ChartRequest> {
    match chart::parse_chart_request(input) {
        Ok(("", request)) => Ok(request),
        Ok((rest, _)) => Err(anyhow!("Parse error: unexpected input '{}'", rest)),
        Err(e) => Err(anyhow!("Parse error in chart '{}': {}", input, e)),
    }
}

/// Parse a whole `--filter` argument; trailing input is an error.
pub fn filter_arg(input: &str) -> Result<FilterArg> {
    match filter::parse_filter(input) {
        Ok(("", arg)) => Ok(arg),
        Ok((rest, _)) => Err(anyhow!("Parse error: unexpected input '{}'", rest)),
        Err(e) => Err(anyhow!("Parse error in filter '{}': {}", input, e)),
    }
}
