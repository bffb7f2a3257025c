// Filter argument parser

use super::ast::FilterArg;
use super::lexer::{column_name, string_literal, ws};
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::map,
    multi::separated_list0,
    IResult,
};

fn bare_value(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| c != ',' && c != '"'), |s: &str| {
        s.trim().to_string()
    })(input)
}

/// Parse a filter argument
/// Format: column=value[,value...]; `column=` selects nothing.
pub fn parse_filter(input: &str) -> IResult<&str, FilterArg> {
    let (input, column) = ws(column_name)(input)?;
    let (input, _) = ws(char('='))(input)?;
    let (input, values) =
        separated_list0(ws(char(',')), ws(alt((string_literal, bare_value))))(input)?;

    Ok((input, FilterArg { column, values }))
}
