// Chart request parser

use super::ast::ChartRequest;
use super::lexer::{column_name, identifier, string_literal, usize_literal, ws};
use crate::aggregate::AggOp;
use crate::chart::ChartKind;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, map_res},
    error::{Error, ErrorKind},
    multi::separated_list0,
    sequence::preceded,
    IResult,
};

#[derive(Debug)]
enum ChartArg {
    X(String),
    Y(String),
    Color(String),
    Title(String),
    Agg(AggOp),
    Top(usize),
}

/// Parse a chart request
/// Format: kind(x: col, y: col[, color: col][, title: "..."][, agg: op][, top: n])
/// Arguments may come in any order; x and y are required.
pub fn parse_chart_request(input: &str) -> IResult<&str, ChartRequest> {
    let (input, kind) = ws(map_res(identifier, |s| s.parse::<ChartKind>()))(input)?;
    let (input, _) = ws(char('('))(input)?;

    let (input, args) = separated_list0(
        ws(char(',')),
        alt((
            map(preceded(ws(tag("x:")), ws(column_name)), ChartArg::X),
            map(preceded(ws(tag("y:")), ws(column_name)), ChartArg::Y),
            map(preceded(ws(tag("color:")), ws(column_name)), ChartArg::Color),
            map(preceded(ws(tag("title:")), ws(string_literal)), ChartArg::Title),
            map(
                preceded(ws(tag("agg:")), ws(map_res(identifier, |s| s.parse::<AggOp>()))),
                ChartArg::Agg,
            ),
            map(preceded(ws(tag("top:")), ws(usize_literal)), ChartArg::Top),
        )),
    )(input)?;

    let (input, _) = ws(char(')'))(input)?;

    let mut x = None;
    let mut y = None;
    let mut request_color = None;
    let mut title = None;
    let mut agg = None;
    let mut top = None;

    for arg in args {
        match arg {
            ChartArg::X(v) => x = Some(v),
            ChartArg::Y(v) => y = Some(v),
            ChartArg::Color(v) => request_color = Some(v),
            ChartArg::Title(v) => title = Some(v),
            ChartArg::Agg(v) => agg = Some(v),
            ChartArg::Top(v) => top = Some(v),
        }
    }

    let (Some(x), Some(y)) = (x, y) else {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify)));
    };

    Ok((
        input,
        ChartRequest {
            kind,
            x,
            y,
            color: request_color,
            title,
            agg,
            top,
        },
    ))
}
