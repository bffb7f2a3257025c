// Shared token parsers

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res},
    sequence::delimited,
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace.
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Bare word: letters (Hangul included), digits, `_` and `.`.
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        String::from,
    )(input)
}

/// Double-quoted text without escapes.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        String::from,
    )(input)
}

/// A column name, bare or quoted.
pub fn column_name(input: &str) -> IResult<&str, String> {
    alt((string_literal, identifier))(input)
}

pub fn usize_literal(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}
