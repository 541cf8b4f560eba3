//! InfluxQL support for dashboard-authored queries: a lexer and parser for
//! SELECT statements, conversion into a structured `models::QueryConfig`,
//! and evaluation of a query's time range.

pub mod ast;
mod convert;
mod duration;
mod lexer;
mod parser;
pub mod tags;
mod time;

pub use convert::convert;
pub use duration::{format_duration, parse_duration};
pub use lexer::{tokenize, Token};
pub use parser::{parse_expr, parse_query, MAX_DEPTH, MAX_OPERATORS};
pub use time::parse_time;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("found {found}, expected {expected} at offset {offset}")]
    Unexpected {
        found: String,
        expected: String,
        offset: usize,
    },
    #[error("unterminated {what} at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("invalid fill option {0:?}")]
    InvalidFill(String),
    #[error("query contains no statements")]
    Empty,
    #[error("query does not contain a SELECT statement")]
    NoSelect,
    #[error("invalid time condition: {0}")]
    InvalidTimeCondition(String),
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),
    #[error("time is out of range")]
    TimeOutOfRange,
    #[error("expression nests deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
