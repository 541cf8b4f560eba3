//! TICKscript: a lexer, parser and pretty-printer for Kapacitor's pipeline
//! DSL, and a pipeline builder which checks that a script describes a
//! well-formed task.

pub mod ast;
mod format;
mod lexer;
mod parser;
mod pipeline;

pub use format::{format, format_expr};
pub use lexer::{tokenize, Token};
pub use parser::{parse, MAX_DEPTH, MAX_OPERATORS};
pub use pipeline::{build, DeadmanService, Edge, Handler, Node, Pipeline, Property, Value};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("found {found}, expected {expected} at line {line}")]
    Unexpected {
        found: String,
        expected: String,
        line: usize,
    },
    #[error("unterminated {what} at line {line}")]
    Unterminated { what: &'static str, line: usize },
    #[error("expression nests deeper than {limit} levels at line {line}")]
    TooDeep { limit: usize, line: usize },
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error(transparent)]
    Duration(#[from] influxql::Error),
    #[error("undefined variable {0:?}")]
    UndefinedVariable(String),
    #[error("references like \"{0}\" are only valid within lambda expressions")]
    ReferenceOutsideLambda(String),
    #[error("invalid expression {0}")]
    InvalidExpression(String),
    #[error("no node or property method {method:?} on {node}")]
    UnknownMethod { node: String, method: String },
    #[error("invalid arguments to {node}.{method}: {reason}")]
    InvalidArguments {
        node: String,
        method: String,
        reason: String,
    },
    #[error("cannot chain {node} which wants a {want} edge onto a {got} edge")]
    EdgeMismatch {
        node: String,
        want: Edge,
        got: Edge,
    },
    #[error("task mixes stream and batch sources")]
    MixedSources,
    #[error("task has no stream or batch source")]
    NoSource,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Grammar is a TICKscript engine, able to parse, format and check scripts.
pub trait Grammar {
    fn parse(&self, script: &str) -> Result<ast::Program>;
    fn format(&self, program: &ast::Program) -> String;
    fn build_pipeline(&self, script: &str, deadman: &dyn DeadmanService) -> Result<Pipeline>;
}

/// Kapacitor is the native Grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kapacitor;

impl Grammar for Kapacitor {
    fn parse(&self, script: &str) -> Result<ast::Program> {
        parse(script)
    }

    fn format(&self, program: &ast::Program) -> String {
        format(program)
    }

    fn build_pipeline(&self, script: &str, deadman: &dyn DeadmanService) -> Result<Pipeline> {
        build(&parse(script)?, deadman)
    }
}
