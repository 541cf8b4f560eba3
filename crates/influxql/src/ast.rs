//! Syntax tree of parsed InfluxQL.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    /// A recognized statement other than SELECT, identified by its leading keyword.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub fields: Vec<SelectField>,
    /// Measurement of an `INTO` clause.
    pub target: Option<Measurement>,
    pub sources: Vec<Source>,
    pub condition: Option<Expr>,
    pub dimensions: Vec<Expr>,
    pub fill: Option<Fill>,
    pub order_by: Vec<SortField>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub slimit: Option<i64>,
    pub soffset: Option<i64>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub name: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Measurement {
    pub database: String,
    pub retention_policy: String,
    pub name: String,
    /// Set if the measurement was written as a `/regex/`, in which case `name` is empty.
    pub regex: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Measurement(Measurement),
    Subquery(Box<SelectStatement>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Null,
    None,
    Previous,
    Linear,
    Integer(i64),
    Number(f64),
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fill::Null => f.write_str("null"),
            Fill::None => f.write_str("none"),
            Fill::Previous => f.write_str("previous"),
            Fill::Linear => f.write_str("linear"),
            Fill::Integer(i) => write!(f, "{i}"),
            Fill::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    EqRegex,
    NeqRegex,
}

impl BinaryOp {
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte
            | BinaryOp::EqRegex
            | BinaryOp::NeqRegex => 4,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::BitAnd => 6,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    /// The operator with its operands swapped, such that `a op b` is `b op.flip() a`.
    pub fn flip(&self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Lte => BinaryOp::Gte,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Gte => BinaryOp::Lte,
            op => *op,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::EqRegex => "=~",
            BinaryOp::NeqRegex => "!~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    VarRef {
        name: String,
        /// Type of a `::type` cast, if present.
        cast: Option<String>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
    Duration {
        nanos: i64,
        /// Literal text as written, like `1h30m`.
        literal: String,
    },
    Regex(String),
    Wildcard {
        cast: Option<String>,
    },
    Template(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    /// Strip any enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Paren(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// Is this a reference to the variable `name` (case insensitive), without a cast?
    pub fn is_var(&self, name: &str) -> bool {
        matches!(self, Expr::VarRef { name: n, cast: None } if n.eq_ignore_ascii_case(name))
    }

    /// Is this a call of `name` (case insensitive) without arguments?
    pub fn is_nullary_call(&self, name: &str) -> bool {
        matches!(self, Expr::Call { name: n, args } if args.is_empty() && n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::VarRef { name, cast } => {
                write_ident(f, name)?;
                write_cast(f, cast)
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Integer(i) => write!(f, "{i}"),
            Expr::Number(n) => write!(f, "{n}"),
            Expr::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Expr::Boolean(true) => f.write_str("true"),
            Expr::Boolean(false) => f.write_str("false"),
            Expr::Duration { literal, .. } => f.write_str(literal),
            Expr::Regex(r) => write!(f, "/{}/", r.replace('/', "\\/")),
            Expr::Wildcard { cast } => {
                f.write_str("*")?;
                write_cast(f, cast)
            }
            Expr::Template(name) => write!(f, ":{name}:"),
            Expr::Binary { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let bare = name
        .chars()
        .next()
        .map_or(false, |c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !crate::lexer::RESERVED
            .iter()
            .any(|kw| kw.eq_ignore_ascii_case(name));

    if bare {
        f.write_str(name)
    } else {
        write!(f, "\"{}\"", name.replace('"', "\\\""))
    }
}

fn write_cast(f: &mut fmt::Formatter<'_>, cast: &Option<String>) -> fmt::Result {
    match cast {
        Some(cast) => write!(f, "::{cast}"),
        None => Ok(()),
    }
}
