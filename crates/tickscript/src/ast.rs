//! Syntax tree of a TICKscript.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `var name = value`
    Declaration { name: String, value: Expr },
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    Reference(String),
    String { value: String, triple: bool },
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Duration literal as written.
    Duration(String),
    Regex(String),
    Star,
    List(Vec<Expr>),
    Lambda(Box<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Paren(Box<Expr>),
    /// Function call, valid within lambdas.
    Call { name: String, args: Vec<Expr> },
    /// A source identifier followed by chained node and property calls.
    Chain { source: Box<Expr>, links: Vec<Link> },
}

impl Expr {
    pub fn string(value: impl Into<String>) -> Expr {
        Expr::String {
            value: value.into(),
            triple: false,
        }
    }

    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Paren(inner) = expr {
            expr = inner;
        }
        expr
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub op: ChainOp,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    /// `|` creates a new node.
    Pipe,
    /// `.` sets a property of the current node.
    Property,
    /// `@` invokes a user-defined function.
    Udf,
}

impl ChainOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChainOp::Pipe => "|",
            ChainOp::Property => ".",
            ChainOp::Udf => "@",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    RegexEq,
    RegexNeq,
    And,
    Or,
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
            | BinaryOp::RegexEq
            | BinaryOp::RegexNeq => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::RegexEq => "=~",
            BinaryOp::RegexNeq => "!~",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}
