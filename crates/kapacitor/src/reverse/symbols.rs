use std::collections::BTreeMap;

use tickscript::ast::{BinaryOp, ChainOp, Expr, Link, Program, Statement, UnaryOp};

/// Value of an evaluated TICKscript expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// Numeric literal, as formatted.
    Number(String),
    Bool(bool),
    /// Duration literal, as written.
    Duration(String),
    Regex(String),
    Star,
    List(Vec<Value>),
    Lambda(Expr),
    /// Nodes of a pipeline, from its source onwards.
    Chain(Vec<Stage>),
    /// Expressions having no value outside of a lambda.
    Opaque(Expr),
}

impl Value {
    /// Text of a scalar value, as it would be entered into a rule.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::String(s) | Value::Number(s) | Value::Duration(s) => Some(s.clone()),
            Value::Bool(true) => Some("TRUE".to_string()),
            Value::Bool(false) => Some("FALSE".to_string()),
            _ => None,
        }
    }
}

/// Stage is a node of a flattened pipeline chain, with the property
/// calls which follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub op: ChainOp,
    pub name: String,
    pub args: Vec<Expr>,
    pub properties: Vec<Link>,
}

/// Symbols are the bindings of a script's declarations, together with
/// its top-level pipelines.
#[derive(Debug, Default)]
pub struct Symbols {
    bindings: BTreeMap<String, Value>,
    /// Every pipeline of the script in statement order, with its binding.
    pub chains: Vec<(Option<String>, Vec<Stage>)>,
}

impl Symbols {
    pub fn new(program: &Program) -> Symbols {
        let mut symbols = Symbols::default();

        for stmt in &program.statements {
            match stmt {
                Statement::Declaration { name, value } => {
                    let value = symbols.eval(value);
                    if let Value::Chain(stages) = &value {
                        symbols.chains.push((Some(name.clone()), stages.clone()));
                    }
                    symbols.bindings.insert(name.clone(), value);
                }
                Statement::Expression(expr) => {
                    if let Value::Chain(stages) = symbols.eval(expr) {
                        symbols.chains.push((None, stages));
                    }
                }
            }
        }
        symbols
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Evaluate an expression against the current bindings.
    pub fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Identifier(name) => match self.bindings.get(name) {
                Some(value) => value.clone(),
                None if name == "stream" || name == "batch" => Value::Chain(vec![Stage {
                    op: ChainOp::Pipe,
                    name: name.clone(),
                    args: Vec::new(),
                    properties: Vec::new(),
                }]),
                None => Value::Opaque(expr.clone()),
            },
            Expr::String { value, .. } => Value::String(value.clone()),
            Expr::Int(_) | Expr::Float(_) => Value::Number(tickscript::format_expr(expr)),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Duration(literal) => Value::Duration(literal.clone()),
            Expr::Regex(r) => Value::Regex(r.clone()),
            Expr::Star => Value::Star,
            Expr::List(items) => Value::List(items.iter().map(|item| self.eval(item)).collect()),
            Expr::Lambda(body) => Value::Lambda(body.as_ref().clone()),
            Expr::Paren(inner) => self.eval(inner),
            Expr::Unary { op, operand } => match (op, self.eval(operand)) {
                (UnaryOp::Neg, Value::Number(n)) if !n.starts_with('-') => {
                    Value::Number(format!("-{n}"))
                }
                (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
                _ => Value::Opaque(expr.clone()),
            },
            Expr::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } => match (self.eval(lhs), self.eval(rhs)) {
                (Value::String(l), Value::String(r)) => Value::String(l + &r),
                _ => Value::Opaque(expr.clone()),
            },
            Expr::Chain { source, links } => {
                let Value::Chain(mut stages) = self.eval(source) else {
                    return Value::Opaque(expr.clone());
                };
                for link in links {
                    match link.op {
                        ChainOp::Property => {
                            // A chain always begins with its source stage.
                            if let Some(last) = stages.last_mut() {
                                last.properties.push(link.clone());
                            }
                        }
                        op => stages.push(Stage {
                            op,
                            name: link.name.clone(),
                            args: link.args.clone(),
                            properties: Vec::new(),
                        }),
                    }
                }
                Value::Chain(stages)
            }
            Expr::Reference(_) | Expr::Binary { .. } | Expr::Call { .. } => {
                Value::Opaque(expr.clone())
            }
        }
    }
}
