use std::collections::BTreeMap;
use std::time::Duration;

use crate::ast::{BinaryOp, ChainOp, Expr, Link, Program, Statement, UnaryOp};
use crate::{Error, Result};

/// DeadmanService supplies the server-wide deadman configuration.
pub trait DeadmanService {
    fn interval(&self) -> Duration;
    fn threshold(&self) -> f64;
    fn id(&self) -> String;
    fn message(&self) -> String;
    /// Whether a deadman is implicitly attached to every source node.
    fn global(&self) -> bool;
}

/// Edge is the kind of data flowing between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Stream,
    Batch,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Stream => f.write_str("stream"),
            Edge::Batch => f.write_str("batch"),
        }
    }
}

/// Value is the evaluated form of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Regex(String),
    Star,
    Lambda(Expr),
    List(Vec<Value>),
    /// Index of a pipeline node.
    Node(usize),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Duration(_) => "duration",
            Value::Regex(_) => "regex",
            Value::Star => "star",
            Value::Lambda(_) => "lambda",
            Value::List(_) => "list",
            Value::Node(_) => "node",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub args: Vec<Value>,
}

/// Handler is an alert handler of an alert or deadman node.
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub name: String,
    pub args: Vec<Value>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Indices of parent nodes. Sources have none.
    pub parents: Vec<usize>,
    /// Edge produced by this node.
    pub edge: Edge,
    pub args: Vec<Value>,
    pub properties: Vec<Property>,
    pub handlers: Vec<Handler>,
}

impl Node {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Pipeline is the graph of nodes described by a script.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    edge: Edge,
    nodes: Vec<Node>,
}

impl Pipeline {
    /// Edge type of the task, as determined by its sources.
    pub fn edge(&self) -> Edge {
        self.edge
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Build the pipeline described by `program`, checking every node and
/// property against the known node types.
#[tracing::instrument(level = "debug", skip_all, err)]
pub fn build(program: &Program, deadman: &dyn DeadmanService) -> Result<Pipeline> {
    let mut builder = Builder {
        scope: BTreeMap::new(),
        nodes: Vec::new(),
        edge: None,
    };

    for stmt in &program.statements {
        match stmt {
            Statement::Declaration { name, value } => {
                let value = builder.eval(value)?;
                builder.scope.insert(name.clone(), value);
            }
            Statement::Expression(expr) => {
                builder.eval(expr)?;
            }
        }
    }
    let Some(edge) = builder.edge else {
        return Err(Error::NoSource);
    };
    let mut nodes = builder.nodes;

    for node in nodes.iter_mut().filter(|n| n.name == "deadman") {
        apply_deadman_defaults(node, deadman);
    }
    if deadman.global() {
        let sources: Vec<usize> = (0..nodes.len())
            .filter(|i| matches!(nodes[*i].name.as_str(), "from" | "query"))
            .collect();

        for parent in sources {
            let mut node = Node {
                name: "deadman".to_string(),
                parents: vec![parent],
                edge: nodes[parent].edge,
                args: vec![
                    Value::Float(deadman.threshold()),
                    Value::Duration(deadman.interval()),
                ],
                properties: Vec::new(),
                handlers: Vec::new(),
            };
            apply_deadman_defaults(&mut node, deadman);
            nodes.push(node);
        }
    }

    tracing::debug!(%edge, nodes = nodes.len(), "built pipeline");
    Ok(Pipeline { edge, nodes })
}

fn apply_deadman_defaults(node: &mut Node, deadman: &dyn DeadmanService) {
    for (name, value) in [("id", deadman.id()), ("message", deadman.message())] {
        if node.property(name).is_none() && !value.is_empty() {
            node.properties.push(Property {
                name: name.to_string(),
                args: vec![Value::String(value)],
            });
        }
    }
}

struct Builder {
    scope: BTreeMap<String, Value>,
    nodes: Vec<Node>,
    edge: Option<Edge>,
}

impl Builder {
    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Identifier(name) if name == "stream" || name == "batch" => {
                let edge = if name == "stream" {
                    Edge::Stream
                } else {
                    Edge::Batch
                };
                match self.edge {
                    Some(existing) if existing != edge => return Err(Error::MixedSources),
                    _ => self.edge = Some(edge),
                }
                self.nodes.push(Node {
                    name: name.clone(),
                    parents: Vec::new(),
                    edge,
                    args: Vec::new(),
                    properties: Vec::new(),
                    handlers: Vec::new(),
                });
                Ok(Value::Node(self.nodes.len() - 1))
            }
            Expr::Identifier(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedVariable(name.clone())),
            Expr::Reference(name) => Err(Error::ReferenceOutsideLambda(name.clone())),
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Duration(literal) => duration(literal).map(Value::Duration),
            Expr::Regex(r) => Ok(Value::Regex(r.clone())),
            Expr::Star => Ok(Value::Star),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Expr::Lambda(body) => {
                self.check_lambda(body)?;
                Ok(Value::Lambda(body.as_ref().clone()))
            }
            Expr::Paren(inner) => self.eval(inner),
            Expr::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
                (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                _ => Err(Error::InvalidExpression(crate::format_expr(expr))),
            },
            Expr::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                arithmetic(*op, lhs, rhs).ok_or_else(|| Error::InvalidExpression(crate::format_expr(expr)))
            }
            Expr::Call { .. } => Err(Error::InvalidExpression(crate::format_expr(expr))),
            Expr::Chain { source, links } => {
                let Value::Node(node) = self.eval(source)? else {
                    return Err(Error::InvalidExpression(crate::format_expr(source)));
                };
                self.chain(node, links)
            }
        }
    }

    // Identifiers within lambdas must be bound, and bound to plain values.
    fn check_lambda(&self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Identifier(name) => match self.scope.get(name) {
                None => Err(Error::UndefinedVariable(name.clone())),
                Some(Value::Node(_)) | Some(Value::Lambda(_)) => {
                    Err(Error::InvalidExpression(name.clone()))
                }
                Some(_) => Ok(()),
            },
            Expr::Lambda(_) | Expr::Chain { .. } => {
                Err(Error::InvalidExpression(crate::format_expr(expr)))
            }
            Expr::List(items) | Expr::Call { args: items, .. } => {
                items.iter().try_for_each(|item| self.check_lambda(item))
            }
            Expr::Unary { operand, .. } => self.check_lambda(operand),
            Expr::Paren(inner) => self.check_lambda(inner),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_lambda(lhs)?;
                self.check_lambda(rhs)
            }
            _ => Ok(()),
        }
    }

    // Arguments are evaluated with lists flattened into their elements.
    fn args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for arg in args {
            match self.eval(arg)? {
                Value::List(items) => out.extend(items),
                value => out.push(value),
            }
        }
        Ok(out)
    }

    fn chain(&mut self, mut current: usize, links: &[Link]) -> Result<Value> {
        // Index of the handler under construction on the current node.
        let mut handler: Option<usize> = None;

        for Link { op, name, args } in links {
            let args = self.args(args)?;
            let node_name = self.nodes[current].name.clone();

            match op {
                ChainOp::Pipe => {
                    let spec = node_spec(name).ok_or_else(|| Error::UnknownMethod {
                        node: node_name.clone(),
                        method: name.clone(),
                    })?;
                    let parent_edge = self.nodes[current].edge;
                    if let Some(want) = spec.wants {
                        if want != parent_edge {
                            return Err(Error::EdgeMismatch {
                                node: name.clone(),
                                want,
                                got: parent_edge,
                            });
                        }
                    }
                    check(name, name, spec.args, &args)?;

                    let mut parents = vec![current];
                    parents.extend(args.iter().filter_map(|a| match a {
                        Value::Node(n) => Some(*n),
                        _ => None,
                    }));

                    self.nodes.push(Node {
                        name: name.clone(),
                        parents,
                        edge: spec.provides.unwrap_or(parent_edge),
                        args,
                        properties: Vec::new(),
                        handlers: Vec::new(),
                    });
                    current = self.nodes.len() - 1;
                    handler = None;
                }
                ChainOp::Property => {
                    let node = &mut self.nodes[current];
                    let is_alert = matches!(node.name.as_str(), "alert" | "deadman");

                    if let Some(sig) = handler
                        .and_then(|h| handler_property(&node.handlers[h].name, name))
                    {
                        check(&node_name, name, sig, &args)?;
                        if let Some(h) = handler {
                            node.handlers[h].properties.push(Property {
                                name: name.clone(),
                                args,
                            });
                        }
                    } else if let Some(sig) = is_alert.then(|| handler_spec(name)).flatten() {
                        check(&node_name, name, sig, &args)?;
                        node.handlers.push(Handler {
                            name: name.clone(),
                            args,
                            properties: Vec::new(),
                        });
                        handler = Some(node.handlers.len() - 1);
                    } else if let Some(sig) = node_property(&node.name, name) {
                        check(&node_name, name, sig, &args)?;
                        node.properties.push(Property {
                            name: name.clone(),
                            args,
                        });
                    } else {
                        let on = match handler {
                            Some(h) => format!("{node_name}.{}", node.handlers[h].name),
                            None => node_name,
                        };
                        return Err(Error::UnknownMethod {
                            node: on,
                            method: name.clone(),
                        });
                    }
                }
                ChainOp::Udf => {
                    return Err(Error::UnknownMethod {
                        node: node_name,
                        method: format!("@{name}"),
                    })
                }
            }
        }
        Ok(Value::Node(current))
    }
}

fn duration(literal: &str) -> Result<Duration> {
    let nanos = influxql::parse_duration(literal)?;
    Ok(Duration::from_nanos(nanos.unsigned_abs()))
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Option<Value> {
    Some(match (op, lhs, rhs) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => Value::String(a + &b),
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_add(b)?),
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_sub(b)?),
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_mul(b)?),
        (BinaryOp::Add, Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (BinaryOp::Sub, Value::Float(a), Value::Float(b)) => Value::Float(a - b),
        (BinaryOp::Mul, Value::Float(a), Value::Float(b)) => Value::Float(a * b),
        (BinaryOp::Div, Value::Float(a), Value::Float(b)) => Value::Float(a / b),
        (BinaryOp::Add, Value::Duration(a), Value::Duration(b)) => {
            Value::Duration(a.checked_add(b)?)
        }
        (BinaryOp::Sub, Value::Duration(a), Value::Duration(b)) => {
            Value::Duration(a.checked_sub(b)?)
        }
        _ => return None,
    })
}

/// Kind of value accepted by a parameter.
#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Int,
    /// Int or float.
    Number,
    Duration,
    Lambda,
    /// String or `*`.
    Field,
    Node,
    /// Any non-node value.
    Any,
}

impl Kind {
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Kind::String, Value::String(_)) => true,
            (Kind::Int, Value::Int(_)) => true,
            (Kind::Number, Value::Int(_) | Value::Float(_)) => true,
            (Kind::Duration, Value::Duration(_)) => true,
            (Kind::Lambda, Value::Lambda(_)) => true,
            (Kind::Field, Value::String(_) | Value::Star) => true,
            (Kind::Node, Value::Node(_)) => true,
            (Kind::Any, Value::Node(_) | Value::List(_)) => false,
            (Kind::Any, _) => true,
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Int => "int",
            Kind::Number => "number",
            Kind::Duration => "duration",
            Kind::Lambda => "lambda",
            Kind::Field => "string or *",
            Kind::Node => "node",
            Kind::Any => "value",
        }
    }
}

/// Signature of a node or property method: its required parameters, and
/// the kind of any further variadic parameters.
#[derive(Debug, Clone, Copy)]
struct Sig {
    args: &'static [Kind],
    rest: Option<Kind>,
}

const NONE: Sig = Sig {
    args: &[],
    rest: None,
};
const STR: Sig = Sig {
    args: &[Kind::String],
    rest: None,
};
const STRS: Sig = Sig {
    args: &[],
    rest: Some(Kind::String),
};
const DUR: Sig = Sig {
    args: &[Kind::Duration],
    rest: None,
};
const LAMBDA: Sig = Sig {
    args: &[Kind::Lambda],
    rest: None,
};
const INT: Sig = Sig {
    args: &[Kind::Int],
    rest: None,
};

fn check(node: &str, method: &str, sig: Sig, args: &[Value]) -> Result<()> {
    let invalid = |reason: String| Error::InvalidArguments {
        node: node.to_string(),
        method: method.to_string(),
        reason,
    };

    if args.len() < sig.args.len() || (sig.rest.is_none() && args.len() > sig.args.len()) {
        return Err(invalid(format!(
            "expected {}{} arguments, got {}",
            sig.args.len(),
            if sig.rest.is_some() { " or more" } else { "" },
            args.len()
        )));
    }
    for (i, arg) in args.iter().enumerate() {
        let kind = sig.args.get(i).copied().or(sig.rest);
        match kind {
            Some(kind) if kind.accepts(arg) => {}
            Some(kind) => {
                return Err(invalid(format!(
                    "argument {} must be a {}, not a {}",
                    i + 1,
                    kind.name(),
                    arg.kind()
                )))
            }
            None => return Err(invalid("too many arguments".to_string())),
        }
    }
    Ok(())
}

struct NodeSpec {
    /// Required edge of the parent, if any.
    wants: Option<Edge>,
    /// Edge produced, or None if the parent's edge passes through.
    provides: Option<Edge>,
    args: Sig,
}

const AGGREGATES: &[&str] = &[
    "bottom",
    "count",
    "cumulativeSum",
    "difference",
    "distinct",
    "elapsed",
    "first",
    "integral",
    "last",
    "max",
    "mean",
    "median",
    "min",
    "mode",
    "movingAverage",
    "percentile",
    "spread",
    "stddev",
    "sum",
    "top",
];

/// Whether `name` is an aggregating node of a single field.
pub(crate) fn is_aggregate(name: &str) -> bool {
    AGGREGATES.contains(&name)
}

fn node_spec(name: &str) -> Option<NodeSpec> {
    let spec = |wants, provides, args| {
        Some(NodeSpec {
            wants,
            provides,
            args,
        })
    };
    let any = |args| spec(None, None, args);

    match name {
        "from" => spec(Some(Edge::Stream), None, NONE),
        "query" => spec(Some(Edge::Batch), None, STR),
        "window" => spec(Some(Edge::Stream), Some(Edge::Batch), NONE),
        "eval" => any(Sig {
            args: &[Kind::Lambda],
            rest: Some(Kind::Lambda),
        }),
        "where" => any(LAMBDA),
        "shift" => any(DUR),
        "join" | "union" => any(Sig {
            args: &[Kind::Node],
            rest: Some(Kind::Node),
        }),
        "alert" => any(NONE),
        "deadman" => any(Sig {
            args: &[Kind::Number, Kind::Duration],
            rest: Some(Kind::Lambda),
        }),
        "influxDBOut" | "log" | "default" | "delete" | "flatten" | "stateDuration" => any(NONE),
        "httpOut" => any(STR),
        "httpPost" => any(STRS),
        "derivative" => any(STR),
        "sample" => any(Sig {
            args: &[Kind::Any],
            rest: None,
        }),
        "stats" => spec(None, Some(Edge::Stream), DUR),
        "groupBy" => any(Sig {
            args: &[],
            rest: Some(Kind::Field),
        }),
        "top" | "bottom" => any(Sig {
            args: &[Kind::Int, Kind::String],
            rest: Some(Kind::String),
        }),
        name if is_aggregate(name) => any(Sig {
            args: &[Kind::String],
            rest: Some(Kind::Any),
        }),
        _ => None,
    }
}

fn node_property(node: &str, property: &str) -> Option<Sig> {
    let sig = match (node, property) {
        (_, "quiet") => NONE,

        ("from", "database" | "retentionPolicy" | "measurement") => STR,
        ("from", "groupBy") => Sig {
            args: &[],
            rest: Some(Kind::Field),
        },
        ("from", "where") => LAMBDA,
        ("from", "truncate" | "round") => DUR,
        ("from", "groupByMeasurement") => NONE,

        ("query", "period" | "every" | "offset") => DUR,
        ("query", "align" | "alignGroup" | "groupByMeasurement") => NONE,
        ("query", "cluster" | "cron") => STR,
        ("query", "groupBy") => Sig {
            args: &[],
            rest: Some(Kind::Any),
        },
        ("query", "fill") => Sig {
            args: &[Kind::Any],
            rest: None,
        },

        ("window", "period" | "every") => DUR,
        ("window", "periodCount" | "everyCount") => INT,
        ("window", "align" | "fillPeriod") => NONE,

        ("eval", "as" | "keep" | "tags") => STRS,

        ("join", "as" | "on") => STRS,
        ("join", "tolerance") => DUR,
        ("join", "streamName" | "delimiter") => STR,
        ("join", "fill") => Sig {
            args: &[Kind::Any],
            rest: None,
        },
        ("union", "rename") => STR,

        ("alert" | "deadman", prop) => return alert_property(prop),

        ("influxDBOut", "database" | "retentionPolicy" | "measurement" | "cluster") => STR,
        ("influxDBOut", "writeConsistency" | "precision") => STR,
        ("influxDBOut", "buffer") => INT,
        ("influxDBOut", "flushInterval") => DUR,
        ("influxDBOut", "tag") => Sig {
            args: &[Kind::String, Kind::String],
            rest: None,
        },
        ("influxDBOut", "create") => NONE,

        ("httpPost", "header") => Sig {
            args: &[Kind::String, Kind::String],
            rest: None,
        },
        ("httpPost", "captureResponse") => NONE,
        ("httpPost", "timeout") => DUR,
        ("httpPost", "codeField") => STR,

        ("log", "level" | "prefix") => STR,

        ("default", "field") => Sig {
            args: &[Kind::String, Kind::Any],
            rest: None,
        },
        ("default", "tag") => Sig {
            args: &[Kind::String, Kind::String],
            rest: None,
        },
        ("delete", "field" | "tag") => STR,

        ("derivative", "as") => STR,
        ("derivative", "unit") => DUR,
        ("derivative", "nonNegative") => NONE,

        ("stats", "align") => NONE,
        ("groupBy", "byMeasurement") => NONE,
        ("stateDuration", "as") => STR,
        ("stateDuration", "unit") => DUR,

        (node, "as") if is_aggregate(node) => STR,
        (node, "usePointTimes") if is_aggregate(node) => NONE,
        _ => return None,
    };
    Some(sig)
}

fn alert_property(property: &str) -> Option<Sig> {
    let sig = match property {
        "id" | "message" | "details" | "topic" | "category" => STR,
        "idTag" | "levelTag" | "messageField" | "durationField" | "levelField" => STR,
        "info" | "warn" | "crit" | "infoReset" | "warnReset" | "critReset" => LAMBDA,
        "stateChangesOnly" => Sig {
            args: &[],
            rest: Some(Kind::Duration),
        },
        "noRecoveries" | "all" => NONE,
        "flapping" => Sig {
            args: &[Kind::Number, Kind::Number],
            rest: None,
        },
        "history" => INT,
        "inhibit" => Sig {
            args: &[Kind::String],
            rest: Some(Kind::String),
        },
        _ => return None,
    };
    Some(sig)
}

fn handler_spec(name: &str) -> Option<Sig> {
    let sig = match name {
        "post" | "email" | "exec" => STRS,
        "tcp" | "log" => STR,
        "victorOps" | "pagerDuty" | "pagerDuty2" | "pushover" | "sensu" | "slack"
        | "telegram" | "hipChat" | "alerta" | "opsGenie" | "opsGenie2" | "talk" | "kafka" => {
            NONE
        }
        _ => return None,
    };
    Some(sig)
}

fn handler_property(handler: &str, property: &str) -> Option<Sig> {
    let sig = match (handler, property) {
        ("post", "header") => Sig {
            args: &[Kind::String, Kind::String],
            rest: None,
        },
        ("post", "captureResponse" | "skipSSLVerification") => NONE,
        ("post", "timeout") => DUR,
        ("post", "endpoint") => STR,
        ("email", "to") => STRS,
        ("log", "mode") => INT,
        ("victorOps", "routingKey") => STR,
        ("pagerDuty", "serviceKey") => STR,
        ("pagerDuty2", "routingKey") => STR,
        ("pushover", "userKey" | "device" | "title" | "url" | "urlTitle" | "sound") => STR,
        ("sensu", "source") => STR,
        ("sensu", "handlers") => STRS,
        ("slack", "channel" | "username" | "iconEmoji" | "workspace") => STR,
        ("telegram", "chatId" | "parseMode") => STR,
        ("telegram", "disableWebPagePreview" | "disableNotification") => NONE,
        ("hipChat", "room" | "token") => STR,
        (
            "alerta",
            "token" | "resource" | "event" | "environment" | "group" | "value" | "origin",
        ) => STR,
        ("alerta", "services") => STRS,
        ("opsGenie" | "opsGenie2", "teams" | "recipients") => STRS,
        ("kafka", "cluster" | "kafkaTopic" | "template") => STR,
        _ => return None,
    };
    Some(sig)
}

#[cfg(test)]
mod test {
    use super::*;

    struct Deadman {
        global: bool,
    }

    impl DeadmanService for Deadman {
        fn interval(&self) -> Duration {
            Duration::from_secs(10)
        }
        fn threshold(&self) -> f64 {
            0.0
        }
        fn id(&self) -> String {
            "node 'NODE_NAME' in task '{{ .TaskName }}'".to_string()
        }
        fn message(&self) -> String {
            "{{ .ID }} is {{ if eq .Level \"OK\" }}alive{{ else }}dead{{ end }}".to_string()
        }
        fn global(&self) -> bool {
            self.global
        }
    }

    fn build_script(script: &str) -> Result<Pipeline> {
        build(&crate::parse(script)?, &Deadman { global: false })
    }

    #[test]
    fn test_stream_pipeline() {
        let pipeline = build_script(
            r#"
            var db = 'telegraf'
            var groupBy = ['host', 'cpu']
            var crit = 90
            var data = stream
                |from().database(db).groupBy(groupBy).where(lambda: "cpu" == 'cpu-total')
                |window().period(10m).every(1m).align()
                |mean('usage_idle').as('value')
            data
                |alert()
                    .crit(lambda: "value" > crit)
                    .message('hi')
                    .slack()
                    .channel('#a')
                    .email('ops@example.com')
                    .to('dev@example.com')
                    .details('more')
            "#,
        )
        .unwrap();

        assert_eq!(pipeline.edge(), Edge::Stream);
        let names: Vec<_> = pipeline.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["stream", "from", "window", "mean", "alert"]);

        let from = &pipeline.nodes()[1];
        assert_eq!(
            from.property("groupBy").map(|p| p.args.clone()),
            Some(vec![
                Value::String("host".to_string()),
                Value::String("cpu".to_string())
            ])
        );
        assert_eq!(pipeline.nodes()[2].edge, Edge::Batch);

        let alert = &pipeline.nodes()[4];
        assert_eq!(alert.parents, vec![3]);
        assert_eq!(
            alert.handlers.iter().map(|h| h.name.as_str()).collect::<Vec<_>>(),
            vec!["slack", "email"]
        );
        assert_eq!(alert.handlers[1].properties[0].name, "to");
        // Alert properties remain reachable from within a handler.
        assert!(alert.property("details").is_some());
    }

    #[test]
    fn test_join_and_deadman_defaults() {
        let pipeline = build_script(
            r#"
            var data = stream|from().measurement('cpu')
            var past = data|shift(1m)
            var current = data
            past|join(current).as('past', 'current')|alert().crit(lambda: TRUE)
            data|deadman(0.0, 5m).id('custom')
            "#,
        )
        .unwrap();

        let join = pipeline.nodes().iter().find(|n| n.name == "join").unwrap();
        assert_eq!(join.parents, vec![2, 1]);

        let deadman = pipeline.nodes().iter().find(|n| n.name == "deadman").unwrap();
        assert_eq!(
            deadman.property("id").unwrap().args,
            vec![Value::String("custom".to_string())]
        );
        assert!(deadman.property("message").is_some());
    }

    #[test]
    fn test_global_deadman() {
        let program = crate::parse("stream|from().measurement('cpu')|httpOut('x')").unwrap();
        let pipeline = build(&program, &Deadman { global: true }).unwrap();
        let deadman = pipeline.nodes().last().unwrap();
        assert_eq!(deadman.name, "deadman");
        assert_eq!(deadman.parents, vec![1]);
    }

    #[test]
    fn test_pipeline_errors() {
        let cases: Vec<(&str, fn(&Error) -> bool)> = vec![
            ("var x = 1", |e| matches!(e, Error::NoSource)),
            ("stream|from().database(db)", |e| {
                matches!(e, Error::UndefinedVariable(v) if v == "db")
            }),
            ("stream|from().where(lambda: \"x\" > missing)", |e| {
                matches!(e, Error::UndefinedVariable(v) if v == "missing")
            }),
            ("stream|frob()", |e| matches!(e, Error::UnknownMethod { .. })),
            ("stream|from().colour('red')", |e| {
                matches!(e, Error::UnknownMethod { .. })
            }),
            ("stream|from()|alert().slack().to('x')", |e| {
                matches!(e, Error::UnknownMethod { node, .. } if node == "alert.slack")
            }),
            ("stream|from().database(5)", |e| {
                matches!(e, Error::InvalidArguments { .. })
            }),
            ("stream|window()|window()", |e| {
                matches!(e, Error::EdgeMismatch { .. })
            }),
            ("batch|from()", |e| matches!(e, Error::EdgeMismatch { .. })),
            ("stream|from()\nbatch|query('SELECT 1')", |e| {
                matches!(e, Error::MixedSources)
            }),
            ("var x = \"value\"", |e| {
                matches!(e, Error::ReferenceOutsideLambda(_))
            }),
            ("stream|from()@udf()", |e| matches!(e, Error::UnknownMethod { .. })),
        ];

        for (script, is_expected) in cases {
            let err = build_script(script).unwrap_err();
            assert!(is_expected(&err), "{script}: {err:?}");
        }
    }
}
