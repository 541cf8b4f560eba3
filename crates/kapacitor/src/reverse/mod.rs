use models::{
    AlertHandler, AlertNodes, AlertRule, Change, Field, Operator, QueryConfig, ServiceKind,
    TriggerKind, DBRP,
};
use regex::Regex;
use tickscript::ast::{BinaryOp, ChainOp, Expr, Link};
use tickscript::Grammar;

use crate::trigger::{AMOUNT_CHANGE, PERCENT_CHANGE};
use crate::validate::StubDeadman;
use crate::{operators, Error, Options, Result};

mod handlers;
mod symbols;

use symbols::{Stage, Symbols, Value};

/// Properties of alert and deadman nodes, as distinct from those of
/// their handlers.
const ALERT_PROPERTIES: &[&str] = &[
    "crit",
    "details",
    "durationField",
    "id",
    "idTag",
    "levelTag",
    "message",
    "messageField",
    "stateChangesOnly",
];

pub(crate) fn reverse<G: Grammar>(
    grammar: &G,
    options: &Options,
    script: &str,
    name_pattern: Option<&Regex>,
) -> Result<AlertRule> {
    if script.len() > options.max_script_bytes {
        return Err(Error::ScriptTooLarge {
            size: script.len(),
            limit: options.max_script_bytes,
        });
    }
    let program = grammar.parse(script).map_err(Error::Parse)?;
    let symbols = Symbols::new(&program);

    let binding = |name: &str| match symbols.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(not_generated(format!("{name} is not a string"))),
        None => Err(not_generated(format!("{name} is not declared"))),
    };
    let db = binding("db")?;
    let rp = binding("rp")?;
    binding("measurement")?;
    let trigger_type = binding("triggerType")?;

    let name = match name_pattern {
        None => binding("name")?,
        Some(pattern) => match capture_name(pattern, script) {
            Some(name) => name,
            None => binding("name").unwrap_or_default(),
        },
    };
    let trigger = trigger_stages(&symbols)?;
    let kind: TriggerKind = trigger_type.parse()?;

    let mut rule = AlertRule {
        name,
        trigger: kind,
        query: Some(QueryConfig::default()),
        tick_script: script.to_string(),
        dbrps: vec![DBRP { db, rp }],
        ..Default::default()
    };
    Walker {
        symbols: &symbols,
        stages: trigger,
        pos: 0,
    }
    .walk(&mut rule)?;

    grammar
        .build_pipeline(script, &StubDeadman)
        .map_err(Error::Validation)?;
    Ok(rule)
}

fn not_generated(reason: String) -> Error {
    tracing::debug!(%reason, "TICKscript was not generated from an alert rule");
    Error::NotChronoTickscript(reason)
}

fn capture_name(pattern: &Regex, script: &str) -> Option<String> {
    let captures = pattern.captures(script)?;
    captures
        .name("name")
        .or_else(|| captures.get(1))
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

fn is_alert(stage: &Stage) -> bool {
    stage.op == ChainOp::Pipe && matches!(stage.name.as_str(), "alert" | "deadman")
}

// Locate the pipeline of the alerting node, and check that every other
// pipeline either leads into it or follows from it into an output.
fn trigger_stages(symbols: &Symbols) -> Result<&[Stage]> {
    let trigger = symbols
        .chains
        .iter()
        .find_map(|(_, stages)| {
            let index = stages.iter().position(is_alert)?;
            Some(&stages[..=index])
        })
        .ok_or_else(|| not_generated("no alert or deadman node".to_string()))?;

    for (_, stages) in &symbols.chains {
        let tail: &[Stage] = match stages.iter().position(is_alert) {
            Some(index) if stages[..=index] == *trigger => &stages[index + 1..],
            None if trigger.starts_with(stages) => &[],
            _ => {
                let name = stages.last().map_or("", |s| s.name.as_str());
                return Err(Error::UnsupportedChain(name.to_string()));
            }
        };
        for stage in tail {
            if stage.op != ChainOp::Pipe
                || !matches!(stage.name.as_str(), "eval" | "influxDBOut" | "httpOut")
            {
                return Err(Error::UnsupportedChain(stage.name.clone()));
            }
        }
    }
    Ok(trigger)
}

struct Walker<'s> {
    symbols: &'s Symbols,
    stages: &'s [Stage],
    pos: usize,
}

impl<'s> Walker<'s> {
    fn walk(&mut self, rule: &mut AlertRule) -> Result<()> {
        let mut query = QueryConfig::default();

        let source = self.expect(&["stream"])?;
        if let Some(link) = source.properties.first() {
            return Err(unsupported(source, link));
        }
        let from = self.expect(&["from"])?;
        self.from(from, &mut query)?;

        if rule.trigger != TriggerKind::Deadman {
            match self.peek() {
                Some(stage) if stage.op == ChainOp::Pipe && stage.name == "window" => {
                    self.pos += 1;
                    self.window(stage, &mut query, &mut rule.every)?;
                    let aggregate = self.next()?;
                    query.fields.push(self.aggregate(aggregate)?);
                }
                _ => {
                    let eval = self.expect(&["eval"])?;
                    query.fields.push(self.field(eval)?);
                }
            }
        }
        if rule.trigger == TriggerKind::Relative {
            let shift = self.expect(&["shift"])?;
            rule.trigger_values.shift = self.arg(&shift.name, &shift.args)?;
            let join = self.expect(&["join"])?;
            self.join(join)?;
            let eval = self.expect(&["eval"])?;
            rule.trigger_values.change = Some(self.change(eval)?);
        }

        let alert = match rule.trigger {
            TriggerKind::Deadman => self.expect(&["deadman"])?,
            _ => self.expect(&["alert"])?,
        };
        if let [_, period] = alert.args.as_slice() {
            rule.trigger_values.period = self.text(&alert.name, period)?;
        } else if !alert.args.is_empty() {
            return Err(Error::UnsupportedChain(alert.name.clone()));
        }
        self.alert(alert, rule)?;

        rule.query = Some(query);
        Ok(())
    }

    fn peek(&self) -> Option<&'s Stage> {
        self.stages.get(self.pos)
    }

    fn next(&mut self) -> Result<&'s Stage> {
        let stage = self
            .peek()
            .ok_or_else(|| Error::UnsupportedChain("end of pipeline".to_string()))?;
        self.pos += 1;
        Ok(stage)
    }

    fn expect(&mut self, names: &[&str]) -> Result<&'s Stage> {
        let stage = self.next()?;
        if stage.op != ChainOp::Pipe || !names.contains(&stage.name.as_str()) {
            return Err(Error::UnsupportedChain(stage.name.clone()));
        }
        Ok(stage)
    }

    fn from(&self, stage: &Stage, query: &mut QueryConfig) -> Result<()> {
        for link in &stage.properties {
            match link.name.as_str() {
                "database" => query.database = self.arg(&link.name, &link.args)?,
                "retentionPolicy" => query.retention_policy = self.arg(&link.name, &link.args)?,
                "measurement" => query.measurement = self.arg(&link.name, &link.args)?,
                "groupBy" => query.group_by.tags = self.args(&link.name, &link.args)?,
                "where" => {
                    let [arg] = link.args.as_slice() else {
                        return Err(Error::InvalidArgument(link.name.clone()));
                    };
                    let Value::Lambda(body) = self.symbols.eval(arg) else {
                        return Err(Error::UnsupportedWhere(tickscript::format_expr(arg)));
                    };
                    // InfluxQL strings hold newlines only as escapes.
                    let text = tickscript::format_expr(&body).replace('\n', "\\n");
                    let filter = influxql::tags::parse_where(&text).map_err(|err| {
                        tracing::debug!(%err, "failed to parse where filter");
                        Error::UnsupportedWhere(text)
                    })?;
                    query.tags = filter.tags;
                    query.are_tags_accepted = filter.accepted;
                }
                _ => return Err(unsupported(stage, link)),
            }
        }
        Ok(())
    }

    fn window(&self, stage: &Stage, query: &mut QueryConfig, every: &mut String) -> Result<()> {
        for link in &stage.properties {
            match link.name.as_str() {
                "period" => query.group_by.time = self.arg(&link.name, &link.args)?,
                "every" => *every = self.arg(&link.name, &link.args)?,
                "align" if link.args.is_empty() => {}
                _ => return Err(unsupported(stage, link)),
            }
        }
        Ok(())
    }

    fn aggregate(&self, stage: &Stage) -> Result<Field> {
        let func = operators::function_name(&stage.name)
            .filter(|_| stage.op == ChainOp::Pipe)
            .ok_or_else(|| Error::UnsupportedChain(stage.name.clone()))?;
        self.as_value(stage, &[])?;

        let mut args = stage
            .args
            .iter()
            .map(|arg| self.symbols.eval(arg))
            .collect::<Vec<_>>();
        if operators::count_first(&stage.name) && !args.is_empty() {
            args.rotate_left(1);
        }

        let Some((Value::String(field), rest)) = args.split_first() else {
            return Err(Error::InvalidArgument(stage.name.clone()));
        };
        let mut fields = vec![Field::field(field.clone())];
        for arg in rest {
            match arg {
                Value::Number(n) if n.contains('.') => fields.push(Field::number(n.clone())),
                Value::Number(n) => fields.push(Field::integer(n.clone())),
                _ => return Err(Error::InvalidArgument(stage.name.clone())),
            }
        }
        Ok(Field::func(func, fields))
    }

    fn field(&self, stage: &Stage) -> Result<Field> {
        self.as_value(stage, &[])?;

        match stage.args.as_slice() {
            [arg] => match self.symbols.eval(arg) {
                Value::Lambda(Expr::Reference(field)) => Ok(Field::field(field)),
                _ => Err(Error::UnsupportedChain(stage.name.clone())),
            },
            _ => Err(Error::InvalidArgument(stage.name.clone())),
        }
    }

    fn join(&self, stage: &Stage) -> Result<()> {
        let [current] = stage.args.as_slice() else {
            return Err(Error::InvalidArgument(stage.name.clone()));
        };
        if !matches!(self.symbols.eval(current), Value::Chain(_)) {
            return Err(Error::InvalidArgument(stage.name.clone()));
        }
        for link in &stage.properties {
            match link.name.as_str() {
                "as" if self.args(&link.name, &link.args)? == ["past", "current"] => {}
                _ => return Err(unsupported(stage, link)),
            }
        }
        Ok(())
    }

    fn change(&self, stage: &Stage) -> Result<Change> {
        self.as_value(stage, &["keep"])?;

        let lambda = match stage.args.as_slice() {
            [arg] => self.symbols.eval(arg),
            _ => return Err(Error::InvalidArgument(stage.name.clone())),
        };
        match lambda {
            Value::Lambda(body) if tickscript::format_expr(&body) == PERCENT_CHANGE => {
                Ok(Change::Percent)
            }
            Value::Lambda(body) if tickscript::format_expr(&body) == AMOUNT_CHANGE => {
                Ok(Change::Amount)
            }
            _ => Err(Error::UnsupportedChain(stage.name.clone())),
        }
    }

    // Value stages name their result "value", and have no other
    // properties beyond those permitted.
    fn as_value(&self, stage: &Stage, permitted: &[&str]) -> Result<()> {
        for link in &stage.properties {
            match link.name.as_str() {
                "as" if self.args(&link.name, &link.args)? == ["value"] => {}
                name if permitted.contains(&name) => {}
                _ => return Err(unsupported(stage, link)),
            }
        }
        Ok(())
    }

    fn alert(&self, stage: &Stage, rule: &mut AlertRule) -> Result<()> {
        let mut nodes = AlertNodes::default();
        let mut handler: Option<AlertHandler> = None;

        for link in &stage.properties {
            let method = link.name.as_str();

            if let Some(current) = &mut handler {
                if handlers::properties(current.kind()).contains(&method) {
                    handlers::apply(current, method, self.args(method, &link.args)?)?;
                    continue;
                }
            }
            if ALERT_PROPERTIES.contains(&method) {
                if let Some(done) = handler.take() {
                    nodes.push(done);
                }
            }

            match method {
                "crit" => {
                    let [arg] = link.args.as_slice() else {
                        return Err(Error::InvalidArgument(link.name.clone()));
                    };
                    let Value::Lambda(body) = self.symbols.eval(arg) else {
                        return Err(Error::UnsupportedCrit(tickscript::format_expr(arg)));
                    };
                    let (operator, value, range_value) = self.crit(&body)?;
                    let values = &mut rule.trigger_values;
                    values.operator = Some(operator);
                    values.value = value;
                    values.range_value = range_value;
                }
                "message" => rule.message = self.arg(method, &link.args)?,
                "details" => rule.details = self.arg(method, &link.args)?,
                "stateChangesOnly" => nodes.state_changes_only = true,
                "id" | "idTag" | "levelTag" | "messageField" | "durationField" => {
                    self.arg(method, &link.args)?;
                }
                _ => {
                    let kind = ServiceKind::from_name(method)
                        .map_err(|_| Error::UnknownServiceMethod(method.to_string()))?;
                    if let Some(done) = handler.take() {
                        nodes.push(done);
                    }
                    handler = Some(handlers::start(kind, self.args(method, &link.args)?)?);
                }
            }
        }
        if let Some(done) = handler {
            nodes.push(done);
        }

        if rule.trigger != TriggerKind::Deadman && rule.trigger_values.operator.is_none() {
            return Err(Error::UnsupportedCrit(format!("{} without crit", stage.name)));
        }
        rule.alert_nodes = nodes;
        Ok(())
    }

    fn crit(&self, body: &Expr) -> Result<(Operator, String, String)> {
        let unsupported = || Error::UnsupportedCrit(tickscript::format_expr(body));

        match body.unparen() {
            Expr::Binary { op, lhs, rhs } if matches!(op, BinaryOp::And | BinaryOp::Or) => {
                let (lower_op, lower) = self.comparison(lhs).ok_or_else(unsupported)?;
                let (upper_op, upper) = self.comparison(rhs).ok_or_else(unsupported)?;

                let operator = match (op, lower_op, upper_op) {
                    (BinaryOp::And, BinaryOp::Gte, BinaryOp::Lte) => Operator::InsideRange,
                    (BinaryOp::Or, BinaryOp::Lt, BinaryOp::Gt) => Operator::OutsideRange,
                    _ => return Err(unsupported()),
                };
                Ok((operator, lower, upper))
            }
            expr => {
                let (op, value) = self.comparison(expr).ok_or_else(unsupported)?;
                let operator = operators::operator(op).ok_or_else(unsupported)?;
                Ok((operator, value, String::new()))
            }
        }
    }

    // A comparison of the alerted value against a literal or binding.
    fn comparison(&self, expr: &Expr) -> Option<(BinaryOp, String)> {
        let Expr::Binary { op, lhs, rhs } = expr.unparen() else {
            return None;
        };
        if !matches!(lhs.unparen(), Expr::Reference(r) if r == "value") {
            return None;
        }
        Some((*op, self.symbols.eval(rhs).text()?))
    }

    fn text(&self, method: &str, expr: &Expr) -> Result<String> {
        self.symbols
            .eval(expr)
            .text()
            .ok_or_else(|| Error::InvalidArgument(method.to_string()))
    }

    fn arg(&self, method: &str, args: &[Expr]) -> Result<String> {
        match args {
            [arg] => self.text(method, arg),
            _ => Err(Error::InvalidArgument(method.to_string())),
        }
    }

    // Arguments as text, with lists flattened into their elements.
    fn args(&self, method: &str, args: &[Expr]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for arg in args {
            match self.symbols.eval(arg) {
                Value::List(items) => {
                    for item in items {
                        out.push(
                            item.text()
                                .ok_or_else(|| Error::InvalidArgument(method.to_string()))?,
                        );
                    }
                }
                value => out.push(
                    value
                        .text()
                        .ok_or_else(|| Error::InvalidArgument(method.to_string()))?,
                ),
            }
        }
        Ok(out)
    }
}

fn unsupported(stage: &Stage, link: &Link) -> Error {
    Error::UnsupportedChain(format!("{}.{}", stage.name, link.name))
}
