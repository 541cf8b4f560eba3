use itertools::Itertools;
use models::{AlertRule, QueryConfig, TriggerKind};
use regex::Regex;

use crate::data::{value_stage, ValueStage};
use crate::{Error, Options, Result};

lazy_static::lazy_static! {
    // Literals which TICKscript reads as numbers.
    static ref NUMBER_RE: Regex =
        Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("Is a valid regex");
}

/// Variable bindings consumed by the remaining stanzas.
pub fn vars(rule: &AlertRule, options: &Options) -> Result<String> {
    let query = query(rule)?;
    let mut vars = vec![
        ("db", quote(non_empty("database", &query.database)?)),
        (
            "rp",
            quote(non_empty("retention policy", &query.retention_policy)?),
        ),
        (
            "measurement",
            quote(non_empty("measurement", &query.measurement)?),
        ),
        (
            "groupBy",
            format!("[{}]", query.group_by.tags.iter().map(|t| quote(t)).join(", ")),
        ),
        ("whereFilter", where_filter(query)),
    ];

    if rule.trigger == TriggerKind::Deadman {
        let period = non_empty("period", &rule.trigger_values.period)?;
        vars.push(("period", duration("period", period)?));
    } else if let ValueStage::Window { .. } = value_stage(query)? {
        vars.push(("period", duration("group by time", &query.group_by.time)?));
        vars.push(("every", duration("every", non_empty("every", &rule.every)?)?));
    }

    let id = if query.group_by.tags.is_empty() {
        "name".to_string()
    } else {
        "name + ':{{.Group}}'".to_string()
    };
    vars.extend([
        ("name", quote(non_empty("name", &rule.name)?)),
        ("idVar", id),
        ("message", quote(&rule.message)),
        ("idTag", quote(&options.id_tag)),
        ("levelTag", quote(&options.level_tag)),
        ("messageField", quote(&options.message_field)),
        ("durationField", quote(&options.duration_field)),
        ("outputDB", quote(&options.output_database)),
        ("outputRP", quote(&options.output_retention_policy)),
        ("outputMeasurement", quote(&options.output_measurement)),
        ("triggerType", quote(rule.trigger.name())),
    ]);
    if !rule.details.is_empty() {
        vars.push(("details", quote(&rule.details)));
    }

    let values = &rule.trigger_values;
    match rule.trigger {
        TriggerKind::Deadman => vars.push(("threshold", "0.0".to_string())),
        kind => {
            let operator = values.operator.ok_or(Error::MissingOperator(kind))?;
            if kind == TriggerKind::Relative {
                let shift = non_empty("shift", &values.shift)?;
                vars.push(("shift", duration("shift", shift)?));
            }
            if operator.is_range() {
                vars.push(("lower", literal(&values.value)));
                vars.push(("upper", literal(&values.range_value)));
            } else {
                vars.push(("crit", literal(&values.value)));
            }
        }
    }

    Ok(vars
        .into_iter()
        .map(|(name, value)| format!("var {name} = {value}\n"))
        .join("\n"))
}

/// The structured query of `rule`.
pub(crate) fn query(rule: &AlertRule) -> Result<&QueryConfig> {
    match &rule.query {
        None => Err(Error::MissingQuery),
        Some(query) if query.is_raw() => Err(Error::RawQuery),
        Some(query) => Ok(query),
    }
}

/// Single-quoted TICKscript string literal.
pub(crate) fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Double-quoted TICKscript field or tag reference.
pub(crate) fn reference(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

// Trigger values are numbers or booleans, and anything else is a string.
fn literal(value: &str) -> String {
    if is_number(value) || value == "TRUE" || value == "FALSE" {
        value.to_string()
    } else {
        quote(value)
    }
}

// The lexer reads the digits of a negative number before negating them,
// so the magnitude alone must fit.
fn is_number(value: &str) -> bool {
    if !NUMBER_RE.is_match(value) {
        return false;
    }
    let magnitude = value.trim_start_matches('-');
    if magnitude.contains('.') {
        magnitude.parse::<f64>().map_or(false, f64::is_finite)
    } else {
        magnitude.parse::<i64>().is_ok()
    }
}

fn non_empty<'s>(name: &'static str, value: &'s str) -> Result<&'s str> {
    if value.is_empty() {
        Err(Error::Empty(name))
    } else {
        Ok(value)
    }
}

fn duration(name: &'static str, literal: &str) -> Result<String> {
    influxql::parse_duration(literal).map_err(|source| Error::InvalidDuration { name, source })?;
    Ok(literal.to_string())
}

// One parenthesized group per tag key, of an OR over its values.
fn where_filter(query: &QueryConfig) -> String {
    let op = if query.are_tags_accepted { "==" } else { "!=" };

    let groups: Vec<String> = query
        .tags
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| {
            let terms = values
                .iter()
                .map(|value| format!("{} {op} {}", reference(key), quote(value)));
            format!("({})", terms.format(" OR "))
        })
        .sorted()
        .collect();

    if groups.is_empty() {
        "lambda: TRUE".to_string()
    } else {
        format!("lambda: {}", groups.join(" AND "))
    }
}
