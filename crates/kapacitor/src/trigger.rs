use models::{AlertRule, Change, Operator, TriggerKind};

use crate::{operators, Error, Options, Result};

/// Absolute percent change of the current value from the shifted past value.
pub(crate) const PERCENT_CHANGE: &str =
    r#"abs(float("current.value" - "past.value")) / float("past.value") * 100.0"#;
/// Difference of the current value from the shifted past value.
pub(crate) const AMOUNT_CHANGE: &str = r#"float("current.value" - "past.value")"#;

/// The `trigger` alert node, through its common alert properties.
/// Alert services are chained on after it.
pub fn trigger(rule: &AlertRule, _options: &Options) -> Result<String> {
    let values = &rule.trigger_values;

    let mut out = match rule.trigger {
        TriggerKind::Deadman => "var trigger = data
    |deadman(threshold, period)
"
        .to_string(),
        TriggerKind::Threshold => {
            let operator = values
                .operator
                .ok_or(Error::MissingOperator(rule.trigger))?;
            format!(
                "var trigger = data
    |alert()
        .crit(lambda: {})
",
                crit(operator)
            )
        }
        TriggerKind::Relative => {
            let operator = values
                .operator
                .ok_or(Error::MissingOperator(rule.trigger))?;
            let change = match values.change.ok_or(Error::MissingChange)? {
                Change::Percent => PERCENT_CHANGE,
                Change::Amount => AMOUNT_CHANGE,
            };
            format!(
                "var past = data
    |shift(shift)

var current = data

var trigger = past
    |join(current)
        .as('past', 'current')
    |eval(lambda: {change})
        .keep()
        .as('value')
    |alert()
        .crit(lambda: {})
",
                crit(operator)
            )
        }
    };

    out.push_str(
        "        .message(message)
        .id(idVar)
        .idTag(idTag)
        .levelTag(levelTag)
        .messageField(messageField)
        .durationField(durationField)
",
    );
    if !rule.details.is_empty() {
        out.push_str("        .details(details)\n");
    }
    Ok(out)
}

fn crit(operator: Operator) -> String {
    match (operator, operators::comparison(operator)) {
        (_, Some(op)) => format!("\"value\" {} crit", op.symbol()),
        (Operator::InsideRange, None) => r#""value" >= lower AND "value" <= upper"#.to_string(),
        (_, None) => r#""value" < lower OR "value" > upper"#.to_string(),
    }
}
