use itertools::Itertools;
use models::{AlertRule, FieldKind, QueryConfig, TriggerKind};

use crate::vars::{query, quote, reference};
use crate::{operators, Error, Options, Result};

/// How the alerted value is derived from the queried field.
#[derive(Debug, PartialEq)]
pub(crate) enum ValueStage<'q> {
    /// A windowed aggregate of the field.
    Window {
        node: &'static str,
        field: &'q str,
        args: Vec<&'q str>,
    },
    /// The field itself.
    Eval { field: &'q str },
}

pub(crate) fn value_stage(query: &QueryConfig) -> Result<ValueStage<'_>> {
    let [field] = query.fields.as_slice() else {
        return Err(Error::FieldCount(query.fields.len()));
    };

    match field.kind {
        FieldKind::Field => Ok(ValueStage::Eval {
            field: &field.value,
        }),
        FieldKind::Func => {
            let node = operators::node_name(&field.value)
                .ok_or_else(|| Error::UnsupportedFunction(field.value.clone()))?;

            let Some((first, rest)) = field.args.split_first() else {
                return Err(Error::UnsupportedField(field.value.clone()));
            };
            if first.kind != FieldKind::Field {
                return Err(Error::UnsupportedField(first.value.clone()));
            }
            let args = rest
                .iter()
                .map(|arg| match arg.kind {
                    FieldKind::Integer | FieldKind::Number => Ok(arg.value.as_str()),
                    _ => Err(Error::UnsupportedField(arg.value.clone())),
                })
                .collect::<Result<Vec<_>>>()?;

            if query.group_by.time.is_empty() {
                return Err(Error::Empty("group by time"));
            }
            Ok(ValueStage::Window {
                node,
                field: &first.value,
                args,
            })
        }
        _ => Err(Error::UnsupportedField(field.value.clone())),
    }
}

/// The `data` stream of queried points, and their alerted value.
pub fn data(rule: &AlertRule, _options: &Options) -> Result<String> {
    let query = query(rule)?;
    let mut out = String::from(
        "var data = stream
    |from()
        .database(db)
        .retentionPolicy(rp)
        .measurement(measurement)
        .groupBy(groupBy)
        .where(whereFilter)
",
    );
    if rule.trigger == TriggerKind::Deadman {
        return Ok(out);
    }

    match value_stage(query)? {
        ValueStage::Window { node, field, args } => {
            let field = quote(field);
            let args = if operators::count_first(node) {
                args.into_iter().chain([field.as_str()]).join(", ")
            } else {
                [field.as_str()].into_iter().chain(args).join(", ")
            };
            out.push_str(&format!(
                "    |window()
        .period(period)
        .every(every)
        .align()
    |{node}({args})
        .as('value')
"
            ));
        }
        ValueStage::Eval { field } => {
            out.push_str(&format!(
                "    |eval(lambda: {})
        .as('value')
",
                reference(field)
            ));
        }
    }
    Ok(out)
}
