use crate::ast::{BinaryOp, Expr, SelectStatement, Source, Statement};
use crate::tags::{self, TagFilter};
use crate::Result;
use models::{DurationRange, Field, GroupBy, QueryConfig};

/// Functions which may be modeled as field projections.
const FUNCTIONS: &[&str] = &[
    // Aggregations.
    "count",
    "distinct",
    "integral",
    "mean",
    "median",
    "mode",
    "spread",
    "stddev",
    "sum",
    // Selectors.
    "bottom",
    "first",
    "last",
    "max",
    "min",
    "percentile",
    "sample",
    "top",
    // Transformations.
    "cumulative_sum",
    "derivative",
    "difference",
    "elapsed",
    "moving_average",
    "non_negative_derivative",
    "non_negative_difference",
];

// Reason a parsed query has no structured representation.
#[derive(Debug)]
struct Unsupported(&'static str);

type Structured<T> = std::result::Result<T, Unsupported>;

/// Convert an InfluxQL query into a QueryConfig.
///
/// Queries which parse, but fall outside of what QueryConfig can represent,
/// are returned as raw-text configs. Only syntax errors are errors.
#[tracing::instrument(level = "debug", err)]
pub fn convert(query: &str) -> Result<QueryConfig> {
    let parsed = crate::parse_query(query)?;

    let stmt = match parsed.statements.as_slice() {
        [Statement::Select(stmt)] => stmt,
        [Statement::Other(keyword)] => {
            tracing::debug!(%keyword, "statement is not a SELECT");
            return Ok(QueryConfig::raw(query));
        }
        _ => {
            tracing::debug!(statements = parsed.statements.len(), "multiple statements");
            return Ok(QueryConfig::raw(query));
        }
    };

    match structured(stmt) {
        Ok(cfg) => Ok(cfg),
        Err(Unsupported(reason)) => {
            tracing::debug!(reason, "query cannot be represented; keeping raw text");
            Ok(QueryConfig::raw(query))
        }
    }
}

fn structured(stmt: &SelectStatement) -> Structured<QueryConfig> {
    if stmt.target.is_some() {
        return Err(Unsupported("INTO clause"));
    } else if !stmt.order_by.is_empty() {
        return Err(Unsupported("ORDER BY clause"));
    } else if stmt.limit.is_some() || stmt.offset.is_some() {
        return Err(Unsupported("LIMIT or OFFSET clause"));
    } else if stmt.slimit.is_some() || stmt.soffset.is_some() {
        return Err(Unsupported("SLIMIT or SOFFSET clause"));
    } else if stmt.timezone.is_some() {
        return Err(Unsupported("TZ clause"));
    }

    let measurement = match stmt.sources.as_slice() {
        [Source::Measurement(m)] if m.regex.is_none() => m,
        [Source::Measurement(_)] => return Err(Unsupported("regex measurement")),
        [Source::Subquery(_)] => return Err(Unsupported("subquery")),
        _ => return Err(Unsupported("multiple sources")),
    };

    let fields = stmt
        .fields
        .iter()
        .map(|f| {
            let field = top_level_field(&f.expr)?;
            Ok(match &f.alias {
                Some(alias) => field.with_alias(alias),
                None => field,
            })
        })
        .collect::<Structured<Vec<_>>>()?;

    let group_by = group_by(&stmt.dimensions)?;

    let fill = match &stmt.fill {
        Some(fill) => fill.to_string(),
        None if !group_by.time.is_empty() => "null".to_string(),
        None => String::new(),
    };

    let (filter, range) = match &stmt.condition {
        Some(cond) => condition(cond)?,
        None => (TagFilter::new(), None),
    };

    Ok(QueryConfig {
        database: measurement.database.clone(),
        retention_policy: measurement.retention_policy.clone(),
        measurement: measurement.name.clone(),
        fields,
        tags: filter.tags,
        group_by,
        are_tags_accepted: filter.accepted,
        fill,
        range,
        raw_text: None,
    })
}

fn top_level_field(expr: &Expr) -> Structured<Field> {
    match expr {
        Expr::VarRef { name, cast: None } => Ok(Field::field(name)),
        Expr::Wildcard { cast: None } => Ok(Field::wildcard()),
        Expr::Regex(r) => Ok(Field::regex(r)),
        Expr::Call { name, args } => function(name, args),
        Expr::VarRef { .. } | Expr::Wildcard { .. } => Err(Unsupported("typed field")),
        _ => Err(Unsupported("field expression")),
    }
}

fn function(name: &str, args: &[Expr]) -> Structured<Field> {
    let name = name.to_lowercase();
    if !FUNCTIONS.contains(&name.as_str()) {
        return Err(Unsupported("unknown function"));
    }

    let args = args
        .iter()
        .map(|arg| match arg {
            Expr::VarRef { name, cast: None } => Ok(Field::field(name)),
            Expr::Wildcard { cast: None } => Ok(Field::wildcard()),
            Expr::Regex(r) => Ok(Field::regex(r)),
            Expr::Integer(i) => Ok(Field::integer(i.to_string())),
            Expr::Number(n) => Ok(Field::number(n.to_string())),
            Expr::Call { name, args } => function(name, args),
            _ => Err(Unsupported("function argument")),
        })
        .collect::<Structured<Vec<_>>>()?;

    Ok(Field::func(name, args))
}

fn group_by(dimensions: &[Expr]) -> Structured<GroupBy> {
    let mut out = GroupBy::default();

    for dim in dimensions {
        let time = match dim {
            Expr::VarRef { name, cast: None } => {
                out.tags.push(name.clone());
                continue;
            }
            Expr::Template(t) if t == "interval" => "auto".to_string(),
            Expr::Call { name, args } if name.eq_ignore_ascii_case("time") => {
                match args.as_slice() {
                    [Expr::Duration { literal, .. }] => literal.clone(),
                    [Expr::Template(t)] if t == "interval" => "auto".to_string(),
                    [_, _] => return Err(Unsupported("time() offset")),
                    _ => return Err(Unsupported("time() argument")),
                }
            }
            Expr::Wildcard { .. } => return Err(Unsupported("GROUP BY *")),
            Expr::Regex(_) => return Err(Unsupported("regex dimension")),
            _ => return Err(Unsupported("dimension")),
        };

        if !out.time.is_empty() {
            return Err(Unsupported("multiple time dimensions"));
        }
        out.time = time;
    }
    Ok(out)
}

#[derive(Debug, PartialEq)]
enum Bound {
    Now,
    Offset(String),
    // Dashboard templates are resolved by the caller, so they leave the range unset.
    Template,
}

fn condition(cond: &Expr) -> Structured<(TagFilter, Option<DurationRange>)> {
    let mut filter = TagFilter::new();
    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;

    for term in tags::conjuncts(cond) {
        if let Some((op, operand)) = time_comparison(term) {
            let slot = match op {
                BinaryOp::Gt | BinaryOp::Gte => &mut lower,
                BinaryOp::Lt | BinaryOp::Lte => &mut upper,
                _ => return Err(Unsupported("time equality")),
            };
            if slot.is_some() {
                return Err(Unsupported("duplicate time bound"));
            }
            *slot = Some(time_bound(operand)?);
        } else if let Some(group) = tags::tag_group(term) {
            filter.extend(group);
        } else {
            return Err(Unsupported("where predicate"));
        }
    }

    let render = |bound: Bound| match bound {
        Bound::Now => Some("now()".to_string()),
        Bound::Offset(literal) => Some(format!("now() - {literal}")),
        Bound::Template => None,
    };

    let range = match (lower, upper) {
        (None, None) => None,
        (None, Some(Bound::Template)) => None,
        (None, Some(_)) => return Err(Unsupported("upper time bound without a lower bound")),
        (Some(lower), upper) => match (render(lower), upper.map(render)) {
            (Some(lower), None) => Some(DurationRange {
                lower,
                upper: String::new(),
            }),
            (Some(lower), Some(Some(upper))) => Some(DurationRange { lower, upper }),
            _ => None,
        },
    };

    Ok((filter, range))
}

// Match `time <op> operand` in either operand order, normalized so that
// `time` is on the left.
fn time_comparison(expr: &Expr) -> Option<(BinaryOp, &Expr)> {
    let Expr::Binary { op, lhs, rhs } = expr.unparen() else {
        return None;
    };
    if !op.is_comparison() {
        return None;
    }
    if lhs.unparen().is_var("time") {
        Some((*op, rhs.unparen()))
    } else if rhs.unparen().is_var("time") {
        Some((op.flip(), lhs.unparen()))
    } else {
        None
    }
}

fn time_bound(operand: &Expr) -> Structured<Bound> {
    match operand {
        e if e.is_nullary_call("now") => Ok(Bound::Now),
        Expr::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        } if lhs.unparen().is_nullary_call("now") => match rhs.unparen() {
            Expr::Duration { literal, .. } if !literal.starts_with('-') => {
                Ok(Bound::Offset(literal.clone()))
            }
            _ => Err(Unsupported("time offset")),
        },
        Expr::Template(t) if t == "dashboardTime" || t == "upperDashboardTime" => {
            Ok(Bound::Template)
        }
        _ => Err(Unsupported("time comparison")),
    }
}
