use models::Operator;
use tickscript::ast::BinaryOp;

/// InfluxQL functions which map onto a Kapacitor aggregating node,
/// as (InfluxQL name, node name).
const AGGREGATES: &[(&str, &str)] = &[
    ("bottom", "bottom"),
    ("count", "count"),
    ("cumulative_sum", "cumulativeSum"),
    ("difference", "difference"),
    ("distinct", "distinct"),
    ("elapsed", "elapsed"),
    ("first", "first"),
    ("integral", "integral"),
    ("last", "last"),
    ("max", "max"),
    ("mean", "mean"),
    ("median", "median"),
    ("min", "min"),
    ("mode", "mode"),
    ("moving_average", "movingAverage"),
    ("percentile", "percentile"),
    ("spread", "spread"),
    ("stddev", "stddev"),
    ("sum", "sum"),
    ("top", "top"),
];

/// Node name of the InfluxQL function `func`.
pub fn node_name(func: &str) -> Option<&'static str> {
    AGGREGATES
        .iter()
        .find(|(influx, _)| *influx == func)
        .map(|(_, node)| *node)
}

/// InfluxQL function of the aggregating node `node`.
pub fn function_name(node: &str) -> Option<&'static str> {
    AGGREGATES
        .iter()
        .find(|(_, n)| *n == node)
        .map(|(influx, _)| *influx)
}

/// Selectors which take their count before the field.
pub fn count_first(node: &str) -> bool {
    matches!(node, "top" | "bottom")
}

/// Comparison of a single-valued operator.
pub fn comparison(op: Operator) -> Option<BinaryOp> {
    Some(match op {
        Operator::Greater => BinaryOp::Gt,
        Operator::Less => BinaryOp::Lt,
        Operator::LessEqual => BinaryOp::Lte,
        Operator::GreaterEqual => BinaryOp::Gte,
        Operator::Equal => BinaryOp::Eq,
        Operator::NotEqual => BinaryOp::Neq,
        Operator::InsideRange | Operator::OutsideRange => return None,
    })
}

pub fn operator(op: BinaryOp) -> Option<Operator> {
    Operator::all()
        .iter()
        .copied()
        .find(|candidate| comparison(*candidate) == Some(op))
}
