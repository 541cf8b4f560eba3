//! Boolean predicates over tag values, shared by query conversion and by
//! the recovery of where-filters from TICKscripts.
//!
//! The supported shape is an AND of groups, where each group is an OR of
//! `=` / `!=` comparisons between a single tag key and string values.

use crate::ast::{BinaryOp, Expr};
use crate::{Error, Result};
use models::Tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Eq,
    Neq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagComparison {
    pub key: String,
    pub op: TagOp,
    pub value: String,
}

/// Flatten nested ANDs (through parentheses) into their terms.
pub fn conjuncts(expr: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    collect(expr, BinaryOp::And, &mut out);
    out
}

fn collect<'e>(expr: &'e Expr, join: BinaryOp, out: &mut Vec<&'e Expr>) {
    match expr.unparen() {
        Expr::Binary { op, lhs, rhs } if *op == join => {
            collect(lhs, join, out);
            collect(rhs, join, out);
        }
        other => out.push(other),
    }
}

/// Match `expr` as an OR of comparisons on a single tag key.
pub fn tag_group(expr: &Expr) -> Option<Vec<TagComparison>> {
    let mut terms = Vec::new();
    collect(expr, BinaryOp::Or, &mut terms);

    let group = terms
        .into_iter()
        .map(tag_comparison)
        .collect::<Option<Vec<_>>>()?;

    let key = &group.first()?.key;
    if group.iter().all(|c| &c.key == key) {
        Some(group)
    } else {
        None
    }
}

/// Match `expr` as `tag = 'value'` or `tag != 'value'`, in either operand order.
pub fn tag_comparison(expr: &Expr) -> Option<TagComparison> {
    let Expr::Binary { op, lhs, rhs } = expr.unparen() else {
        return None;
    };
    let op = match op {
        BinaryOp::Eq => TagOp::Eq,
        BinaryOp::Neq => TagOp::Neq,
        _ => return None,
    };

    let (key, value) = match (lhs.unparen(), rhs.unparen()) {
        (Expr::VarRef { name, cast: None }, Expr::String(value))
        | (Expr::String(value), Expr::VarRef { name, cast: None }) => (name, value),
        _ => return None,
    };
    if key.eq_ignore_ascii_case("time") {
        return None;
    }

    Some(TagComparison {
        key: key.clone(),
        op,
        value: value.clone(),
    })
}

/// TagFilter is the accumulation of tag groups.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagFilter {
    pub tags: Tags,
    /// Whether every comparison is an equality. False when there are none.
    pub accepted: bool,
    comparisons: usize,
    all_eq: bool,
}

impl TagFilter {
    pub fn new() -> Self {
        Self {
            all_eq: true,
            ..Default::default()
        }
    }

    pub fn extend(&mut self, group: Vec<TagComparison>) {
        for TagComparison { key, op, value } in group {
            self.comparisons += 1;
            self.all_eq &= op == TagOp::Eq;
            self.tags.entry(key).or_default().push(value);
        }
        self.accepted = self.comparisons != 0 && self.all_eq;
    }
}

/// Parse a boolean predicate over tags, such as the body of a where-filter
/// lambda. `TRUE` is the empty filter.
pub fn parse_where(text: &str) -> Result<TagFilter> {
    let expr = crate::parse_expr(text)?;
    let mut filter = TagFilter::new();

    if expr.unparen() == &Expr::Boolean(true) {
        return Ok(filter);
    }
    for term in conjuncts(&expr) {
        let group = tag_group(term).ok_or_else(|| Error::UnsupportedPredicate(term.to_string()))?;
        filter.extend(group);
    }
    Ok(filter)
}
