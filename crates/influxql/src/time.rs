use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::Duration;

use crate::ast::{BinaryOp, Expr, Statement};
use crate::{Error, Result};

const DASHBOARD_LOOKBACK: i64 = 15 * 60 * 1_000_000_000;

/// Evaluate the time range of the first SELECT of `query` relative to `now`,
/// and return its length.
///
/// A missing upper bound is `now`. A missing lower bound, or an empty range,
/// is a zero duration.
#[tracing::instrument(level = "debug", err)]
pub fn parse_time(query: &str, now: DateTime<Utc>) -> Result<Duration> {
    let parsed = crate::parse_query(query)?;
    let stmt = parsed
        .statements
        .iter()
        .find_map(|s| match s {
            Statement::Select(s) => Some(s),
            Statement::Other(_) => None,
        })
        .ok_or(Error::NoSelect)?;

    let now = now.timestamp_nanos_opt().ok_or(Error::TimeOutOfRange)?;
    let mut range = TimeRange {
        now,
        min: None,
        max: None,
    };
    if let Some(cond) = &stmt.condition {
        range.collect(cond, false)?;
    }

    let Some(min) = range.min else {
        return Ok(Duration::ZERO);
    };
    let max = range.max.unwrap_or(now);

    if max < min {
        Ok(Duration::ZERO)
    } else {
        let nanos = max.checked_sub(min).ok_or(Error::TimeOutOfRange)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

// Bounds are inclusive nanoseconds since the epoch.
struct TimeRange {
    now: i64,
    min: Option<i64>,
    max: Option<i64>,
}

impl TimeRange {
    fn collect(&mut self, expr: &Expr, under_or: bool) -> Result<()> {
        let Expr::Binary { op, lhs, rhs } = expr.unparen() else {
            return Ok(());
        };

        match op {
            BinaryOp::And => {
                self.collect(lhs, under_or)?;
                return self.collect(rhs, under_or);
            }
            BinaryOp::Or => {
                self.collect(lhs, true)?;
                return self.collect(rhs, true);
            }
            op if !op.is_comparison() => return Ok(()),
            _ => {}
        }

        let (op, operand) = if lhs.unparen().is_var("time") {
            (*op, rhs)
        } else if rhs.unparen().is_var("time") {
            (op.flip(), lhs)
        } else {
            return Ok(());
        };

        if under_or {
            return Err(Error::InvalidTimeCondition(
                "time conditions cannot be joined by OR".to_string(),
            ));
        }
        let t = self.eval(operand)?;
        let overflow = || Error::TimeOutOfRange;

        match op {
            BinaryOp::Gt => self.raise_min(t.checked_add(1).ok_or_else(overflow)?),
            BinaryOp::Gte => self.raise_min(t),
            BinaryOp::Lt => self.lower_max(t.checked_sub(1).ok_or_else(overflow)?),
            BinaryOp::Lte => self.lower_max(t),
            BinaryOp::Eq => {
                self.raise_min(t);
                self.lower_max(t);
            }
            op => {
                return Err(Error::InvalidTimeCondition(format!(
                    "unsupported time operator {}",
                    op.symbol()
                )))
            }
        }
        Ok(())
    }

    fn raise_min(&mut self, t: i64) {
        self.min = Some(self.min.map_or(t, |min| min.max(t)));
    }

    fn lower_max(&mut self, t: i64) {
        self.max = Some(self.max.map_or(t, |max| max.min(t)));
    }

    fn eval(&self, expr: &Expr) -> Result<i64> {
        match expr {
            Expr::Paren(inner) => self.eval(inner),
            e if e.is_nullary_call("now") => Ok(self.now),
            Expr::Duration { nanos, .. } => Ok(*nanos),
            Expr::Integer(n) => Ok(*n),
            Expr::String(s) => parse_timestamp(s),
            Expr::Template(t) if t == "dashboardTime" => self
                .now
                .checked_sub(DASHBOARD_LOOKBACK)
                .ok_or(Error::TimeOutOfRange),
            Expr::Template(t) if t == "upperDashboardTime" => Ok(self.now),
            Expr::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Sub),
                lhs,
                rhs,
            } => {
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                let out = if *op == BinaryOp::Add {
                    lhs.checked_add(rhs)
                } else {
                    lhs.checked_sub(rhs)
                };
                out.ok_or(Error::TimeOutOfRange)
            }
            other => Err(Error::InvalidTimeCondition(format!(
                "cannot evaluate {other} as a time"
            ))),
        }
    }
}

fn parse_timestamp(s: &str) -> Result<i64> {
    let parsed = if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        t.with_timezone(&Utc)
    } else if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        t.and_utc()
    } else if let Some(t) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        t.and_utc()
    } else {
        return Err(Error::InvalidTimeCondition(format!(
            "cannot parse {s:?} as a time"
        )));
    };
    parsed.timestamp_nanos_opt().ok_or(Error::TimeOutOfRange)
}

#[cfg(test)]
mod test {
    use super::*;

    fn y2k() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2000-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn nanos(query: &str) -> Result<u128> {
        parse_time(query, y2k()).map(|d| d.as_nanos())
    }

    #[test]
    fn test_time_range_lengths() {
        let hour = 3_600_000_000_000u128;
        let table = vec![
            ("SELECT x FROM m WHERE time>now()-1h and time<now()-1h", 0),
            (
                "SELECT x FROM m WHERE time>now()-1h-1h and time<now()-1h",
                3_599_999_999_998,
            ),
            ("SELECT x FROM m WHERE time >= now() - 1h", hour),
            ("SELECT x FROM m WHERE now() - 1h <= time", hour),
            ("SELECT x FROM m WHERE time >= :dashboardTime:", hour / 4),
            (
                "SELECT x FROM m WHERE time >= :dashboardTime: AND time <= :upperDashboardTime:",
                hour / 4,
            ),
            (
                "SELECT x FROM m WHERE time >= '1999-12-31 23:00:00' AND time <= '1999-12-31T23:30:00Z'",
                hour / 2,
            ),
            (
                "SELECT x FROM m WHERE time >= '1999-12-31' AND \"host\" = 'a'",
                24 * hour,
            ),
            ("SELECT x FROM m WHERE time >= now() - 2h AND time >= now() - 1h", hour),
            ("SELECT x FROM m WHERE time = now()", 0),
            ("SELECT x FROM m WHERE time < now()", 0),
            ("SELECT x FROM m", 0),
            ("SHOW DATABASES; SELECT x FROM m WHERE time >= now() - 1h", hour),
        ];
        for (query, expect) in table {
            assert_eq!(nanos(query), Ok(expect), "{query}");
        }
    }

    #[test]
    fn test_time_range_errors() {
        assert_eq!(nanos(""), Err(Error::Empty));
        assert_eq!(nanos("SHOW DATABASES"), Err(Error::NoSelect));
        assert!(matches!(
            nanos("SELECT x FROM m WHERE time > now() - 1h OR \"host\" = 'a'"),
            Err(Error::InvalidTimeCondition(_))
        ));
        assert!(matches!(
            nanos("SELECT x FROM m WHERE time > 'yesterday'"),
            Err(Error::InvalidTimeCondition(_))
        ));
    }
}
