use crate::{Error, Result};

const NANOSECOND: i64 = 1;
const MICROSECOND: i64 = 1_000 * NANOSECOND;
const MILLISECOND: i64 = 1_000 * MICROSECOND;
const SECOND: i64 = 1_000 * MILLISECOND;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

// Units from largest to smallest, as used when formatting.
const UNITS: &[(&str, i64)] = &[
    ("w", WEEK),
    ("d", DAY),
    ("h", HOUR),
    ("m", MINUTE),
    ("s", SECOND),
    ("ms", MILLISECOND),
    ("u", MICROSECOND),
    ("ns", NANOSECOND),
];

/// Parse a duration literal such as `15m`, `1h30m` or `-10s` into nanoseconds.
pub fn parse_duration(s: &str) -> Result<i64> {
    let invalid = || Error::InvalidDuration(s.to_string());

    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let n: i64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let (unit, len) = if rest.starts_with("ns") {
            (NANOSECOND, 2)
        } else if rest.starts_with("ms") {
            (MILLISECOND, 2)
        } else if rest.starts_with('u') {
            (MICROSECOND, 1)
        } else if rest.starts_with('µ') {
            (MICROSECOND, 'µ'.len_utf8())
        } else if rest.starts_with('s') {
            (SECOND, 1)
        } else if rest.starts_with('m') {
            (MINUTE, 1)
        } else if rest.starts_with('h') {
            (HOUR, 1)
        } else if rest.starts_with('d') {
            (DAY, 1)
        } else if rest.starts_with('w') {
            (WEEK, 1)
        } else {
            return Err(invalid());
        };
        rest = &rest[len..];

        total = n
            .checked_mul(unit)
            .and_then(|n| total.checked_add(n))
            .ok_or_else(invalid)?;
    }

    Ok(if negative { -total } else { total })
}

/// Format nanoseconds as a duration literal using the largest unit which
/// divides it evenly.
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let (suffix, unit) = UNITS
        .iter()
        .find(|(_, unit)| nanos % unit == 0)
        .unwrap_or(&("ns", NANOSECOND));
    format!("{}{suffix}", nanos / unit)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_duration_cases() {
        let table = vec![
            ("1ns", 1),
            ("10u", 10_000),
            ("10µ", 10_000),
            ("15ms", 15_000_000),
            ("1s", SECOND),
            ("15m", 15 * MINUTE),
            ("1h30m", HOUR + 30 * MINUTE),
            ("2d", 2 * DAY),
            ("1w", WEEK),
            ("-10s", -10 * SECOND),
        ];
        for (input, expect) in table {
            assert_eq!(parse_duration(input), Ok(expect), "{input}");
        }
    }

    #[test]
    fn test_parse_duration_errors() {
        for input in ["", "-", "10", "h", "10x", "1h30", "99999999999w"] {
            assert_eq!(
                parse_duration(input),
                Err(Error::InvalidDuration(input.to_string())),
                "{input}"
            );
        }
    }

    #[test]
    fn test_format_duration_cases() {
        let table = vec![
            (0, "0s"),
            (1, "1ns"),
            (1_500, "1500ns"),
            (2 * MILLISECOND, "2ms"),
            (90 * SECOND, "90s"),
            (15 * MINUTE, "15m"),
            (36 * HOUR, "36h"),
            (14 * DAY, "2w"),
            (-HOUR, "-1h"),
        ];
        for (input, expect) in table {
            assert_eq!(format_duration(input), expect);
        }
    }
}
