use influxql::{convert, Error};
use models::{DurationRange, Field, GroupBy, QueryConfig};
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;

fn tags(pairs: &[(&str, &[&str])]) -> models::Tags {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

#[test]
fn test_dashboard_query() {
    let cfg = convert(
        r#"SELECT mean("usage_idle") AS "mean_usage_idle" FROM "telegraf"."autogen"."cpu" WHERE time > now() - 1h AND ("host" = 'server01' OR "host" = 'server02') AND "cpu" = 'cpu-total' GROUP BY time(10m), "host" FILL(previous)"#,
    )
    .unwrap();

    insta::assert_json_snapshot!(cfg, @r###"
    {
      "database": "telegraf",
      "retentionPolicy": "autogen",
      "measurement": "cpu",
      "fields": [
        {
          "value": "mean",
          "type": "func",
          "alias": "mean_usage_idle",
          "args": [
            {
              "value": "usage_idle",
              "type": "field"
            }
          ]
        }
      ],
      "tags": {
        "cpu": [
          "cpu-total"
        ],
        "host": [
          "server01",
          "server02"
        ]
      },
      "groupBy": {
        "time": "10m",
        "tags": [
          "host"
        ]
      },
      "areTagsAccepted": true,
      "fill": "previous",
      "range": {
        "lower": "now() - 1h"
      }
    }
    "###);
}

#[test]
fn test_field_kinds() {
    let cfg = convert(
        r#"SELECT "free", *, /^mem/, PERCENTILE("used", 95), top("used", 3), count(distinct("host")), max(*), derivative(mean("bytes")) FROM mem"#,
    )
    .unwrap();

    assert_eq!(
        cfg.fields,
        vec![
            Field::field("free"),
            Field::wildcard(),
            Field::regex("^mem"),
            Field::func("percentile", vec![Field::field("used"), Field::integer("95")]),
            Field::func("top", vec![Field::field("used"), Field::integer("3")]),
            Field::func(
                "count",
                vec![Field::func("distinct", vec![Field::field("host")])]
            ),
            Field::func("max", vec![Field::wildcard()]),
            Field::func(
                "derivative",
                vec![Field::func("mean", vec![Field::field("bytes")])]
            ),
        ]
    );
    assert_eq!(cfg.measurement, "mem");
    assert_eq!(cfg.database, "");
    assert_eq!(cfg.fill, "");
    assert_eq!(cfg.range, None);
    assert!(!cfg.are_tags_accepted);
}

#[test]
fn test_tags_accepted_classification() {
    let cases = [
        (r#"SELECT x FROM m WHERE "host" = 'a'"#, true),
        (r#"SELECT x FROM m WHERE "host" != 'a'"#, false),
        (r#"SELECT x FROM m WHERE "host" = 'a' AND "cpu" != 'b'"#, false),
        (r#"SELECT x FROM m WHERE "host" != 'a' OR "host" != 'b'"#, false),
        ("SELECT x FROM m", false),
    ];
    for (query, accepted) in cases {
        let cfg = convert(query).unwrap();
        assert!(!cfg.is_raw(), "{query}");
        assert_eq!(cfg.are_tags_accepted, accepted, "{query}");
    }
}

#[test]
fn test_same_key_values_accumulate_in_order() {
    let cfg = convert(
        r#"SELECT x FROM m WHERE "host" = 'c' AND ("host" = 'a' OR "host" = 'b') AND "cpu" = 'z'"#,
    )
    .unwrap();
    assert_eq!(cfg.tags, tags(&[("cpu", &["z"]), ("host", &["c", "a", "b"])]));
}

#[test]
fn test_group_by_and_fill_defaults() {
    let cfg = convert("SELECT mean(x) FROM m GROUP BY time(1h30m)").unwrap();
    assert_eq!(
        cfg.group_by,
        GroupBy {
            time: "1h30m".to_string(),
            tags: Vec::new()
        }
    );
    assert_eq!(cfg.fill, "null");

    let cfg = convert("SELECT mean(x) FROM m GROUP BY host, time(:interval:) FILL(0)").unwrap();
    assert_eq!(
        cfg.group_by,
        GroupBy {
            time: "auto".to_string(),
            tags: vec!["host".to_string()]
        }
    );
    assert_eq!(cfg.fill, "0");

    let cfg = convert("SELECT mean(x) FROM m GROUP BY :interval: FILL(none)").unwrap();
    assert_eq!(cfg.group_by.time, "auto");
    assert_eq!(cfg.fill, "none");

    let cfg = convert("SELECT x FROM m GROUP BY host").unwrap();
    assert_eq!(cfg.fill, "");
}

#[test]
fn test_fill_literals() {
    for (fill, expect) in [
        ("null", "null"),
        ("linear", "linear"),
        ("42", "42"),
        ("1.5", "1.5"),
        ("-2", "-2"),
    ] {
        let cfg = convert(&format!("SELECT mean(x) FROM m GROUP BY time(1m) FILL({fill})")).unwrap();
        assert_eq!(cfg.fill, expect);
    }
    assert_eq!(
        convert("SELECT mean(x) FROM m GROUP BY time(1m) FILL(LINEAR)"),
        Err(Error::InvalidFill("LINEAR".to_string()))
    );
}

#[test]
fn test_time_ranges() {
    let cfg = convert("SELECT x FROM m WHERE time > now() - 1d AND time < now() - 2h").unwrap();
    assert_eq!(
        cfg.range,
        Some(DurationRange {
            lower: "now() - 1d".to_string(),
            upper: "now() - 2h".to_string(),
        })
    );

    let cfg = convert("SELECT x FROM m WHERE time > now() AND time < now()").unwrap();
    assert_eq!(
        cfg.range,
        Some(DurationRange {
            lower: "now()".to_string(),
            upper: "now()".to_string(),
        })
    );

    let cfg = convert(
        "SELECT x FROM m WHERE time > :dashboardTime: AND time < :upperDashboardTime: GROUP BY time(:interval:)",
    )
    .unwrap();
    assert!(!cfg.is_raw());
    assert_eq!(cfg.range, None);
    assert_eq!(cfg.group_by.time, "auto");

    let cfg = convert("SELECT x FROM m WHERE time > now() - 10µ").unwrap();
    assert_eq!(cfg.range.unwrap().lower, "now() - 10µ");
    assert_eq!(
        convert("SELECT x FROM m WHERE time > now() - 1µs"),
        Err(Error::InvalidDuration("1µs".to_string()))
    );
}

#[test]
fn test_fallback_to_raw_text() {
    let queries = [
        "SHOW DATABASES",
        "SELECT x FROM m; SELECT y FROM m",
        "SELECT x INTO n FROM m",
        "SELECT x FROM m, n",
        "SELECT x FROM (SELECT y FROM m)",
        "SELECT x FROM /^m/",
        "SELECT x FROM m ORDER BY time DESC",
        "SELECT x FROM m LIMIT 10",
        "SELECT x FROM m OFFSET 10",
        "SELECT x FROM m SLIMIT 10",
        "SELECT x FROM m SOFFSET 10",
        "SELECT x FROM m TZ('America/Chicago')",
        "SELECT x::float FROM m",
        "SELECT x + 1 FROM m",
        "SELECT holt_winters(x, 10, 4) FROM m",
        "SELECT mean(x) FROM m GROUP BY *",
        "SELECT mean(x) FROM m GROUP BY /ho/",
        "SELECT mean(x) FROM m GROUP BY time(1m, 30s)",
        r#"SELECT x FROM m WHERE ("host" = 'a' OR "cpu" = 'b')"#,
        r#"SELECT x FROM m WHERE "host" = 'a' OR "cpu" = 'b' AND "region" = 'c'"#,
        r#"SELECT x FROM m WHERE "host" =~ /a/"#,
        "SELECT x FROM m WHERE x > 10",
        "SELECT x FROM m WHERE time > now() - 1h - 1h",
        "SELECT x FROM m WHERE time > '2020-01-01T00:00:00Z'",
        "SELECT x FROM m WHERE time > now() - 1h AND time > now() - 2h",
        "SELECT x FROM m WHERE time = now()",
    ];
    for query in queries {
        assert_eq!(convert(query), Ok(QueryConfig::raw(query)), "{query}");
    }
}

#[test]
fn test_syntax_errors() {
    for query in [
        "",
        "SELEC x FROM m",
        "SELECT x FROM",
        "SELECT x FROM m WHERE time > now() - 1x",
        "SELECT x FROM m WHERE host = 'open",
        "SELECT x FROM m GROUP BY time(1m) FILL(sideways)",
    ] {
        assert!(convert(query).is_err(), "{query}");
    }
    assert_eq!(convert("   "), Err(Error::Empty));
}

#[test]
fn test_nesting_limit() {
    let depth = 50_000;
    let query = format!(
        "SELECT x FROM m WHERE {}\"host\" = 'a'{}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    assert!(matches!(
        convert(&query),
        Err(Error::TooDeep { limit: influxql::MAX_DEPTH, .. })
    ));
}

#[quickcheck]
fn convert_is_deterministic(query: String) -> bool {
    convert(&query) == convert(&query)
}

#[quickcheck]
fn convert_of_select_is_deterministic(field: String, value: String) -> bool {
    let query = format!(
        "SELECT {:?} FROM m WHERE \"host\" = '{}' AND \"host\" = 'b'",
        field,
        value.replace('\\', "").replace('\'', "")
    );
    convert(&query) == convert(&query)
}
