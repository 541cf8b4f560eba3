use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag keys mapped to the values they're compared against, in first-seen order.
pub type Tags = BTreeMap<String, Vec<String>>;

/// FieldKind discriminates the ways a selected field (or function argument) was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Field,
    Func,
    Number,
    Integer,
    Wildcard,
    Regex,
}

/// Field is a single projection of a SELECT, or an argument of a function projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Field {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alias: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Field>,
}

impl Field {
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Field)
    }
    pub fn func(name: impl Into<String>, args: Vec<Field>) -> Self {
        Self {
            args,
            ..Self::new(name, FieldKind::Func)
        }
    }
    pub fn integer(text: impl Into<String>) -> Self {
        Self::new(text, FieldKind::Integer)
    }
    pub fn number(text: impl Into<String>) -> Self {
        Self::new(text, FieldKind::Number)
    }
    pub fn wildcard() -> Self {
        Self::new("*", FieldKind::Wildcard)
    }
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(pattern, FieldKind::Regex)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    fn new(value: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            value: value.into(),
            kind,
            alias: String::new(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupBy {
    /// Duration literal of the `time()` dimension, "auto" for the
    /// `:interval:` dashboard template, or empty if not grouped by time.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// DurationRange holds time bounds as unresolved expressions, like `now() - 1h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DurationRange {
    pub lower: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upper: String,
}

/// QueryConfig is the structured form of a single InfluxQL SELECT.
///
/// A query which cannot be fully represented is held only as `raw_text`,
/// with every structured field left at its zero value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub retention_policy: String,
    #[serde(default)]
    pub measurement: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub are_tags_accepted: bool,
    #[serde(default)]
    pub fill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DurationRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl QueryConfig {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            raw_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_raw(&self) -> bool {
        self.raw_text.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_raw_config_is_otherwise_empty() {
        let cfg = QueryConfig::raw("SHOW DATABASES");
        assert!(cfg.is_raw());
        assert_eq!(
            cfg,
            QueryConfig {
                raw_text: Some("SHOW DATABASES".to_string()),
                ..Default::default()
            }
        );
        assert!(!QueryConfig::default().is_raw());
    }

    #[test]
    fn test_query_config_json_shape() {
        let mut cfg = QueryConfig {
            database: "telegraf".to_string(),
            retention_policy: "autogen".to_string(),
            measurement: "cpu".to_string(),
            fields: vec![
                Field::func("mean", vec![Field::field("usage_idle")]).with_alias("m"),
                Field::wildcard(),
            ],
            group_by: GroupBy {
                time: "5m".to_string(),
                tags: vec!["host".to_string()],
            },
            are_tags_accepted: true,
            fill: "null".to_string(),
            range: Some(DurationRange {
                lower: "now() - 1h".to_string(),
                upper: String::new(),
            }),
            ..Default::default()
        };
        cfg.tags
            .insert("host".to_string(), vec!["b".to_string(), "a".to_string()]);

        insta::assert_json_snapshot!(cfg, @r###"
        {
          "database": "telegraf",
          "retentionPolicy": "autogen",
          "measurement": "cpu",
          "fields": [
            {
              "value": "mean",
              "type": "func",
              "alias": "m",
              "args": [
                {
                  "value": "usage_idle",
                  "type": "field"
                }
              ]
            },
            {
              "value": "*",
              "type": "wildcard"
            }
          ],
          "tags": {
            "host": [
              "b",
              "a"
            ]
          },
          "groupBy": {
            "time": "5m",
            "tags": [
              "host"
            ]
          },
          "areTagsAccepted": true,
          "fill": "null",
          "range": {
            "lower": "now() - 1h"
          }
        }
        "###);

        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: QueryConfig = serde_yaml::from_str(&yaml).unwrap();
        pretty_assertions::assert_eq!(back, cfg);
    }
}
