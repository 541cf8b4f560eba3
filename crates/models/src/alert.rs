use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AlertNodes, Error, QueryConfig};

/// TriggerKind is the condition under which an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Fire when the value crosses a fixed level.
    #[default]
    Threshold,
    /// Fire when the value changes by some amount relative to its past.
    Relative,
    /// Fire when data stops arriving.
    Deadman,
}

impl TriggerKind {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerKind::Threshold => "threshold",
            TriggerKind::Relative => "relative",
            TriggerKind::Deadman => "deadman",
        }
    }

    pub fn all() -> &'static [TriggerKind] {
        &[
            TriggerKind::Threshold,
            TriggerKind::Relative,
            TriggerKind::Deadman,
        ]
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKind::all()
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| Error::UnknownTrigger(s.to_string()))
    }
}

/// Operator compares a trigger's value against its configured level(s).
/// Names are the spellings used by editing interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "greater than")]
    Greater,
    #[serde(rename = "less than")]
    Less,
    #[serde(rename = "equal to or less than")]
    LessEqual,
    #[serde(rename = "equal to or greater")]
    GreaterEqual,
    #[serde(rename = "equal to")]
    Equal,
    #[serde(rename = "not equal to")]
    NotEqual,
    #[serde(rename = "inside range")]
    InsideRange,
    #[serde(rename = "outside range")]
    OutsideRange,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Greater => "greater than",
            Operator::Less => "less than",
            Operator::LessEqual => "equal to or less than",
            Operator::GreaterEqual => "equal to or greater",
            Operator::Equal => "equal to",
            Operator::NotEqual => "not equal to",
            Operator::InsideRange => "inside range",
            Operator::OutsideRange => "outside range",
        }
    }

    pub fn all() -> &'static [Operator] {
        &[
            Operator::Greater,
            Operator::Less,
            Operator::LessEqual,
            Operator::GreaterEqual,
            Operator::Equal,
            Operator::NotEqual,
            Operator::InsideRange,
            Operator::OutsideRange,
        ]
    }

    /// Range operators compare against both `value` and `range_value`.
    pub fn is_range(&self) -> bool {
        matches!(self, Operator::InsideRange | Operator::OutsideRange)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::all()
            .iter()
            .find(|op| op.name() == s)
            .copied()
            .ok_or_else(|| Error::UnknownOperator(s.to_string()))
    }
}

/// Change is how a relative trigger measures the difference from the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Change {
    #[serde(rename = "% change")]
    Percent,
    #[serde(rename = "change")]
    Amount,
}

impl Change {
    pub fn name(&self) -> &'static str {
        match self {
            Change::Percent => "% change",
            Change::Amount => "change",
        }
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Change {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Change::Percent, Change::Amount]
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::UnknownChange(s.to_string()))
    }
}

/// TriggerValues parameterize the trigger. Numeric levels and durations
/// are held as their literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub range_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Change>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shift: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub period: String,
}

/// DBRP is a (database, retention policy) pair scoping a task's data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DBRP {
    pub db: String,
    pub rp: String,
}

/// AlertRule is the editable representation of an alerting task.
///
/// `status`, `task_type`, `executing`, `error` and the timestamps are
/// reported by the server running the task. They pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub trigger: TriggerKind,
    pub trigger_values: TriggerValues,
    pub every: String,
    pub message: String,
    pub details: String,
    pub alert_nodes: AlertNodes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfig>,
    #[serde(rename = "tickscript")]
    pub tick_script: String,
    pub dbrps: Vec<DBRP>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub task_type: String,
    pub executing: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_enabled: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_enum_names_parse_back() {
        for kind in TriggerKind::all() {
            assert_eq!(kind.name().parse::<TriggerKind>().unwrap(), *kind);
        }
        for op in Operator::all() {
            assert_eq!(op.name().parse::<Operator>().unwrap(), *op);
            // Serde spellings must agree with `name()`.
            assert_eq!(
                serde_json::to_value(op).unwrap(),
                serde_json::Value::String(op.name().to_string())
            );
        }
        assert_eq!("% change".parse::<Change>().unwrap(), Change::Percent);
        assert_eq!("change".parse::<Change>().unwrap(), Change::Amount);
    }

    #[test]
    fn test_unknown_names_are_errors() {
        assert_eq!(
            "invalid".parse::<TriggerKind>(),
            Err(Error::UnknownTrigger("invalid".to_string()))
        );
        assert_eq!(
            "greater".parse::<Operator>(),
            Err(Error::UnknownOperator("greater".to_string()))
        );
        assert_eq!(
            "%".parse::<Change>(),
            Err(Error::UnknownChange("%".to_string()))
        );
        assert!(serde_json::from_str::<AlertRule>(r#"{"trigger": "invalid"}"#).is_err());
    }

    #[test]
    fn test_rule_json_shape() {
        let created = DateTime::parse_from_rfc3339("2023-04-05T06:07:08Z")
            .unwrap()
            .with_timezone(&Utc);

        let rule = AlertRule {
            id: "rule-1".to_string(),
            name: "cpu high".to_string(),
            trigger: TriggerKind::Relative,
            trigger_values: TriggerValues {
                operator: Some(Operator::Greater),
                value: "10".to_string(),
                change: Some(Change::Percent),
                shift: "1m".to_string(),
                ..Default::default()
            },
            every: "30s".to_string(),
            tick_script: "stream".to_string(),
            dbrps: vec![DBRP {
                db: "telegraf".to_string(),
                rp: "autogen".to_string(),
            }],
            status: "enabled".to_string(),
            task_type: "stream".to_string(),
            executing: true,
            created: Some(created),
            ..Default::default()
        };

        insta::assert_json_snapshot!(rule, @r###"
        {
          "id": "rule-1",
          "name": "cpu high",
          "trigger": "relative",
          "triggerValues": {
            "operator": "greater than",
            "value": "10",
            "change": "% change",
            "shift": "1m"
          },
          "every": "30s",
          "message": "",
          "details": "",
          "alertNodes": {
            "stateChangesOnly": false
          },
          "tickscript": "stream",
          "dbrps": [
            {
              "db": "telegraf",
              "rp": "autogen"
            }
          ],
          "status": "enabled",
          "type": "stream",
          "executing": true,
          "created": "2023-04-05T06:07:08Z"
        }
        "###);

        let back: AlertRule = serde_json::from_value(serde_json::to_value(&rule).unwrap()).unwrap();
        pretty_assertions::assert_eq!(back, rule);
    }
}
