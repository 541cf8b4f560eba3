use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Options of TICKscript generation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Options {
    /// Database into which triggered alerts are written.
    pub output_database: String,
    /// Retention policy into which triggered alerts are written.
    pub output_retention_policy: String,
    /// Measurement into which triggered alerts are written.
    pub output_measurement: String,
    /// Name of the tag holding the alert ID.
    pub id_tag: String,
    /// Name of the tag holding the alert level.
    pub level_tag: String,
    /// Name of the field holding the alert message.
    pub message_field: String,
    /// Name of the field holding the alert duration.
    pub duration_field: String,
    /// Scripts larger than this many bytes are rejected before parsing.
    pub max_script_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output_database: "chronograf".to_string(),
            output_retention_policy: "autogen".to_string(),
            output_measurement: "alerts".to_string(),
            id_tag: "alertID".to_string(),
            level_tag: "level".to_string(),
            message_field: "message".to_string(),
            duration_field: "duration".to_string(),
            max_script_bytes: 1 << 20,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_options_use_defaults() {
        let options: Options =
            serde_json::from_str(r#"{"outputDatabase": "alerting", "maxScriptBytes": 512}"#)
                .unwrap();

        insta::assert_json_snapshot!(options, @r###"
        {
          "outputDatabase": "alerting",
          "outputRetentionPolicy": "autogen",
          "outputMeasurement": "alerts",
          "idTag": "alertID",
          "levelTag": "level",
          "messageField": "message",
          "durationField": "duration",
          "maxScriptBytes": 512
        }
        "###);
        assert!(serde_json::from_str::<Options>(r#"{"colour": "red"}"#).is_err());
    }
}
