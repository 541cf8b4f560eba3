use models::{AlertRule, TriggerKind};

use crate::{Options, Result};

/// Write triggered alerts into InfluxDB.
pub fn influx_out(rule: &AlertRule, _options: &Options) -> Result<String> {
    let mut out = String::from("trigger\n");

    // Deadman alerts carry the observed point rate as `emitted`.
    if rule.trigger == TriggerKind::Deadman {
        out.push_str(
            r#"    |eval(lambda: "emitted")
        .as('value')
        .keep('value', messageField, durationField)
"#,
        );
    }
    out.push_str(
        r#"    |eval(lambda: float("value"))
        .as('value')
        .keep()
    |influxDBOut()
        .create()
        .database(outputDB)
        .retentionPolicy(outputRP)
        .measurement(outputMeasurement)
        .tag('alertName', name)
        .tag('triggerType', triggerType)
"#,
    );
    Ok(out)
}

/// Expose triggered alerts over HTTP.
pub fn http_out(_rule: &AlertRule, _options: &Options) -> Result<String> {
    Ok("trigger\n    |httpOut('output')\n".to_string())
}
