use std::time::Duration;

use tickscript::{DeadmanService, Grammar};

use crate::{Error, Result};

/// StubDeadman is the deadman configuration against which generated
/// scripts are validated. It mirrors Kapacitor's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubDeadman;

impl DeadmanService for StubDeadman {
    fn interval(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn threshold(&self) -> f64 {
        0.0
    }

    fn id(&self) -> String {
        "node 'NODE_NAME' in task '{{ .TaskName }}'".to_string()
    }

    fn message(&self) -> String {
        r#"{{ .ID }} is {{ if eq .Level "OK" }}alive{{ else }}dead{{ end }}: {{ index .Fields "emitted" | printf "%0.3f" }} points/INTERVAL."#.to_string()
    }

    fn global(&self) -> bool {
        false
    }
}

/// Format the raw script text, and check that it builds a pipeline.
pub(crate) fn format_and_validate<G: Grammar>(grammar: &G, raw: &str) -> Result<String> {
    let program = grammar.parse(raw).map_err(|err| {
        tracing::error!(%err, "generated TICKscript failed to parse");
        Error::Format(err)
    })?;
    let script = grammar.format(&program);

    if let Err(err) = grammar.build_pipeline(&script, &StubDeadman) {
        tracing::error!(%err, "generated TICKscript failed validation");
        return Err(Error::Validation(err));
    }
    Ok(script)
}
