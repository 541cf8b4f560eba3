//! Generation of Kapacitor TICKscript tasks from AlertRules, and the
//! recovery of AlertRules from the tasks so generated.

use models::AlertRule;
use tickscript::{Grammar, Kapacitor};

mod data;
mod operators;
mod options;
mod outputs;
mod reverse;
mod services;
mod trigger;
mod validate;
mod vars;

pub use data::data;
pub use options::Options;
pub use outputs::{http_out, influx_out};
pub use services::alert_services;
pub use trigger::trigger;
pub use validate::StubDeadman;
pub use vars::vars;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} cannot be an empty string")]
    Empty(&'static str),
    #[error("alert rule has no query")]
    MissingQuery,
    #[error("raw-text queries cannot be compiled into TICKscript")]
    RawQuery,
    #[error("expected exactly one field, found {0}")]
    FieldCount(usize),
    #[error("field {0:?} is neither a field nor a function of one")]
    UnsupportedField(String),
    #[error("function {0:?} has no TICKscript equivalent")]
    UnsupportedFunction(String),
    #[error("{0} trigger requires an operator")]
    MissingOperator(models::TriggerKind),
    #[error("relative trigger requires a change type")]
    MissingChange,
    #[error("invalid {name} duration")]
    InvalidDuration {
        name: &'static str,
        #[source]
        source: influxql::Error,
    },
    #[error(transparent)]
    Model(#[from] models::Error),
    #[error("generated TICKscript failed to format")]
    Format(#[source] tickscript::Error),
    #[error("generated TICKscript failed validation")]
    Validation(#[source] tickscript::Error),
    #[error("failed to parse TICKscript")]
    Parse(#[source] tickscript::Error),
    #[error("TICKscript was not generated from an alert rule: {0}")]
    NotChronoTickscript(String),
    #[error("unsupported pipeline shape at {0}")]
    UnsupportedChain(String),
    #[error("unsupported where filter {0}")]
    UnsupportedWhere(String),
    #[error("unsupported crit expression {0}")]
    UnsupportedCrit(String),
    #[error("unknown alert service method {0:?}")]
    UnknownServiceMethod(String),
    #[error("invalid arguments to {0}")]
    InvalidArgument(String),
    #[error("TICKscript of {size} bytes exceeds the limit of {limit} bytes")]
    ScriptTooLarge { size: usize, limit: usize },
    #[error("invalid name pattern")]
    InvalidNamePattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Generator compiles AlertRules into TICKscript, and back, using a
/// TICKscript Grammar to format and validate scripts.
#[derive(Debug, Clone, Default)]
pub struct Generator<G: Grammar = Kapacitor> {
    grammar: G,
    options: Options,
}

impl Generator {
    pub fn new(options: Options) -> Self {
        Self::with_grammar(Kapacitor, options)
    }
}

impl<G: Grammar> Generator<G> {
    pub fn with_grammar(grammar: G, options: Options) -> Self {
        Self { grammar, options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Generate the formatted and validated TICKscript of `rule`.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %rule.name, trigger = %rule.trigger), err)]
    pub fn generate(&self, rule: &AlertRule) -> Result<String> {
        let raw = [
            vars(rule, &self.options)?,
            data(rule, &self.options)?,
            trigger(rule, &self.options)? + &alert_services(rule, &self.options)?,
            influx_out(rule, &self.options)?,
            http_out(rule, &self.options)?,
        ]
        .join("\n");

        validate::format_and_validate(&self.grammar, &raw)
    }

    /// Recover the AlertRule from which `script` was generated.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub fn reverse(&self, script: &str) -> Result<AlertRule> {
        reverse::reverse(&self.grammar, &self.options, script, None)
    }

    /// Recover the AlertRule of `script`, taking its name from the `name`
    /// capture group (or else the first group, or else the whole match) of
    /// `pattern` matched against the script text. The script's `name`
    /// binding is used if the pattern doesn't match.
    #[tracing::instrument(level = "debug", skip(self, script), err)]
    pub fn targeted_reverse(&self, script: &str, pattern: &str) -> Result<AlertRule> {
        let pattern = regex::Regex::new(pattern)?;
        reverse::reverse(&self.grammar, &self.options, script, Some(&pattern))
    }
}

/// Generate the TICKscript of `rule` with default Options.
pub fn generate(rule: &AlertRule) -> Result<String> {
    Generator::new(Options::default()).generate(rule)
}

/// Recover the AlertRule of a generated `script` with default Options.
pub fn reverse(script: &str) -> Result<AlertRule> {
    Generator::new(Options::default()).reverse(script)
}

/// Recover the AlertRule of `script`, naming it by `pattern`.
pub fn targeted_reverse(script: &str, pattern: &str) -> Result<AlertRule> {
    Generator::new(Options::default()).targeted_reverse(script, pattern)
}
