use anyhow::Context;
use clap::Parser;
use kapacitor::{Generator, Options};
use std::io::{self, Read, Write};

/// tickctl compiles Chronograf alert rules between InfluxQL queries, alert
/// rule documents and Kapacitor TICKscripts.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Args {
    #[clap(long, global = true, default_value = "warn", env = "TICKCTL_LOG")]
    pub log: String,

    /// Path to a YAML or JSON file of generation options. Run the `spec`
    /// subcommand to see the JSON schema of the options file.
    #[clap(long = "config-file", global = true, env = "TICKCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Convert an InfluxQL SELECT into its JSON query configuration.
    Convert {
        #[clap(long)]
        query: String,
    },
    /// Print the length, in nanoseconds, of the time range of an InfluxQL query.
    ParseTime {
        #[clap(long)]
        query: String,
        /// RFC 3339 timestamp of the present. Defaults to the current time.
        #[clap(long)]
        now: Option<String>,
    },
    /// Generate the TICKscript of a JSON alert rule.
    Generate {
        /// Path to the alert rule, or '-' for stdin.
        #[clap(long, default_value = "-")]
        rule: String,
    },
    /// Recover the JSON alert rule of a generated TICKscript.
    Reverse {
        /// Path to the TICKscript, or '-' for stdin.
        #[clap(long, default_value = "-")]
        script: String,
        /// Regex naming the rule by its `name` capture group.
        #[clap(long = "name-pattern")]
        name_pattern: Option<String>,
    },
    /// Print a TICKscript in canonical form.
    Format {
        /// Path to the TICKscript, or '-' for stdin.
        #[clap(long, default_value = "-")]
        script: String,
    },
    /// Prints a JSON schema of the options file.
    Spec,
}

fn main() {
    let args = Args::parse();

    // Logs are written to stderr in jsonl format, with fields flattened
    // into the top-level of each event.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(args.log.as_str())
        .json()
        .flatten_event(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .init();

    run(args).or_bail("tickctl failed");
}

fn run(args: Args) -> anyhow::Result<()> {
    let options = match &args.config_file {
        Some(path) => load_options(path)?,
        None => Options::default(),
    };
    let generator = Generator::new(options);
    let mut stdout = io::stdout().lock();

    match args.command {
        Command::Convert { query } => {
            let config = influxql::convert(&query).context("failed to convert query")?;
            serde_json::to_writer_pretty(&mut stdout, &config)?;
            writeln!(stdout)?;
        }
        Command::ParseTime { query, now } => {
            let now = match now {
                Some(now) => chrono::DateTime::parse_from_rfc3339(&now)
                    .context("--now is not an RFC 3339 timestamp")?
                    .with_timezone(&chrono::Utc),
                None => chrono::Utc::now(),
            };
            let range = influxql::parse_time(&query, now).context("failed to parse time range")?;
            writeln!(stdout, "{}", range.as_nanos())?;
        }
        Command::Generate { rule } => {
            let rule: models::AlertRule = serde_json::from_str(&read_input(&rule)?)
                .context("failed to parse alert rule")?;
            let script = generator
                .generate(&rule)
                .with_context(|| format!("failed to generate TICKscript of {:?}", rule.name))?;
            stdout.write_all(script.as_bytes())?;
        }
        Command::Reverse {
            script,
            name_pattern,
        } => {
            let script = read_input(&script)?;
            let rule = match name_pattern {
                Some(pattern) => generator.targeted_reverse(&script, &pattern),
                None => generator.reverse(&script),
            }
            .context("failed to reverse TICKscript")?;
            serde_json::to_writer_pretty(&mut stdout, &rule)?;
            writeln!(stdout)?;
        }
        Command::Format { script } => {
            let formatted = format_script(generator.options(), &read_input(&script)?)?;
            stdout.write_all(formatted.as_bytes())?;
        }
        Command::Spec => {
            let schema = schemars::schema_for!(Options);
            serde_json::to_writer_pretty(&mut stdout, &schema)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn format_script(options: &Options, script: &str) -> anyhow::Result<String> {
    if script.len() > options.max_script_bytes {
        return Err(kapacitor::Error::ScriptTooLarge {
            size: script.len(),
            limit: options.max_script_bytes,
        }
        .into());
    }
    let program = tickscript::parse(script).context("failed to parse TICKscript")?;
    Ok(tickscript::format(&program))
}

// YAML is a superset of JSON, so either is accepted.
fn load_options(path: &str) -> anyhow::Result<Options> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {path}"))?;
    let options = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse options file {path}"))?;
    tracing::debug!(?options, "loaded options");
    Ok(options)
}

fn read_input(path: &str) -> anyhow::Result<String> {
    let mut content = String::new();
    if path == "-" {
        io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
    } else {
        content = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    }
    Ok(content)
}

trait Must<T> {
    fn or_bail(self, message: &str) -> T;
}

impl<T> Must<T> for anyhow::Result<T> {
    fn or_bail(self, message: &str) -> T {
        match self {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error_details = ?e, message);
                tracing::error!(error = %format!("{e:#}"), message);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tickctl",
            "reverse",
            "--script",
            "task.tick",
            "--name-pattern",
            "rule: (?P<name>.*)",
            "--log",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.log, "debug");
        assert!(matches!(
            args.command,
            Command::Reverse { script, name_pattern: Some(_) } if script == "task.tick"
        ));
    }

    #[test]
    fn test_format_script_size_limit() {
        let options = Options {
            max_script_bytes: 16,
            ..Default::default()
        };
        assert_eq!(format_script(&options, "var x  =  1").unwrap(), "var x = 1\n");

        let err = format_script(&options, "var x = 'a long string'").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<kapacitor::Error>(),
            Some(kapacitor::Error::ScriptTooLarge { size: 23, limit: 16 })
        ));
    }

    #[test]
    fn test_args_are_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
