use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::exit::{CliError, CliResult, USAGE};

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// One compact line per event.
    Text,
    /// One JSON object per event, fields at the top level.
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for every target, refined by per-crate directives such as
/// `dutylink_frame=trace,dutylink_motor=warn`.
fn build_filter(level: LogLevel, directives: Option<&str>) -> CliResult<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from(level).into());
    builder
        .parse(directives.unwrap_or_default())
        .map_err(|err| CliError::new(USAGE, format!("invalid log filter: {err}")))
}

/// Install the stderr subscriber. Stdout stays reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel, directives: Option<&str>) -> CliResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, directives)?)
        .with_ansi(false)
        .with_target(directives.is_some());

    // A subscriber installed earlier (tests) wins.
    match format {
        LogFormat::Text => {
            let _ = builder.compact().try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().flatten_event(true).try_init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_alone_sets_ceiling() {
        let filter = build_filter(LogLevel::Warn, None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn crate_directive_raises_ceiling() {
        let filter = build_filter(LogLevel::Info, Some("dutylink_frame=trace")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn malformed_directive_is_usage_error() {
        let err = build_filter(LogLevel::Info, Some("dutylink_node=loud")).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
