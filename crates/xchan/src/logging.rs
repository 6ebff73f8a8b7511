use std::fmt;

use clap::ValueEnum;
use tracing::span::EnteredSpan;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
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

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Whether this process drives a group or was launched as one of its children.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessRole {
    Local,
    Remote,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Local => f.write_str("local"),
            ProcessRole::Remote => f.write_str("remote"),
        }
    }
}

/// Install the stderr subscriber and enter the root span for `role`.
///
/// The returned guard must live for the rest of `main`.
pub fn init_logging(format: LogFormat, level: LogLevel, role: ProcessRole) -> EnteredSpan {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }

    tracing::error_span!("xchan", role = %role, pid = std::process::id()).entered()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display() {
        assert_eq!(ProcessRole::Local.to_string(), "local");
        assert_eq!(ProcessRole::Remote.to_string(), "remote");
    }
}
