use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Module targets are only worth printing when parser internals are logged.
    fn shows_targets(self) -> bool {
        self >= LogLevel::Debug
    }
}

/// Route library `tracing` events to stderr; stdout carries decoded messages.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(level.shows_targets());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LogLevel::Warn.as_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
    }

    #[test]
    fn targets_only_at_debug_and_below() {
        assert!(!LogLevel::Info.shows_targets());
        assert!(LogLevel::Debug.shows_targets());
        assert!(LogLevel::Trace.shows_targets());
    }
}
