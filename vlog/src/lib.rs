#![deny(unused_crate_dependencies)]

//! A set of logging macros that print not only timestamp and log level,
//! but also file name and line.
//!
//! They behave just like usual tracing::warn, tracing::info, etc.
//! For warn and error macros we are adding file and line to tracing variables.
//!
//! The level and the format (`plain` or `json`) of the logs in `stderr` are
//! passed in by the caller, `RUST_LOG` directives take precedence over the level.
//!
//! Full documentation for the `tracing` crate here <https://docs.rs/tracing/>
//!
//! Integration with sentry for catching errors and react on them immediately
//! <https://docs.sentry.io/platforms/rust/>

use std::{fmt, str::FromStr};

use sentry::{types::Dsn, ClientInitGuard};
use std::backtrace::Backtrace;
use tracing_subscriber::{
    filter::LevelFilter, fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub use tracing as __tracing;
pub use tracing::{debug, info, trace};

/// Emit a warning with the call site attached.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::__tracing::warn!(file = file!(), line = line!(), $($arg)+)
    };
}

/// Emit an error with the call site attached.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::__tracing::error!(file = file!(), line = line!(), $($arg)+)
    };
}

/// Errors of parsing the logging configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Error {
    #[error("failed to parse log level ({0})")]
    UnknownLevel(String),

    #[error("unknown log format ({0}), expected `plain` or `json`")]
    UnknownFormat(String),
}

/// Log verbosity accepted on the command line.
///
/// `fatal` and `panic` have no `tracing` counterpart and are both
/// treated as `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "panic" => Ok(Self::Panic),
            _ => Err(Error::UnknownLevel(s.to_string())),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => LevelFilter::ERROR,
        }
    }
}

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => f.write_str("plain"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy()
}

/// Initialize logging with tracing and set up log format
///
/// If a sentry URL is provided and parses as a DSN, this function will also initialize sentry.
/// Returns a sentry client guard. The full description can be found in the official documentation:
/// <https://docs.sentry.io/platforms/rust/#configure>
#[must_use]
pub fn init(level: LogLevel, format: LogFormat, sentry_url: Option<&str>) -> Option<ClientInitGuard> {
    match format {
        LogFormat::Plain => {
            tracing_subscriber::registry()
                .with(Layer::default().with_writer(std::io::stderr))
                .with(env_filter(level))
                .init();
        }
        LogFormat::Json => {
            let timer = tracing_subscriber::fmt::time::UtcTime::rfc_3339();
            // must be set before sentry hook for sentry to function
            install_pretty_panic_hook();

            tracing_subscriber::registry()
                .with(
                    Layer::default()
                        .with_writer(std::io::stderr)
                        .with_file(true)
                        .with_line_number(true)
                        .with_timer(timer)
                        .json(),
                )
                .with(env_filter(level))
                .init();
        }
    }

    let dsn = sentry_url.and_then(|url| match Dsn::from_str(url) {
        Ok(dsn) => Some(dsn),
        Err(e) => {
            tracing::warn!("ignoring malformed sentry url: {e}");
            None
        }
    })?;

    let options = sentry::ClientOptions {
        release: sentry::release_name!(),
        attach_stacktrace: true,
        ..Default::default()
    };

    Some(sentry::init((dsn, options)))
}

/// Format panics like tracing::error
fn install_pretty_panic_hook() {
    // Replaces the default hook instead of chaining it, otherwise every
    // panic is reported twice.
    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = Backtrace::capture();
        let timestamp = chrono::Utc::now();
        let panic_message = if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s
        } else {
            "Panic occurred without additional info"
        };

        let panic_location = panic_info
            .location()
            .map(|val| val.to_string())
            .unwrap_or_else(|| "Unknown location".to_owned());

        eprintln!(
            "{}",
            serde_json::json!({
                "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string(),
                "level": "CRITICAL",
                "fields": {
                    "message": panic_message,
                    "location": panic_location,
                    "backtrace": backtrace.to_string(),
                }
            })
        );
    }));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_every_documented_level() {
        let levels = ["trace", "debug", "info", "warn", "error", "fatal", "panic"];

        let filters: Vec<_> = levels
            .iter()
            .map(|l| LevelFilter::from(l.parse::<LogLevel>().unwrap()))
            .collect();

        assert_eq!(
            filters,
            vec![
                LevelFilter::TRACE,
                LevelFilter::DEBUG,
                LevelFilter::INFO,
                LevelFilter::WARN,
                LevelFilter::ERROR,
                LevelFilter::ERROR,
                LevelFilter::ERROR,
            ]
        );
    }

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
    }

    #[test]
    fn rejects_unknown_level() {
        assert_eq!(
            "verbose".parse::<LogLevel>(),
            Err(Error::UnknownLevel("verbose".to_string()))
        );
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("plain".parse::<LogFormat>(), Ok(LogFormat::Plain));
        assert!("xml".parse::<LogFormat>().is_err());
    }
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn warn_and_error_attach_call_site() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            crate::warn!("collector slow");
            crate::error!("collector down");
            crate::info!("collector up");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 3, "{output}");
        for line in &lines[..2] {
            assert!(line.contains(file!()), "{line}");
            assert!(line.contains("line="), "{line}");
        }
        assert!(!lines[2].contains("line="), "{}", lines[2]);
    }
}
