use std::{path::Path, str::FromStr};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::{errors::Error, Result};

/// Severity filter accepted in `LOG_LEVEL`.
///
/// `http` is kept for compatibility with existing deployments; it maps onto
/// `debug` since tracing has no separate HTTP level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Http,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug | LogLevel::Http => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "http" => Ok(LogLevel::Http),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Config(format!("unknown LOG_LEVEL: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("unknown LOG_FORMAT: {other}"))),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background file writers alive; dropping it flushes them.
#[must_use = "file logging stops when the guard is dropped"]
pub struct LogGuard {
    _workers: Vec<WorkerGuard>,
}

/// Initialize tracing for the bot.
///
/// `RUST_LOG` overrides the configured level when set. With `logs_dir`, JSON
/// records also go to daily-rotated `combined.*.log` and `error.*.log` files.
pub fn init(
    service_name: &str,
    level: LogLevel,
    format: LogFormat,
    logs_dir: Option<&Path>,
) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let lvl = level.directive();
        EnvFilter::new(format!(
            "warn,spb={lvl},spb_core={lvl},spb_telegram={lvl},{service_name}={lvl}"
        ))
    });

    let mut layers = vec![console_layer(format)];
    let mut workers = Vec::new();
    if let Some(dir) = logs_dir {
        let (file_layers, guards) = file_layers(dir)?;
        layers.extend(file_layers);
        workers.extend(guards);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging: {e}")))?;

    Ok(LogGuard { _workers: workers })
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer().with_target(false).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false)
            .boxed(),
    }
}

fn rolling(dir: &Path, prefix: &str, keep: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(keep)
        .build(dir)
        .map_err(|e| Error::Config(format!("cannot write logs to {}: {e}", dir.display())))
}

/// Combined log (every level, 14 days) and error-only log (30 days).
fn file_layers(dir: &Path) -> Result<(Vec<BoxedLayer>, Vec<WorkerGuard>)> {
    let (combined, combined_guard) = tracing_appender::non_blocking(rolling(dir, "combined", 14)?);
    let (errors, errors_guard) = tracing_appender::non_blocking(rolling(dir, "error", 30)?);

    let layers = vec![
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(combined)
            .boxed(),
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(errors)
            .with_filter(LevelFilter::ERROR)
            .boxed(),
    ];
    Ok((layers, vec![combined_guard, errors_guard]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("http".parse::<LogLevel>().unwrap().directive(), "debug");
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn file_logs_split_combined_and_errors() {
        let dir = std::env::temp_dir().join(format!("spb-logs-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (layers, guards) = file_layers(&dir).unwrap();
        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user_id = 1, "Command: /start");
            tracing::error!(user_id = 2, "Unhandled error in pipeline");
        });
        drop(guards);

        let read = |prefix: &str| -> String {
            std::fs::read_dir(&dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
                .map(|e| std::fs::read_to_string(e.path()).unwrap())
                .collect()
        };
        let combined = read("combined");
        let errors = read("error");

        assert!(combined.contains("Command: /start"));
        assert!(combined.contains("Unhandled error in pipeline"));
        assert!(combined.lines().all(|l| l.starts_with('{')));
        assert!(errors.contains("Unhandled error in pipeline"));
        assert!(!errors.contains("Command: /start"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
