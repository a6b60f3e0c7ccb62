//! Logging setup with a reloadable filter.
//!
//! Embedders call [`init_logging`] once at startup. The returned
//! [`LoggingHandle`] changes the filter at runtime; the optional
//! `WorkerGuard` flushes the file writer and must be kept alive.

use std::path::PathBuf;

use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

use crate::utils::fs;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "restream=info";

/// File name prefix of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "restream.log";

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Options for [`init_logging`].
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Filter directive. Falls back to `RUST_LOG`, then to
    /// [`DEFAULT_LOG_FILTER`].
    pub filter: Option<String>,
    /// Also write daily rotated log files into this directory.
    pub log_dir: Option<PathBuf>,
    /// Colored console output.
    pub ansi: bool,
}

impl LoggingOptions {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn initial_filter(&self) -> crate::Result<EnvFilter> {
        match &self.filter {
            Some(directive) => parse_filter(directive),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
        }
    }
}

fn parse_filter(directive: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| crate::Error::config(format!("Invalid filter directive: {}", e)))
}

/// Handle to the installed subscriber.
pub struct LoggingHandle {
    handle: FilterHandle,
}

impl LoggingHandle {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Set a new filter directive, e.g. `restream=debug`.
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = parse_filter(directive)?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }
}

/// Install the global subscriber.
///
/// Fails if the filter is invalid, the log directory can't be created or a
/// global subscriber is already installed.
pub fn init_logging(options: LoggingOptions) -> crate::Result<(LoggingHandle, Option<WorkerGuard>)> {
    let (filter_layer, filter_handle) = reload::Layer::new(options.initial_filter()?);

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            fs::create_dir_all("creating log directory", dir)?;

            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(options.ansi).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok((
        LoggingHandle {
            handle: filter_handle,
        },
        guard,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("restream=info"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let options = LoggingOptions::default().with_filter("restream=verbose");
        assert!(options.initial_filter().is_err());
    }

    #[test]
    fn test_explicit_filter() {
        let options = LoggingOptions::default().with_filter("restream=debug");
        let filter = options.initial_filter().unwrap();
        assert_eq!(filter.to_string(), "restream=debug");
    }
}
