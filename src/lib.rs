//! # mathematica_mcp logging
//!
//! Process-wide logging for `mathematica_mcp`. The shared logger writes every
//! record from DEBUG upward to a single rotating plain-text file named after
//! the crate, `mathematica_mcp.log`, and starts a new segment whenever the
//! current file reaches 500 MB. The console sink a fresh [`Logger`] starts
//! with is removed, so nothing is written to the terminal.
//!
//! A separate [`Telemetry`] client emits structured JSON records for a hosted
//! dashboard.
//!
//! ## Example
//!
//! ```no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let logger = mathematica_mcp::logger()?;
//!     logger.info("Testing Loguru logging functionality");
//!
//!     // Plain tracing macros reach the same file.
//!     tracing::warn!("This is a warning message");
//!
//!     let telemetry = mathematica_mcp::Telemetry::global();
//!     telemetry.info("Testing Logfire logging functionality");
//!     Ok(())
//! }
//! ```
//!
//! Code that prefers an explicit logging context can build its own
//! [`Logger`] with [`bootstrap_at`] or [`Logger::builder`] and pass it
//! around instead of using the singleton.
use {once_cell::sync::OnceCell, std::path::Path};

mod error;
mod level;
mod logger;
mod rolling;
mod sink;
mod telemetry;

pub use {
    error::LoggerError,
    level::Severity,
    logger::{Logger, LoggerBuilder},
    rolling::{Compression, RollingFile, RollingFileBuilder, RotationSize},
    sink::{ConsoleSink, FileSink, MemorySink, SharedWriter, Sink, SinkId, SinkInfo, SinkKind},
    telemetry::{Telemetry, TelemetryBuilder, TELEMETRY_TARGET},
};

/// Size at which the shared log file starts a new segment.
pub const DEFAULT_ROTATION: RotationSize = RotationSize::MB(500);

/// Minimum severity recorded by the shared log file.
pub const DEFAULT_LEVEL: Severity = Severity::Debug;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// First segment of a module path, e.g. `foo` for `foo::bar`.
pub(crate) fn top_level_name(module_path: &str) -> &str {
    module_path.split("::").next().unwrap_or(module_path)
}

/// Name of the shared log file: the top-level crate name with a `.log`
/// suffix.
pub fn log_file_name() -> String {
    format!("{}.log", top_level_name(module_path!()))
}

/// Build the shared logger configuration writing to `path`: the default
/// console sink removed and a single rotating file sink added in its place.
pub fn bootstrap_at<P: AsRef<Path>>(path: P) -> Result<Logger, LoggerError> {
    let mut logger = Logger::new();
    logger.remove(0)?;
    logger.add(FileSink::new(path).rotation(DEFAULT_ROTATION).level(DEFAULT_LEVEL))?;
    Ok(logger)
}

/// [`bootstrap_at`] the default [`log_file_name`] in the working directory.
pub fn bootstrap() -> Result<Logger, LoggerError> {
    bootstrap_at(log_file_name())
}

/// The process-wide logger, created by [`bootstrap`] on first use.
///
/// The first successful call also installs the logger as the global
/// `tracing` dispatcher. A failure to open the log file is returned to every
/// caller until a later call succeeds; it is never retried in the
/// background.
pub fn logger() -> Result<&'static Logger, LoggerError> {
    LOGGER.get_or_try_init(|| {
        let logger = bootstrap()?;
        if let Err(err) = logger.install_global() {
            logger.warning(&format!("Plain tracing events will not reach this logger: {err}"));
        }
        Ok(logger)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_named_after_the_top_level_crate() {
        assert_eq!(log_file_name(), "mathematica_mcp.log");
        assert_eq!(top_level_name("foo::bar::baz"), "foo");
        assert_eq!(top_level_name("foo"), "foo");
    }

    #[test]
    fn bootstrap_leaves_exactly_one_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(log_file_name());
        let logger = bootstrap_at(&path).unwrap();

        let sinks = logger.sinks();
        assert_eq!(sinks.len(), 1);
        assert_eq!(
            sinks[0].kind,
            SinkKind::File {
                path: path.clone(),
                rotation: RotationSize::MB(500),
            }
        );
        assert_eq!(sinks[0].level, Severity::Debug);
        assert!(path.is_file());
    }

    #[test]
    fn bootstrap_records_debug_and_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = bootstrap_at(&path).unwrap();

        logger.trace("not recorded");
        logger.debug("recorded at debug");
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("not recorded"));
        assert!(contents.contains("DEBUG"));
        assert!(contents.contains("recorded at debug"));
    }

    #[test]
    fn bootstrap_fails_when_the_path_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = bootstrap_at(blocker.join("app.log")).unwrap_err();
        assert!(matches!(
            err,
            LoggerError::CreateDirectoryFailed(..) | LoggerError::CreateFileFailed(..)
        ));
    }
}
