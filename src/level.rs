use {
    std::fmt,
    tracing::{level_filters::LevelFilter, Level, Metadata, Subscriber},
    tracing_subscriber::{
        filter::{filter_fn, FilterExt},
        layer::Filter,
    },
};

/// Field that marks an `ERROR` event as [`Severity::Critical`].
pub(crate) const CRITICAL_FIELD: &str = "critical";

/// Severity of a log record, ordered from least to most important.
///
/// * `Trace` - Very detailed diagnostics, off in most sinks
/// * `Debug` - Diagnostics for development; the shared log file's minimum
/// * `Info` - Normal operation
/// * `Warning` - Something unexpected that the process recovered from
/// * `Error` - An operation failed
/// * `Critical` - The process cannot carry on as intended
///
/// `tracing` knows five levels, so two of these collapse when they reach a
/// subscriber: [`Severity::Warning`] becomes `WARN` and
/// [`Severity::Critical`] is emitted at `ERROR` with a `critical = true`
/// field attached. Ordering is still preserved for filtering:
///
/// ```
/// use mathematica_mcp::Severity;
///
/// assert!(Severity::Debug < Severity::Info);
/// assert!(Severity::Error < Severity::Critical);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// The `tracing` level records of this severity are emitted at.
    pub fn as_level(self) -> Level {
        match self {
            Severity::Trace => Level::TRACE,
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warning => Level::WARN,
            Severity::Error | Severity::Critical => Level::ERROR,
        }
    }

    /// The coarsest `tracing` filter admitting this severity and everything
    /// above it. For [`Severity::Critical`] this also admits plain errors;
    /// sinks use [`Severity::admits`] to tell the two apart.
    pub fn as_filter(self) -> LevelFilter {
        LevelFilter::from_level(self.as_level())
    }

    /// Whether a record with this metadata is at or above this severity.
    pub fn admits(self, metadata: &Metadata<'_>) -> bool {
        *metadata.level() <= self.as_level()
            && (self != Severity::Critical || metadata.fields().field(CRITICAL_FIELD).is_some())
    }

    /// Per-layer filter letting this severity and everything above it
    /// through.
    pub(crate) fn layer_filter<S: Subscriber>(self) -> impl Filter<S> + Send + Sync + 'static {
        self.as_filter()
            .and(filter_fn(move |metadata: &Metadata<'_>| self.admits(metadata)))
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
