use {
    crate::{
        error::LoggerError,
        level::Severity,
        sink::{ConsoleSink, InstalledSink, Sink, SinkId, SinkInfo},
    },
    std::{collections::BTreeMap, io},
    tracing::Dispatch,
    tracing_subscriber::{layer::SubscriberExt, registry::Registry},
};

/// A set of sinks and the `tracing` dispatcher that feeds them.
///
/// A fresh logger writes to stderr through a console sink with id `0`. Remove
/// it and add other sinks to redirect output:
///
/// ```
/// use mathematica_mcp::{Logger, MemorySink, Severity};
///
/// let mut logger = Logger::new();
/// logger.remove(0).unwrap();
/// let sink = MemorySink::new().level(Severity::Info);
/// logger.add(sink.clone()).unwrap();
///
/// logger.debug("filtered out");
/// logger.info("kept");
/// assert_eq!(sink.lines().len(), 1);
/// ```
///
/// Each logger owns its dispatcher; leveled calls are routed to it
/// explicitly, so separate loggers never see each other's records. To make a
/// logger receive plain `tracing` macros as well, install it with
/// [`Logger::install_global`].
pub struct Logger {
    sinks: BTreeMap<SinkId, InstalledSink>,
    next_id: SinkId,
    dispatch: Dispatch,
}

impl Logger {
    /// A logger with the default console sink installed as id `0`.
    pub fn new() -> Self {
        let mut logger = Self::empty();
        logger.insert(InstalledSink::Console {
            level: ConsoleSink::new().level,
        });
        logger
    }

    /// A logger with no sinks at all. Records sent to it go nowhere.
    pub fn empty() -> Self {
        Logger {
            sinks: BTreeMap::new(),
            next_id: 0,
            dispatch: Dispatch::new(Registry::default()),
        }
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Open `sink` and start routing records to it.
    pub fn add(&mut self, sink: impl Into<Sink>) -> Result<SinkId, LoggerError> {
        let installed = InstalledSink::open(sink.into())?;
        Ok(self.insert(installed))
    }

    /// Stop routing records to the sink with this id and close it.
    pub fn remove(&mut self, id: SinkId) -> Result<(), LoggerError> {
        self.sinks.remove(&id).ok_or(LoggerError::UnknownSink(id))?;
        self.rebuild();
        Ok(())
    }

    pub fn remove_all(&mut self) {
        self.sinks.clear();
        self.rebuild();
    }

    /// The installed sinks, ordered by id.
    pub fn sinks(&self) -> Vec<SinkInfo> {
        self.sinks
            .iter()
            .map(|(id, sink)| SinkInfo {
                id: *id,
                kind: sink.kind(),
                level: sink.level(),
            })
            .collect()
    }

    /// The dispatcher backing this logger.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this logger the process-wide default `tracing` dispatcher. Can
    /// succeed only once per process.
    pub fn install_global(&self) -> Result<(), LoggerError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }

    /// Flush synchronous file sinks and wait for pending segment maintenance.
    pub fn flush(&self) -> io::Result<()> {
        self.sinks.values().try_for_each(InstalledSink::flush)
    }

    pub fn log(&self, severity: Severity, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || match severity {
            Severity::Trace => tracing::trace!("{}", message),
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
            Severity::Critical => tracing::error!(critical = true, "{}", message),
        });
    }

    pub fn trace(&self, message: &str) {
        self.log(Severity::Trace, message)
    }

    pub fn debug(&self, message: &str) {
        self.log(Severity::Debug, message)
    }

    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message)
    }

    pub fn warning(&self, message: &str) {
        self.log(Severity::Warning, message)
    }

    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message)
    }

    pub fn critical(&self, message: &str) {
        self.log(Severity::Critical, message)
    }

    fn insert(&mut self, sink: InstalledSink) -> SinkId {
        let id = self.next_id;
        self.next_id += 1;
        self.sinks.insert(id, sink);
        self.rebuild();
        id
    }

    fn rebuild(&mut self) {
        let layers = self.sinks.values().map(InstalledSink::layer).collect::<Vec<_>>();
        self.dispatch = Dispatch::new(Registry::default().with(layers));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("sinks", &self.sinks()).finish()
    }
}

/// Fluent construction of a [`Logger`].
///
/// ```no_run
/// use mathematica_mcp::{FileSink, Logger, RotationSize, Severity};
///
/// let logger = Logger::builder()
///     .remove_default()
///     .sink(FileSink::new("app.log").rotation(RotationSize::MB(500)).level(Severity::Debug))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct LoggerBuilder {
    remove_default: bool,
    sinks: Vec<Sink>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the console sink every logger starts with.
    pub fn remove_default(self) -> Self {
        Self {
            remove_default: true,
            ..self
        }
    }

    pub fn sink(mut self, sink: impl Into<Sink>) -> Self {
        self.sinks.push(sink.into());
        self
    }

    pub fn build(self) -> Result<Logger, LoggerError> {
        let mut logger = Logger::new();
        if self.remove_default {
            logger.remove(0)?;
        }
        for sink in self.sinks {
            logger.add(sink)?;
        }
        Ok(logger)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::sink::{FileSink, MemorySink, SinkKind},
    };

    fn captured(level: Severity) -> (Logger, MemorySink) {
        let sink = MemorySink::new().level(level);
        let logger = Logger::builder().remove_default().sink(sink.clone()).build().unwrap();
        (logger, sink)
    }

    #[test]
    fn new_logger_has_the_console_sink_at_zero() {
        let logger = Logger::new();
        assert_eq!(
            logger.sinks(),
            vec![SinkInfo {
                id: 0,
                kind: SinkKind::Console,
                level: Severity::Debug,
            }]
        );
    }

    #[test]
    fn removing_an_unknown_sink_fails() {
        let mut logger = Logger::new();
        logger.remove(0).unwrap();
        assert!(matches!(logger.remove(0), Err(LoggerError::UnknownSink(0))));
    }

    #[test]
    fn ids_are_not_reused() {
        let mut logger = Logger::new();
        let first = logger.add(MemorySink::new()).unwrap();
        logger.remove(first).unwrap();
        let second = logger.add(MemorySink::new()).unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn info_line_carries_level_and_message() {
        let (logger, sink) = captured(Severity::Debug);
        logger.info("Testing Loguru logging functionality");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("Testing Loguru logging functionality"));
    }

    #[test]
    fn sink_level_filters_lower_severities() {
        let (logger, sink) = captured(Severity::Warning);
        logger.trace("t");
        logger.debug("d");
        logger.info("i");
        logger.warning("w");
        logger.error("e");
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("WARN") && lines[0].ends_with('w'));
        assert!(lines[1].contains("ERROR") && lines[1].ends_with('e'));
    }

    #[test]
    fn critical_is_an_error_marked_critical() {
        let (logger, sink) = captured(Severity::Error);
        logger.critical("meltdown");
        let line = &sink.lines()[0];
        assert!(line.contains("ERROR"));
        assert!(line.contains("meltdown"));
        assert!(line.contains("critical=true"));
    }

    #[test]
    fn critical_sink_ignores_plain_errors() {
        let (logger, sink) = captured(Severity::Critical);
        logger.error("plain error");
        logger.critical("meltdown");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("meltdown"));
        assert!(lines[0].contains("critical=true"));
    }

    #[test]
    fn dispatch_routes_plain_macros_to_the_sinks() {
        let (logger, sink) = captured(Severity::Info);
        tracing::dispatcher::with_default(logger.dispatch(), || {
            tracing::debug!("too low");
            tracing::info!("scoped to this logger");
        });
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("scoped to this logger"));
    }

    #[test]
    fn a_logger_without_sinks_writes_nothing() {
        let watcher = MemorySink::new();
        let mut logger = Logger::builder().sink(watcher.clone()).build().unwrap();
        logger.remove_all();
        logger.info("nobody listens");
        assert!(logger.sinks().is_empty());
        assert!(watcher.is_empty());
    }

    #[test]
    fn loggers_do_not_share_records() {
        let (first, first_sink) = captured(Severity::Trace);
        let (second, second_sink) = captured(Severity::Trace);
        first.info("only in first");
        second.info("only in second");
        assert!(!first_sink.contents().contains("second"));
        assert!(!second_sink.contents().contains("first"));
    }

    #[test]
    fn every_sink_receives_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("both.log");
        let memory = MemorySink::new();
        let logger = Logger::builder()
            .remove_default()
            .sink(memory.clone())
            .sink(FileSink::new(&path))
            .build()
            .unwrap();
        logger.warning("fan out");
        logger.flush().unwrap();
        assert!(memory.contents().contains("fan out"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("fan out"));
    }

    #[test]
    fn enqueued_file_sink_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queued.log");
        let logger = Logger::builder()
            .remove_default()
            .sink(FileSink::new(&path).enqueue(true))
            .build()
            .unwrap();
        logger.info("through the worker");
        drop(logger);
        assert!(std::fs::read_to_string(&path).unwrap().contains("through the worker"));
    }
}
