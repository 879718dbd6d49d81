//! Sink configuration and the writers behind each sink.
use {
    crate::{
        error::LoggerError,
        level::Severity,
        rolling::{Compression, RollingFile, RollingFileBuilder, RotationSize},
    },
    std::{
        io::{self, Write},
        path::{Path, PathBuf},
        sync::{Arc, Mutex, PoisonError},
    },
    tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard},
    tracing_subscriber::{
        fmt::{self, time::ChronoLocal, MakeWriter},
        registry::Registry,
        Layer,
    },
};

/// Identifier handed out by [`Logger::add`](crate::Logger::add).
pub type SinkId = usize;

/// Local time with millisecond precision, e.g. `2025-04-01 19:55:02.113`.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Records an enqueued file sink holds before callers start to wait.
pub(crate) const ENQUEUE_BUFFERED_LINES: usize = 128_000;

pub(crate) type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// What kind of destination a sink writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// Standard error.
    Console,
    /// A rotating file at `path`, rolled over at `rotation`.
    File { path: PathBuf, rotation: RotationSize },
    /// A [`MemorySink`] buffer.
    Memory,
}

/// Snapshot of an installed sink, as returned by
/// [`Logger::sinks`](crate::Logger::sinks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkInfo {
    pub id: SinkId,
    pub kind: SinkKind,
    pub level: Severity,
}

/// A destination to add to a logger.
#[derive(Debug, Clone)]
pub enum Sink {
    Console(ConsoleSink),
    File(FileSink),
    Memory(MemorySink),
}

impl From<ConsoleSink> for Sink {
    fn from(sink: ConsoleSink) -> Self {
        Sink::Console(sink)
    }
}

impl From<FileSink> for Sink {
    fn from(sink: FileSink) -> Self {
        Sink::File(sink)
    }
}

impl From<MemorySink> for Sink {
    fn from(sink: MemorySink) -> Self {
        Sink::Memory(sink)
    }
}

/// Colored output on stderr. Every new logger starts with one of these.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    pub(crate) level: Severity,
}

impl ConsoleSink {
    /// A console sink recording [`Severity::Debug`] and up.
    pub fn new() -> Self {
        ConsoleSink { level: Severity::Debug }
    }

    /// Set the minimum severity written to stderr.
    pub fn level(self, level: Severity) -> Self {
        Self { level }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

/// A rotating plain-text log file.
///
/// Defaults to 500 MB rotation at [`Severity::Debug`], written synchronously.
#[derive(Debug, Clone)]
pub struct FileSink {
    file: RollingFileBuilder,
    level: Severity,
    enqueue: bool,
}

impl FileSink {
    /// Create a file sink writing to `path`.
    /// # Arguments
    /// * `path` - The active log file. Rotated segments are placed next to
    ///   it with a numeric suffix.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileSink {
            file: RollingFileBuilder::new(path),
            level: Severity::Debug,
            enqueue: false,
        }
    }

    /// The active log file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Set the minimum severity written to the file.
    pub fn level(self, level: Severity) -> Self {
        Self { level, ..self }
    }

    /// Set the size at which the file rolls over into a new segment.
    pub fn rotation(self, rotation: RotationSize) -> Self {
        Self {
            file: self.file.rotation(rotation),
            ..self
        }
    }

    /// Compress rotated segments.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            file: self.file.compression(compression),
            ..self
        }
    }

    /// Keep at most this many rotated segments.
    pub fn max_keep_files(self, max_keep_files: u64) -> Self {
        Self {
            file: self.file.max_keep_files(max_keep_files),
            ..self
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            file: self.file.file_mode(mode),
            ..self
        }
    }

    /// Hand records to a background worker instead of writing them on the
    /// calling thread. Pending records are flushed when the logger drops.
    /// Nothing is dropped when the worker falls behind: once
    /// `ENQUEUE_BUFFERED_LINES` records are pending, callers wait.
    pub fn enqueue(self, enqueue: bool) -> Self {
        Self { enqueue, ..self }
    }
}

/// An in-memory capture buffer. Clones share the same buffer.
///
/// ```
/// use mathematica_mcp::{Logger, MemorySink};
///
/// let sink = MemorySink::new();
/// let logger = Logger::builder().remove_default().sink(sink.clone()).build().unwrap();
/// logger.info("captured");
/// assert!(sink.contents().contains("captured"));
/// ```
#[derive(Debug, Clone)]
pub struct MemorySink {
    buffer: SharedWriter<Vec<u8>>,
    level: Severity,
}

impl MemorySink {
    /// An empty buffer capturing every severity.
    pub fn new() -> Self {
        MemorySink {
            buffer: SharedWriter::new(Vec::new()),
            level: Severity::Trace,
        }
    }

    /// Set the minimum severity captured.
    pub fn level(self, level: Severity) -> Self {
        Self { level, ..self }
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        self.buffer.with(|buf| String::from_utf8_lossy(buf).into_owned())
    }

    /// Captured lines without their terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.with(|buf| buf.is_empty())
    }

    pub fn clear(&self) {
        self.buffer.with(|buf| buf.clear())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MakeWriter<'a> for MemorySink {
    type Writer = SharedWriter<Vec<u8>>;

    fn make_writer(&'a self) -> Self::Writer {
        self.buffer.clone()
    }
}

/// A writer shared between threads behind a mutex.
///
/// A poisoned lock is taken over rather than propagated; a panic while
/// logging must not silence the sink for the rest of the process.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> SharedWriter<W> {
    pub fn new(inner: W) -> Self {
        SharedWriter {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        SharedWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> std::fmt::Debug for SharedWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWriter").finish_non_exhaustive()
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|w| w.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.with(|w| w.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|w| w.flush())
    }
}

impl<'a, W: Write + 'a> MakeWriter<'a> for SharedWriter<W> {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A sink after it has been opened, holding whatever is needed to rebuild
/// its layer.
pub(crate) enum InstalledSink {
    Console {
        level: Severity,
    },
    File {
        path: PathBuf,
        rotation: RotationSize,
        level: Severity,
        writer: SharedWriter<RollingFile>,
    },
    Enqueued {
        path: PathBuf,
        rotation: RotationSize,
        level: Severity,
        writer: NonBlocking,
        _guard: WorkerGuard,
    },
    Memory(MemorySink),
}

impl InstalledSink {
    /// Open the sink's destination.
    pub(crate) fn open(sink: Sink) -> Result<Self, LoggerError> {
        Ok(match sink {
            Sink::Console(console) => InstalledSink::Console { level: console.level },
            Sink::File(file) => {
                let path = file.path().to_path_buf();
                let rolling = file.file.build()?;
                let rotation = rolling.rotation();
                if file.enqueue {
                    let (writer, guard) = enqueued(rolling, ENQUEUE_BUFFERED_LINES);
                    InstalledSink::Enqueued {
                        path,
                        rotation,
                        level: file.level,
                        writer,
                        _guard: guard,
                    }
                } else {
                    InstalledSink::File {
                        path,
                        rotation,
                        level: file.level,
                        writer: SharedWriter::new(rolling),
                    }
                }
            }
            Sink::Memory(memory) => InstalledSink::Memory(memory),
        })
    }

    pub(crate) fn kind(&self) -> SinkKind {
        match self {
            InstalledSink::Console { .. } => SinkKind::Console,
            InstalledSink::File { path, rotation, .. } | InstalledSink::Enqueued { path, rotation, .. } => {
                SinkKind::File {
                    path: path.clone(),
                    rotation: *rotation,
                }
            }
            InstalledSink::Memory(_) => SinkKind::Memory,
        }
    }

    pub(crate) fn level(&self) -> Severity {
        match self {
            InstalledSink::Console { level }
            | InstalledSink::File { level, .. }
            | InstalledSink::Enqueued { level, .. } => *level,
            InstalledSink::Memory(memory) => memory.level,
        }
    }

    pub(crate) fn layer(&self) -> BoxedLayer {
        match self {
            InstalledSink::Console { level } => text_layer(io::stderr, *level, true),
            InstalledSink::File { level, writer, .. } => text_layer(writer.clone(), *level, false),
            InstalledSink::Enqueued { level, writer, .. } => text_layer(writer.clone(), *level, false),
            InstalledSink::Memory(memory) => text_layer(memory.clone(), memory.level, false),
        }
    }

    pub(crate) fn flush(&self) -> io::Result<()> {
        match self {
            InstalledSink::File { writer, .. } => writer.with(|w| w.flush()),
            _ => Ok(()),
        }
    }
}

/// A background writer that blocks instead of dropping records once
/// `buffered_lines` are pending.
fn enqueued(rolling: RollingFile, buffered_lines: usize) -> (NonBlocking, WorkerGuard) {
    NonBlockingBuilder::default()
        .lossy(false)
        .buffered_lines_limit(buffered_lines)
        .thread_name("mathematica_mcp-log-writer")
        .finish(rolling)
}

fn text_layer<W>(writer: W, level: Severity, ansi: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_level(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(level.layer_filter())
        .boxed()
}
