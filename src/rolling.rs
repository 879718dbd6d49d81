//! Size-based rotating log file.
//!
//! [`RollingFile`] appends to a single active file and, once that file has
//! grown past its [`RotationSize`], shifts it into a numbered segment:
//!
//! ```text
//! mathematica_mcp.log      <- active file, always at the configured path
//! mathematica_mcp.log.1    <- most recent segment
//! mathematica_mcp.log.2
//! mathematica_mcp.log.3.gz <- older segments, optionally compressed
//! ```
//!
//! Compressing the fresh segment and pruning segments beyond the retention
//! limit happen on a background thread. The next rotation, or an explicit
//! [`Write::flush`], waits for that work before touching the segments again.
use {
    crate::error::LoggerError,
    flate2::write::GzEncoder,
    regex::Regex,
    std::{
        fs::{self, Permissions},
        io::{self, Write},
        path::{Path, PathBuf},
        thread::JoinHandle,
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Size thresholds for rotating log files in various units.
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Rotate after this many bytes.
    Bytes(u64),
    /// Rotate after this many kilobytes.
    KB(u64),
    /// Rotate after this many megabytes.
    MB(u64),
    /// Rotate after this many gigabytes.
    GB(u64),
}

impl RotationSize {
    /// The threshold in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb * 1024,
            RotationSize::MB(mb) => mb * 1024 * 1024,
            RotationSize::GB(gb) => gb * 1024 * 1024 * 1024,
        }
    }
}

/// Compression applied to rotated segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Gzip, written with the `.gz` extension.
    Gzip,
    /// XZ, written with the `.xz` extension. Requires the `xz` feature.
    #[cfg(feature = "xz")]
    XZ,
}

impl Compression {
    fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            #[cfg(feature = "xz")]
            Compression::XZ => "xz",
        }
    }
}

/// Static configuration of a rolling file.
#[derive(Debug, Clone)]
struct RollingMeta {
    path: PathBuf,
    rotation: RotationSize,
    compression: Option<Compression>,
    /// Rotated segments to keep; `None` keeps all of them.
    max_keep_files: Option<u64>,
    /// Unix permission bits for created files.
    file_mode: Option<u32>,
}

/// A log file that rolls over once it reaches a configured size.
pub struct RollingFile {
    meta: RollingMeta,
    writer: fs::File,
    curr_file_size_bytes: u64,
    maintenance: Option<JoinHandle<()>>,
}

impl RollingFile {
    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    /// Size at which the active file rolls over.
    pub fn rotation(&self) -> RotationSize {
        self.meta.rotation
    }

    /// Bytes written to the active file so far, including what was there
    /// when it was opened.
    pub fn current_size(&self) -> u64 {
        self.curr_file_size_bytes
    }

    /// Existing segment paths for this file, most recent first.
    pub fn segments(&self) -> Result<Vec<PathBuf>, LoggerError> {
        Ok(self
            .meta
            .list_segments()?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    fn should_rollover(&self) -> bool {
        self.curr_file_size_bytes >= self.meta.rotation.bytes()
    }

    fn wait_for_maintenance(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            if handle.join().is_err() {
                eprintln!("Segment maintenance for '{}' panicked", self.meta.path.display());
            }
        }
    }

    /// Shift the active file into segment 1 and reopen a fresh one.
    fn rollover(&mut self) -> Result<(), LoggerError> {
        self.wait_for_maintenance();
        self.writer.flush()?;

        // 1. Shift the existing segments up by one, oldest first so nothing is
        // overwritten.
        for (index, source) in self.meta.list_segments()?.into_iter().rev() {
            let target = self.meta.segment_path(index + 1, &source);
            fs::rename(&source, &target).map_err(|err| LoggerError::RenameFileError {
                from: source.clone(),
                to: target.clone(),
                error: err.to_string(),
            })?;
        }

        // 2. Move the active file into the first segment.
        let first_segment = self.meta.segment_base(1);
        fs::rename(&self.meta.path, &first_segment).map_err(|err| LoggerError::RenameFileError {
            from: self.meta.path.clone(),
            to: first_segment.clone(),
            error: err.to_string(),
        })?;

        // 3. Reopen the active path. The old handle stays valid until the new
        // one is in place.
        self.writer = self.meta.create_log_file(&self.meta.path)?;
        self.curr_file_size_bytes = 0;

        // 4. Compress and prune in the background.
        let meta = self.meta.clone();
        self.maintenance = Some(std::thread::spawn(move || {
            if let Err(err) = meta.process_old_logs(&first_segment) {
                eprintln!(
                    "Failed to process old log files for '{}': {}",
                    first_segment.display(),
                    err
                );
            }
        }));
        Ok(())
    }
}

impl RollingMeta {
    /// Uncompressed path of segment `index`.
    fn segment_base(&self, index: u64) -> PathBuf {
        PathBuf::from(format!("{}.{index}", self.path.to_string_lossy()))
    }

    /// Path of segment `index`, keeping the compression extension `existing`
    /// carries, if any.
    fn segment_path(&self, index: u64, existing: &Path) -> PathBuf {
        let base = self.segment_base(index);
        match existing.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.parse::<u64>().is_err() => {
                PathBuf::from(format!("{}.{ext}", base.to_string_lossy()))
            }
            _ => base,
        }
    }

    /// Segments of this file as `(index, path)`, ordered by index.
    fn list_segments(&self) -> Result<Vec<(u64, PathBuf)>, LoggerError> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| LoggerError::InternalError(format!("'{}' has no file name", self.path.display())))?;
        let pattern = Regex::new(&format!(r"^{}\.(\d+)(\.(gz|xz))?$", regex::escape(&filename)))
            .map_err(|err| LoggerError::InternalError(err.to_string()))?;

        let mut segments = Vec::new();
        if !directory.is_dir() {
            return Ok(segments);
        }
        for entry in fs::read_dir(&directory)?.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(captures) = name.to_str().and_then(|name| pattern.captures(name)) else {
                continue;
            };
            if let Ok(index) = captures[1].parse::<u64>() {
                segments.push((index, entry.path()));
            }
        }
        segments.sort_by_key(|(index, _)| *index);
        Ok(segments)
    }

    /// Open `log_path` for appending, creating it and its parent directory
    /// when missing.
    fn create_log_file(&self, log_path: &Path) -> Result<fs::File, LoggerError> {
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);

        let mut res = open_options.open(log_path);
        if res.is_err() {
            if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|err| LoggerError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
                res = open_options.open(log_path);
            }
        }
        let log_file = res.map_err(|err| LoggerError::CreateFileFailed(log_path.to_path_buf(), err.to_string()))?;

        self.set_permissions(log_path)?;
        Ok(log_file)
    }

    fn process_old_logs(&self, segment: &Path) -> Result<(), LoggerError> {
        self.compress(segment)?;

        if let Some(max_keep_files) = self.max_keep_files {
            for (index, path) in self.list_segments()? {
                if index > max_keep_files {
                    if let Err(err) = fs::remove_file(&path) {
                        eprintln!("Failed to remove old log file '{}': {}", path.display(), err);
                    }
                }
            }
        }
        Ok(())
    }

    fn compress(&self, log_path: &Path) -> Result<(), LoggerError> {
        let Some(compression) = &self.compression else {
            return Ok(());
        };
        let infile = fs::File::open(log_path)?;
        let mut reader = io::BufReader::new(infile);

        let compressed_path = PathBuf::from(format!("{}.{}", log_path.to_string_lossy(), compression.extension()));
        let outfile = fs::File::create(&compressed_path)?;
        let writer = io::BufWriter::new(outfile);

        match compression {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            #[cfg(feature = "xz")]
            Compression::XZ => {
                let mut writer = writer;
                lzma_rs::xz_compress(&mut reader, &mut writer)?;
                writer.flush()?;
            }
        }
        self.set_permissions(&compressed_path)?;

        fs::remove_file(log_path)?;
        Ok(())
    }

    /// Apply the configured file mode. Only Unix-like systems honour it.
    fn set_permissions(&self, path: &Path) -> Result<(), LoggerError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|err| {
                    LoggerError::SetFilePermissionsError {
                        path: path.to_path_buf(),
                        error: err.to_string(),
                    }
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = (path, mode);
                eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }
}

/// Fluent configuration for [`RollingFile`].
///
/// Defaults: rotate at 500 MB, no compression, keep every segment, default
/// file permissions.
///
/// ```no_run
/// use mathematica_mcp::{Compression, RollingFileBuilder, RotationSize};
///
/// let file = RollingFileBuilder::new("./logs/app.log")
///     .rotation(RotationSize::MB(100))
///     .max_keep_files(5)
///     .compression(Compression::Gzip)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RollingFileBuilder {
    meta: RollingMeta,
}

impl RollingFileBuilder {
    /// Start configuring a rolling file at `path` with the defaults above.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RollingFileBuilder {
            meta: RollingMeta {
                path: path.as_ref().to_path_buf(),
                rotation: crate::DEFAULT_ROTATION,
                compression: None,
                max_keep_files: None,
                file_mode: None,
            },
        }
    }

    /// Roll over once the active file reaches `rotation`.
    pub fn rotation(self, rotation: RotationSize) -> Self {
        Self {
            meta: RollingMeta { rotation, ..self.meta },
        }
    }

    /// Compress each segment in the background once it is rotated out.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            meta: RollingMeta {
                compression: Some(compression),
                ..self.meta
            },
        }
    }

    /// Keep at most this many rotated segments.
    pub fn max_keep_files(self, max_keep_files: u64) -> Self {
        Self {
            meta: RollingMeta {
                max_keep_files: Some(max_keep_files),
                ..self.meta
            },
        }
    }

    /// File mode bits in octal notation, as with chmod (e.g. 0o644).
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: RollingMeta {
                file_mode: Some(mode),
                ..self.meta
            },
        }
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.meta.path
    }

    /// Open the active file, creating it and its parent directory when
    /// missing. An existing file is appended to and its size counts towards
    /// the first rotation.
    pub fn build(self) -> Result<RollingFile, LoggerError> {
        let writer = self.meta.create_log_file(&self.meta.path)?;
        let curr_file_size_bytes = fs::metadata(&self.meta.path).map_or(0, |m| m.len());
        Ok(RollingFile {
            meta: self.meta,
            writer,
            curr_file_size_bytes,
            maintenance: None,
        })
    }
}

#[allow(clippy::io_other_error)]
impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes = self.writer.write(buf)?;
        self.curr_file_size_bytes += bytes as u64;

        if self.should_rollover() {
            self.rollover()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        }
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.wait_for_maintenance();
        self.writer.flush()
    }
}

impl Drop for RollingFile {
    fn drop(&mut self) {
        self.wait_for_maintenance();
    }
}
