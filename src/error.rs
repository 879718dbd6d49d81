use {crate::sink::SinkId, std::path::PathBuf};

/// Errors that can occur while building or using a logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("File IO error: {0}")]
    FileIOError(#[from] std::io::Error),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("There is no sink with id {0}")]
    UnknownSink(SinkId),
    #[error("Failed to install the global dispatcher: {0}")]
    SetGlobalDefault(#[from] tracing::dispatcher::SetGlobalDefaultError),
    #[error("Internal error: {0}")]
    InternalError(String),
}
