//! Archive warnings and errors.

use std::io;
use std::path::{Path, PathBuf};

/// Warning code for a file that disappeared while the archive was being built.
pub const ENOENT: &str = "ENOENT";

/// Warning code for a file whose name cannot be stored as a UTF-8 entry name.
pub const EILSEQ: &str = "EILSEQ";

/// A warning raised by the zip engine while collecting entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("archive warning {code}: {message}")]
pub struct ArchiveWarning {
    /// Machine-readable code, e.g. `ENOENT`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl ArchiveWarning {
    /// Create a warning with an explicit code.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify an I/O failure on `path` into a warning code.
    #[must_use]
    pub fn from_io(err: &io::Error, path: &Path) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => ENOENT.to_owned(),
            io::ErrorKind::PermissionDenied => "EACCES".to_owned(),
            kind => format!("{kind:?}"),
        };
        Self::new(code, format!("{}: {err}", path.display()))
    }

    /// Whether this warning aborts the archive operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.code != ENOENT
    }
}

/// Errors that fail an archive operation.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The engine raised a warning that is not on the ignorable list.
    #[error(transparent)]
    Warning(#[from] ArchiveWarning),

    /// The zip writer failed.
    #[error("zip engine error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Reading a source file or writing the archive failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    /// A name or exclude pattern is not a valid glob.
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The source path is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The engine stopped without reporting a terminal event.
    #[error("archive engine stopped unexpectedly: {0}")]
    Interrupted(String),
}
