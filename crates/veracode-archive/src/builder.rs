//! Async entry point for packaging a directory into a zip archive.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::engine::{EntrySelector, ZipEngine};
use crate::error::ArchiveError;
use crate::outcome::ArchiveOutcome;

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    /// Where the archive was written.
    pub path: PathBuf,
    /// Final size in bytes, as reported by the engine when the file closed.
    pub size_bytes: u64,
}

/// Packages source directories into zip archives.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    output_path: Option<PathBuf>,
}

impl ArchiveBuilder {
    /// Create a builder writing each archive to its own temporary file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every archive to an explicit path instead of a fresh temporary file.
    ///
    /// Concurrent operations on a builder with a fixed path write the same file.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// File name prefix of default archives for `source_dir`.
    ///
    /// The prefix is stable per directory so stray archives can be traced back
    /// to their source; each operation appends its own random suffix.
    #[must_use]
    pub fn default_prefix(source_dir: &Path) -> String {
        let digest = Sha256::digest(source_dir.to_string_lossy().as_bytes());
        format!("veracode-{}-", &hex::encode(digest)[..16])
    }

    /// Reserve a fresh archive file in the temporary directory.
    fn reserve_default_path(source_dir: &Path) -> Result<PathBuf, ArchiveError> {
        let path = tempfile::Builder::new()
            .prefix(&Self::default_prefix(source_dir))
            .suffix(".zip")
            .tempfile()?
            .into_temp_path()
            .keep()
            .map_err(io::Error::from)?;
        Ok(path)
    }

    /// Zip every file under `source_dir` matching `name_pattern` and not
    /// matching `exclude_pattern`.
    ///
    /// Patterns use glob syntax relative to `source_dir` (`**/*.jar`). On
    /// failure the partial archive is removed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if `source_dir` is not a directory, a pattern is
    /// invalid, the engine raises a fatal warning, or writing fails.
    pub async fn create_zip_archive(
        &self,
        source_dir: impl AsRef<Path>,
        name_pattern: &str,
        exclude_pattern: Option<&str>,
    ) -> Result<ArchiveResult, ArchiveError> {
        let source_dir = tokio::fs::canonicalize(source_dir.as_ref()).await?;
        if !tokio::fs::metadata(&source_dir).await?.is_dir() {
            return Err(ArchiveError::NotADirectory(source_dir));
        }

        let selector = EntrySelector::new(name_pattern, exclude_pattern)?;
        let output_path = match &self.output_path {
            Some(path) => path.clone(),
            None => Self::reserve_default_path(&source_dir)?,
        };

        debug!(
            source = %source_dir.display(),
            output = %output_path.display(),
            name_pattern,
            exclude_pattern,
            "creating zip archive"
        );

        let engine = ZipEngine::new(source_dir, output_path.clone(), selector);
        let (outcome, rx) = ArchiveOutcome::new();
        let outcome = Arc::new(outcome);

        let session = {
            let outcome = Arc::clone(&outcome);
            tokio::task::spawn_blocking(move || engine.run(&outcome))
        };

        let settled = rx
            .await
            .map_err(|_| ArchiveError::Interrupted("outcome dropped before settling".to_owned()));
        // Let the session wind down before touching the output file.
        if let Err(err) = session.await {
            warn!(error = %err, "archive session did not finish cleanly");
        }

        let ignored = outcome.ignored_warnings().len();
        if ignored > 0 {
            debug!(ignored, "archive finished with ignored warnings");
        }

        match settled.and_then(|result| result) {
            Ok(size_bytes) => Ok(ArchiveResult {
                path: output_path,
                size_bytes,
            }),
            Err(err) => {
                remove_partial(&output_path).await;
                Err(err)
            }
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial archive"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove partial archive"),
    }
}
