//! Blocking zip engine.
//!
//! A [`ZipEngine`] session walks the source directory, adds every selected file
//! as a deflated entry and reports through an [`ArchiveOutcome`]. Problems with
//! individual files are warnings; failures of the zip writer or the output file
//! are errors. The close signal is emitted only after the archive is finished
//! and synced to disk.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, ArchiveWarning, EILSEQ};
use crate::outcome::{ArchiveEvent, ArchiveOutcome};

/// Chooses which files under the source directory become archive entries.
#[derive(Debug, Clone)]
pub struct EntrySelector {
    include: GlobMatcher,
    exclude: Option<GlobMatcher>,
}

impl EntrySelector {
    /// Build a selector from a name pattern and an optional exclude pattern.
    ///
    /// Patterns are matched against `/`-separated paths relative to the source
    /// directory. `*` does not cross directory boundaries; use `**` for that.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Pattern`] if either pattern is not a valid glob.
    pub fn new(name_pattern: &str, exclude_pattern: Option<&str>) -> Result<Self, ArchiveError> {
        let include = compile(name_pattern)?;
        let exclude = exclude_pattern
            .filter(|p| !p.is_empty())
            .map(compile)
            .transpose()?;
        Ok(Self { include, exclude })
    }

    /// Whether the relative path `entry_name` should be archived.
    #[must_use]
    pub fn is_selected(&self, entry_name: &str) -> bool {
        self.include.is_match(entry_name)
            && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(entry_name))
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher, ArchiveError> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Write + Seek adapter that records the furthest byte written.
#[derive(Debug)]
struct TrackedWriter<W> {
    inner: W,
    position: u64,
    pointer: Arc<AtomicU64>,
}

impl<W> TrackedWriter<W> {
    fn new(inner: W, pointer: Arc<AtomicU64>) -> Self {
        Self {
            inner,
            position: 0,
            pointer,
        }
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TrackedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        self.pointer.fetch_max(self.position, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for TrackedWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = self.inner.seek(pos)?;
        Ok(self.position)
    }
}

/// One archiving session over a source directory.
#[derive(Debug)]
pub struct ZipEngine {
    source_dir: PathBuf,
    output_path: PathBuf,
    selector: EntrySelector,
    pointer: Arc<AtomicU64>,
}

impl ZipEngine {
    /// Create a session writing `source_dir`'s selected files to `output_path`.
    #[must_use]
    pub fn new(source_dir: PathBuf, output_path: PathBuf, selector: EntrySelector) -> Self {
        Self {
            source_dir,
            output_path,
            selector,
            pointer: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bytes written to the output stream so far.
    #[must_use]
    pub fn pointer(&self) -> u64 {
        self.pointer.load(Ordering::Relaxed)
    }

    /// Run the session to completion, reporting every signal to `outcome`.
    ///
    /// Stops early once `outcome` has settled.
    pub fn run(&self, outcome: &ArchiveOutcome) {
        let file = match File::create(&self.output_path) {
            Ok(file) => file,
            Err(err) => {
                outcome.handle(ArchiveEvent::Error(err.into()));
                return;
            }
        };
        let writer = TrackedWriter::new(BufWriter::new(file), Arc::clone(&self.pointer));
        let mut zip = ZipWriter::new(writer);

        let entries = match self.append_entries(&mut zip, outcome) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                debug!(output = %self.output_path.display(), "archive session aborted");
                return;
            }
            Err(err) => {
                outcome.handle(ArchiveEvent::Error(err));
                return;
            }
        };

        match finish(zip) {
            Ok(()) => {
                let pointer = self.pointer();
                info!(
                    output = %self.output_path.display(),
                    entries,
                    bytes = pointer,
                    "archive written"
                );
                outcome.handle(ArchiveEvent::Close { pointer });
            }
            Err(err) => {
                outcome.handle(ArchiveEvent::Error(err));
            }
        }
    }

    /// Add all selected files. Returns `None` if the outcome settled mid-way.
    fn append_entries<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        outcome: &ArchiveOutcome,
    ) -> Result<Option<usize>, ArchiveError> {
        let mut entries = 0;

        for entry in WalkDir::new(&self.source_dir)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            if outcome.is_settled() {
                return Ok(None);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    outcome.handle(ArchiveEvent::Warning(walk_warning(&err)));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            // The output file may live inside the source directory.
            if path == self.output_path {
                continue;
            }
            let name = match entry_name(&self.source_dir, path) {
                Some(Ok(name)) => name,
                Some(Err(lossy)) => {
                    if self.selector.is_selected(&lossy) {
                        outcome.handle(ArchiveEvent::Warning(ArchiveWarning::new(
                            EILSEQ,
                            format!("{}: file name is not valid UTF-8", path.display()),
                        )));
                    }
                    continue;
                }
                None => continue,
            };
            if !self.selector.is_selected(&name) {
                continue;
            }

            let mut source = match File::open(path) {
                Ok(source) => source,
                Err(err) => {
                    outcome.handle(ArchiveEvent::Warning(ArchiveWarning::from_io(&err, path)));
                    continue;
                }
            };
            let size = source.metadata()?.len();
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .large_file(size >= u64::from(u32::MAX));

            debug!(entry = %name, size, "adding archive entry");
            zip.start_file(name, options)?;
            io::copy(&mut source, zip)?;
            entries += 1;
        }

        Ok(Some(entries))
    }
}

/// Finish the central directory, flush, and sync the output file to disk.
fn finish(zip: ZipWriter<TrackedWriter<BufWriter<File>>>) -> Result<(), ArchiveError> {
    let tracked = zip.finish()?;
    let file = tracked
        .into_inner()
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    file.sync_all()?;
    Ok(())
}

/// Archive entry name: `/`-separated path relative to the source directory.
///
/// `None` for the root itself. Names that are not valid UTF-8 come back as
/// `Err` with a lossy rendering, which is only fit for pattern matching.
fn entry_name(root: &Path, path: &Path) -> Option<Result<String, String>> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative.components().map(|c| c.as_os_str()).collect();
    if parts.is_empty() {
        return None;
    }
    let exact: Option<Vec<&str>> = parts.iter().map(|p| p.to_str()).collect();
    Some(match exact {
        Some(exact) => Ok(exact.join("/")),
        None => Err(parts
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")),
    })
}

fn walk_warning(err: &walkdir::Error) -> ArchiveWarning {
    let path = err.path().unwrap_or_else(|| Path::new("<unknown>"));
    match err.io_error() {
        Some(io_err) => ArchiveWarning::from_io(io_err, path),
        None => ArchiveWarning::new("ELOOP", err.to_string()),
    }
}
