//! Zip packaging of source directories for Veracode uploads.
//!
//! [`ArchiveBuilder::create_zip_archive`] walks a directory, selects files by glob
//! pattern and writes them into a deflated zip archive in a temporary file of
//! its own. The zip engine runs on the blocking thread pool and reports
//! through an [`ArchiveOutcome`], a settle-once cell joining the engine's warning
//! and error signals with the output file's close signal.
//!
//! # Outcome rules
//!
//! - A warning with code [`ENOENT`] is logged and ignored.
//! - Any other warning, or an engine error, fails the operation.
//! - The output file closing after a full flush completes the operation with
//!   the engine's byte count.
//! - The first terminal signal wins; later signals are ignored.

pub mod builder;
pub mod engine;
pub mod error;
pub mod outcome;

pub use builder::{ArchiveBuilder, ArchiveResult};
pub use error::{ArchiveError, ArchiveWarning, EILSEQ, ENOENT};
pub use outcome::{ArchiveEvent, ArchiveOutcome, OutcomeState};
