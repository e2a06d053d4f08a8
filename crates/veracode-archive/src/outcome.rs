//! Settle-once outcome of a single archive operation.
//!
//! The zip engine and the output file report independently: the engine emits
//! warnings and at most one error, the file emits a close once every byte is
//! on disk. [`ArchiveOutcome`] funnels all of them through one state machine
//!
//! ```text
//! Building --close--------------> Completed
//! Building --error/fatal warning-> Failed
//! ```
//!
//! and delivers the first terminal signal to a oneshot receiver. Anything that
//! arrives after that is dropped.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ArchiveError, ArchiveWarning};

/// A signal from the zip engine or its output file.
#[derive(Debug)]
pub enum ArchiveEvent {
    /// A non-terminal problem while collecting entries.
    Warning(ArchiveWarning),
    /// The engine failed.
    Error(ArchiveError),
    /// The output file is flushed and closed; `pointer` is the engine's byte count.
    Close {
        /// Bytes the engine wrote to the output stream.
        pointer: u64,
    },
}

/// Observable state of an [`ArchiveOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeState {
    /// No terminal signal yet.
    Building,
    /// The output file closed first.
    Completed,
    /// A fatal warning or an error arrived first.
    Failed,
}

/// Receiver side of an [`ArchiveOutcome`].
pub type OutcomeReceiver = oneshot::Receiver<Result<u64, ArchiveError>>;

/// Settle-once result cell for one archive operation.
#[derive(Debug)]
pub struct ArchiveOutcome {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: OutcomeState,
    ignored: Vec<ArchiveWarning>,
    tx: Option<oneshot::Sender<Result<u64, ArchiveError>>>,
}

impl ArchiveOutcome {
    /// Create a cell in the `Building` state and the receiver it settles.
    #[must_use]
    pub fn new() -> (Self, OutcomeReceiver) {
        let (tx, rx) = oneshot::channel();
        let outcome = Self {
            inner: Mutex::new(Inner {
                state: OutcomeState::Building,
                ignored: Vec::new(),
                tx: Some(tx),
            }),
        };
        (outcome, rx)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> OutcomeState {
        self.inner.lock().state
    }

    /// Whether a terminal signal has already been accepted.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state() != OutcomeState::Building
    }

    /// Non-fatal warnings logged and skipped so far.
    #[must_use]
    pub fn ignored_warnings(&self) -> Vec<ArchiveWarning> {
        self.inner.lock().ignored.clone()
    }

    /// Feed one signal into the state machine.
    ///
    /// Returns `true` if this signal settled the outcome.
    pub fn handle(&self, event: ArchiveEvent) -> bool {
        match event {
            ArchiveEvent::Warning(warning) if !warning.is_fatal() => {
                warn!(code = %warning.code, message = %warning.message, "ignoring archive warning");
                self.inner.lock().ignored.push(warning);
                false
            }
            ArchiveEvent::Warning(warning) => {
                self.settle(OutcomeState::Failed, Err(ArchiveError::Warning(warning)))
            }
            ArchiveEvent::Error(err) => self.settle(OutcomeState::Failed, Err(err)),
            ArchiveEvent::Close { pointer } => self.settle(OutcomeState::Completed, Ok(pointer)),
        }
    }

    fn settle(&self, state: OutcomeState, result: Result<u64, ArchiveError>) -> bool {
        let mut inner = self.inner.lock();
        let Some(tx) = inner.tx.take() else {
            debug!(ignored = ?result, "archive outcome already settled");
            return false;
        };
        inner.state = state;
        // The receiver may be gone if the caller stopped waiting.
        let _ = tx.send(result);
        true
    }
}
