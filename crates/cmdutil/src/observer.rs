//! Per-entry callbacks for the unpackers.
//!
//! An [`EntryObserver`] is consulted twice for each entry that survives path
//! validation:
//!
//! 1. [`before`](EntryObserver::before) runs before size filtering. It can let
//!    the entry through, skip it, or fail the unpack. A failure here is never
//!    suppressed by `ignore_failed`. A skipped entry gets no `after` call.
//! 2. [`after`](EntryObserver::after) receives the outcome of materializing the
//!    entry and returns the outcome the unpacker should act on. Returning
//!    [`Outcome::Failed`] follows the normal `ignore_failed` policy.
//!
//! Entries dropped by component stripping or by the size filter never reach
//! `after`.

use crate::error::UnpackError;
use crate::types::{ArchiveEntry, Outcome};

/// Decision returned by [`EntryObserver::before`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Continue with filtering and materialization
    Proceed,
    /// Move on to the next entry
    Skip,
}

/// Hook points around each archive entry.
pub trait EntryObserver: Send + Sync {
    /// Called before an entry is filtered and written.
    fn before(&self, _entry: &ArchiveEntry) -> Result<Decision, UnpackError> {
        Ok(Decision::Proceed)
    }

    /// Called with the result of writing an entry; may replace it.
    fn after(&self, _entry: &ArchiveEntry, outcome: Outcome) -> Outcome {
        outcome
    }
}

type BeforeFn = dyn Fn(&ArchiveEntry) -> Result<Decision, UnpackError> + Send + Sync;
type AfterFn = dyn Fn(&ArchiveEntry, Outcome) -> Outcome + Send + Sync;

/// Adapts plain closures to [`EntryObserver`].
///
/// ```
/// use cmdutil::observer::{Decision, Hooks};
/// use cmdutil::UnpackOptions;
///
/// let hooks = Hooks::new().before(|entry| {
///     if entry.path.ends_with(".md") {
///         Ok(Decision::Skip)
///     } else {
///         Ok(Decision::Proceed)
///     }
/// });
/// let options = UnpackOptions::new().observer(hooks);
/// # let _ = options;
/// ```
#[derive(Default)]
pub struct Hooks {
    before: Option<Box<BeforeFn>>,
    after: Option<Box<AfterFn>>,
}

impl Hooks {
    /// Creates hooks that do nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the before-entry callback.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&ArchiveEntry) -> Result<Decision, UnpackError> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    /// Sets the after-entry callback.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&ArchiveEntry, Outcome) -> Outcome + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }
}

impl EntryObserver for Hooks {
    fn before(&self, entry: &ArchiveEntry) -> Result<Decision, UnpackError> {
        match &self.before {
            Some(f) => f(entry),
            None => Ok(Decision::Proceed),
        }
    }

    fn after(&self, entry: &ArchiveEntry, outcome: Outcome) -> Outcome {
        match &self.after {
            Some(f) => f(entry, outcome),
            None => outcome,
        }
    }
}

/// Traces every entry and its outcome at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl EntryObserver for LogObserver {
    fn before(&self, entry: &ArchiveEntry) -> Result<Decision, UnpackError> {
        tracing::debug!(path = %entry.path, size = entry.size, kind = ?entry.entry_type, "unpacking entry");
        Ok(Decision::Proceed)
    }

    fn after(&self, entry: &ArchiveEntry, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Written { path, bytes } => {
                tracing::debug!(entry = %entry.path, dest = %path.display(), bytes, "wrote file")
            }
            Outcome::Directory { path } => {
                tracing::debug!(entry = %entry.path, dest = %path.display(), "made directory")
            }
            Outcome::Skipped(reason) => tracing::debug!(entry = %entry.path, ?reason, "skipped"),
            Outcome::Failed(err) => tracing::debug!(entry = %entry.path, %err, "failed"),
        }
        outcome
    }
}
