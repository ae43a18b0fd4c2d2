// Pending-change set shared by a task's watcher (writer) and scheduler (drainer).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use dashmap::DashSet;

/// Everything collected since the previous drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    pub paths: BTreeSet<PathBuf>,
    /// Newline-terminated event lines, in arrival order.
    pub details: String,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Distinct affected paths plus a human-readable log of events.
///
/// `add` may be called from the notify thread while the scheduler drains.
/// `add` is not lock-free: the path set locks one shard per insert and the
/// log is guarded by a mutex held only for one append or one take. A writer
/// therefore waits at most for one such operation, never on git or a tick.
#[derive(Debug, Default)]
pub struct ChangeAccumulator {
    paths: DashSet<PathBuf>,
    details: Mutex<String>,
}

impl ChangeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` and append `line` unless the log already ends with it.
    pub fn add(&self, path: impl Into<PathBuf>, line: &str) {
        self.mark(path);
        self.note(line);
    }

    /// Record `path` without a log line.
    pub fn mark(&self, path: impl Into<PathBuf>) {
        self.paths.insert(path.into());
    }

    /// Append `line` to the log without recording a path. The line alone
    /// never makes the accumulator non-empty.
    pub fn note(&self, line: &str) {
        let entry = format!("{line}\n");
        let mut details = self.details.lock().unwrap_or_else(PoisonError::into_inner);
        if !details.ends_with(&entry) {
            details.push_str(&entry);
        }
    }

    /// Take every pending path and the whole log, leaving both empty.
    ///
    /// Each removed path is returned by exactly one drain; a path added while
    /// the drain runs lands either in this result or in the next one.
    pub fn drain_all(&self) -> Drained {
        let snapshot: Vec<PathBuf> = self.paths.iter().map(|path| path.key().clone()).collect();
        let paths = snapshot.into_iter().filter_map(|path| self.paths.remove(&path)).collect();

        let details =
            std::mem::take(&mut *self.details.lock().unwrap_or_else(PoisonError::into_inner));

        Drained { paths, details }
    }

    pub fn pending_count(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}
