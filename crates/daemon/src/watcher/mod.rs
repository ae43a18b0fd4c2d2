// Folder watcher: inotify/fsevents/ReadDirectoryChangesW → translate → accumulator.
// Events are handled on notify's own thread; nothing here touches the runtime.

pub mod translate;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, trace};

use crate::accumulator::ChangeAccumulator;
use crate::error::WatchError;
use translate::{EventTranslator, Record};

/// Recursive watch over one task folder, feeding a [`ChangeAccumulator`].
///
/// Once [`stop`](Self::stop) returns no further change reaches the
/// accumulator: the callback checks a shared flag before recording, and the
/// OS watch is released.
pub struct DirectoryWatcher {
    root: PathBuf,
    enabled: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
}

impl DirectoryWatcher {
    /// Start watching `root` recursively. Changes are recorded with their
    /// path and a one-line description relative to the (canonical) root.
    pub fn start(root: &Path, accumulator: Arc<ChangeAccumulator>) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::DirectoryNotFound(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| WatchError::DirectoryNotFound(root.to_path_buf()))?;

        let enabled = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&enabled);
        let mut translator = EventTranslator::new(root.clone());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if !flag.load(Ordering::Acquire) {
                return;
            }
            match res {
                Ok(event) => {
                    for record in translator.translate(&event) {
                        match record {
                            Record::Change(change) => {
                                let line = change.describe(translator.root());
                                trace!(%line, "recording change");
                                accumulator.add(change.path, &line);
                            }
                            Record::PathOnly(path) => {
                                trace!(path = %path.display(), "recording moved path");
                                accumulator.mark(path);
                            }
                            // Dropped when the path was already committed without it.
                            Record::LineOnly(change) => {
                                if accumulator.contains(&change.path) {
                                    accumulator.note(&change.describe(translator.root()));
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "file watcher error");
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(path = %root.display(), "watching folder");

        Ok(Self { root, enabled, watcher: Some(watcher) })
    }

    /// The canonicalized root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop delivering events. Safe to call more than once.
    pub fn stop(&mut self) {
        self.enabled.store(false, Ordering::Release);
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            debug!(path = %self.root.display(), "stopped watching folder");
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
