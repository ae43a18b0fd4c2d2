// notify event → change events, with noise filtering and rename pairing.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tracing::trace;

use crate::VCS_DIR_NAME;

const TEMP_FILE_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed { from: PathBuf },
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Changed => "changed",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed { .. } => "renamed",
        }
    }
}

/// One qualifying filesystem change. `path` is the affected (new) path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self { kind, path: path.into() }
    }

    /// The log line for this change, with paths relative to `root`.
    pub fn describe(&self, root: &Path) -> String {
        match &self.kind {
            ChangeKind::Renamed { from } => {
                format!("{} renamed to {}", relative(from, root), relative(&self.path, root))
            }
            kind => format!("{} {}", kind.label(), relative(&self.path, root)),
        }
    }
}

/// What the watcher stores for one translated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Store the path and its log line.
    Change(ChangeEvent),
    /// Store the path now; its log line follows once the rename resolves.
    PathOnly(PathBuf),
    /// Log line for a path already stored through [`Record::PathOnly`].
    LineOnly(ChangeEvent),
}

impl Record {
    pub fn path(&self) -> &Path {
        match self {
            Record::Change(change) | Record::LineOnly(change) => &change.path,
            Record::PathOnly(path) => path,
        }
    }
}

/// `path` with the `root` prefix and any leading separators removed. A path
/// outside `root` is treated as already relative.
pub fn relative(path: &Path, root: &Path) -> String {
    let stripped = path.strip_prefix(root).unwrap_or(path);
    stripped.to_string_lossy().trim_start_matches(['/', '\\']).to_string()
}

/// Names under the repository metadata folder (and anything else starting
/// with its name) and temp files never reach the accumulator.
pub fn is_ignored(relative_name: &str) -> bool {
    relative_name.is_empty()
        || relative_name.starts_with(VCS_DIR_NAME)
        || relative_name.ends_with(TEMP_FILE_SUFFIX)
}

struct HeldRename {
    tracker: Option<usize>,
    path: PathBuf,
}

/// Stateful translator for one watched root.
///
/// Backends report renames differently: inotify sends `From`, `To` and then
/// `Both`; Windows sends `From` and `To`; FSEvents sends `Any` per path. A
/// `From` is held until its `To` arrives; a `Both` repeating the rename just
/// reported is dropped. A `From` that never pairs was moved out of the tree
/// and is reported as deleted once any other event shows up.
pub struct EventTranslator {
    root: PathBuf,
    held_from: Option<HeldRename>,
    last_rename: Option<(PathBuf, PathBuf)>,
}

impl EventTranslator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), held_from: None, last_rename: None }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn translate(&mut self, event: &Event) -> Vec<Record> {
        let mut changes = Vec::new();

        match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.last_rename = None;
                self.flush_held(&mut changes);
                if let Some(path) = event.paths.first() {
                    changes.push(Record::PathOnly(path.clone()));
                    self.held_from =
                        Some(HeldRename { tracker: event.tracker(), path: path.clone() });
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.last_rename = None;
                if let Some(to) = event.paths.first() {
                    match self.held_from.take() {
                        Some(held) if held.tracker == event.tracker() => {
                            self.push_rename(held.path, to.clone(), &mut changes);
                        }
                        other => {
                            self.held_from = other;
                            self.flush_held(&mut changes);
                            changes.push(Record::Change(ChangeEvent::new(
                                ChangeKind::Created,
                                to.clone(),
                            )));
                        }
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to, ..] = event.paths.as_slice() {
                    let repeat = self.last_rename.take();
                    if repeat.as_ref().is_some_and(|(f, t)| f == from && t == to) {
                        trace!(from = %from.display(), to = %to.display(), "rename already reported");
                    } else {
                        if self.held_from.as_ref().is_some_and(|held| &held.path == from) {
                            self.held_from = None;
                        }
                        self.flush_held(&mut changes);
                        self.push_rename(from.clone(), to.clone(), &mut changes);
                    }
                }
            }
            other => {
                self.last_rename = None;
                self.flush_held(&mut changes);
                match plain_kind(other) {
                    Some(kind) => changes.extend(event.paths.iter().map(|path| {
                        Record::Change(ChangeEvent::new(kind.clone(), path.clone()))
                    })),
                    None => trace!(kind = ?other, "skipping non-content event"),
                }
            }
        }

        changes.retain(|record| {
            let name = relative(record.path(), &self.root);
            if is_ignored(&name) {
                trace!(%name, "ignoring change");
                false
            } else {
                true
            }
        });
        changes
    }

    fn push_rename(&mut self, from: PathBuf, to: PathBuf, changes: &mut Vec<Record>) {
        self.last_rename = Some((from.clone(), to.clone()));
        changes.push(Record::Change(ChangeEvent::new(ChangeKind::Renamed { from }, to)));
    }

    fn flush_held(&mut self, changes: &mut Vec<Record>) {
        if let Some(held) = self.held_from.take() {
            changes.push(Record::LineOnly(ChangeEvent::new(ChangeKind::Deleted, held.path)));
        }
    }
}

fn plain_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Changed),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}
