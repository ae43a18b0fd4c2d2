// Task definitions and the live handler that backs an active task.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accumulator::ChangeAccumulator;
use crate::error::{HandlerError, TaskError};
use crate::git::locator::BinaryLocator;
use crate::git::runner::{CommandExecutor, ProcessCommandExecutor, VcsRunner};
use crate::scheduler::{CommitScheduler, SchedulerState};
use crate::watcher::DirectoryWatcher;
use crate::VCS_DIR_NAME;

pub const DEFAULT_INTERVAL_SECS: u32 = 30;

/// Template for tasks created without an explicit message.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Automatic commit\n\n{DETAILS}";

/// Whole seconds between commit attempts. Anything ≤ 0 normalizes to 30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Interval(u32);

impl Interval {
    /// Choices offered to users editing a task.
    pub const PRESETS: [Interval; 12] = [
        Interval(1),
        Interval(5),
        Interval(10),
        Interval(15),
        Interval(30),
        Interval(60),
        Interval(2 * 60),
        Interval(5 * 60),
        Interval(10 * 60),
        Interval(15 * 60),
        Interval(30 * 60),
        Interval(60 * 60),
    ];

    pub fn from_secs(secs: i64) -> Self {
        if secs <= 0 {
            Self(DEFAULT_INTERVAL_SECS)
        } else {
            Self(u32::try_from(secs).unwrap_or(u32::MAX))
        }
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_SECS)
    }
}

impl From<i64> for Interval {
    fn from(secs: i64) -> Self {
        Self::from_secs(secs)
    }
}

impl From<Interval> for i64 {
    fn from(interval: Interval) -> Self {
        i64::from(interval.0)
    }
}

/// "1 second", "45 seconds", "5 minutes", "2 hours". Larger units truncate.
impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0;
        let (count, unit) = if secs >= 60 * 60 {
            (secs / (60 * 60), "hour")
        } else if secs >= 60 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };
        if count == 1 {
            write!(f, "1 {unit}")
        } else {
            write!(f, "{count} {unit}s")
        }
    }
}

/// One folder bound to an auto-commit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub name: String,
    pub folder: PathBuf,
    #[serde(default)]
    pub interval: Interval,
    /// May contain `{DETAILS}`.
    #[serde(rename = "message", default = "default_commit_message")]
    pub commit_message: String,
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        interval: Interval,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            interval,
            commit_message: commit_message.into(),
        }
    }

    /// A task named after its folder, with the default message.
    pub fn for_folder(folder: impl Into<PathBuf>, interval: Interval) -> Self {
        let folder = folder.into();
        let name = folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());
        Self::new(name, folder, interval, DEFAULT_COMMIT_MESSAGE)
    }

    pub fn is_valid(&self) -> bool {
        validate_folder(&self.folder).is_ok()
    }
}

/// The folder must exist and contain the repository metadata entry.
pub fn validate_folder(folder: &Path) -> Result<(), TaskError> {
    if !folder.is_dir() {
        return Err(TaskError::DirectoryNotFound(folder.to_path_buf()));
    }
    if !folder.join(VCS_DIR_NAME).exists() {
        return Err(TaskError::NotARepository(folder.to_path_buf()));
    }
    Ok(())
}

/// What every handler shares: the cached git location and the process
/// launcher.
#[derive(Debug, Clone)]
pub struct HandlerContext<E = ProcessCommandExecutor> {
    pub locator: Arc<BinaryLocator>,
    pub executor: E,
}

impl HandlerContext<ProcessCommandExecutor> {
    pub fn new(locator: Arc<BinaryLocator>) -> Self {
        Self { locator, executor: ProcessCommandExecutor }
    }
}

impl<E> HandlerContext<E> {
    pub fn with_executor(locator: Arc<BinaryLocator>, executor: E) -> Self {
        Self { locator, executor }
    }
}

/// The running watcher + commit timer pair for one task.
pub struct Handler<E = ProcessCommandExecutor> {
    folder: PathBuf,
    accumulator: Arc<ChangeAccumulator>,
    watcher: DirectoryWatcher,
    scheduler: CommitScheduler<E>,
    active: bool,
}

impl<E: CommandExecutor + Clone + 'static> Handler<E> {
    /// Start watching, run the initial sync, then arm the commit timer.
    ///
    /// The watcher comes up first so a folder that vanished since
    /// validation fails before git is touched.
    pub async fn activate(task: &Task, context: &HandlerContext<E>) -> Result<Self, HandlerError> {
        let accumulator = Arc::new(ChangeAccumulator::new());
        let watcher = DirectoryWatcher::start(&task.folder, Arc::clone(&accumulator))
            .map_err(|source| HandlerError::Watch { folder: task.folder.clone(), source })?;

        let runner = VcsRunner::with_executor(
            &task.folder,
            Arc::clone(&context.locator),
            context.executor.clone(),
        );
        let scheduler = CommitScheduler::start(
            task.interval.as_duration(),
            task.commit_message.clone(),
            Arc::clone(&accumulator),
            runner,
        )
        .await;

        info!(task = %task.name, folder = %task.folder.display(), interval = %task.interval, "task activated");
        Ok(Self { folder: task.folder.clone(), accumulator, watcher, scheduler, active: true })
    }
}

impl<E> Handler<E> {
    /// Stop event delivery and the timer. Safe to call more than once.
    pub fn deactivate(&mut self) {
        self.watcher.stop();
        self.scheduler.stop();
        if self.active {
            self.active = false;
            info!(folder = %self.folder.display(), "task deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn pending_count(&self) -> usize {
        self.accumulator.pending_count()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn cycles(&self) -> u64 {
        self.scheduler.cycles()
    }
}

impl<E> Drop for Handler<E> {
    fn drop(&mut self) {
        if self.active {
            debug!(folder = %self.folder.display(), "dropping active handler");
        }
        self.deactivate();
    }
}
