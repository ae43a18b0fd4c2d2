// autocommit-daemon library: watch folders, collect changes, commit them
// on a timer through the git CLI.

pub mod accumulator;
pub mod app;
pub mod config;
pub mod error;
pub mod git;
pub mod scheduler;
pub mod task;
pub mod watcher;

/// Repository metadata entry; also the prefix of names the watcher ignores.
pub const VCS_DIR_NAME: &str = ".git";

pub use accumulator::ChangeAccumulator;
pub use app::Application;
pub use config::{Settings, SettingsStore};
pub use git::locator::BinaryLocator;
pub use git::runner::{CommandExecutor, CommandResult, ProcessCommandExecutor, VcsRunner};
pub use scheduler::{CommitScheduler, SchedulerState};
pub use task::{Handler, HandlerContext, Interval, Task};
pub use watcher::DirectoryWatcher;
