// Error taxonomy for the auto-commit engine.
//
// Configuration errors are rejected before a handler exists, watcher errors
// abort a single task's activation, runner errors are logged by the scheduler
// and never stop it.

use std::path::PathBuf;

use thiserror::Error;

/// A task definition that cannot be activated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("directory `{}` doesn't exist", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("directory `{}` is not a git repository", .0.display())]
    NotARepository(PathBuf),
}

/// Failure to start observing a directory.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// Failure to bring a task's handler up.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    InvalidTask(#[from] TaskError),

    #[error("failed to watch `{}`: {source}", folder.display())]
    Watch {
        folder: PathBuf,
        #[source]
        source: WatchError,
    },
}

/// Failure to launch the git binary. Non-zero exits are not errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("git executable not found")]
    BinaryNotFound,

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the task list operations of the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no task at index {0}")]
    NoSuchTask(usize),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Settings file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine settings directory")]
    NoSettingsDir,

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
