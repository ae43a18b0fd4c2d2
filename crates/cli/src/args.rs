// Command-line arguments and their validation into tasks.

use std::path::PathBuf;

use autocommit_daemon::error::TaskError;
use autocommit_daemon::task::{validate_folder, Interval, Task};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "git-auto-commit",
    version,
    about = "Watch git working folders and commit their changes on a timer",
    after_help = "With no arguments, tasks are loaded from the settings file."
)]
pub struct Cli {
    /// Seconds between commits (values <= 0 mean 30)
    #[arg(value_name = "INTERVAL", allow_negative_numbers = true, requires = "folders")]
    pub interval: Option<i64>,

    /// Repository folders to watch
    #[arg(value_name = "FOLDER")]
    pub folders: Vec<PathBuf>,

    /// Commit message template for command-line tasks; `{DETAILS}` expands to the change log
    #[arg(long, short, value_name = "TEMPLATE", requires = "interval")]
    pub message: Option<String>,

    /// Settings file to load instead of the default location
    #[arg(long, value_name = "FILE", conflicts_with = "interval")]
    pub settings: Option<PathBuf>,

    /// Git executable to use instead of searching for one
    #[arg(long, value_name = "PATH")]
    pub git: Option<PathBuf>,
}

impl Cli {
    /// Tasks named on the command line, or `None` when settings should be
    /// loaded instead. Every folder must exist and be a repository.
    pub fn command_line_tasks(&self) -> Result<Option<Vec<Task>>, TaskError> {
        let Some(secs) = self.interval else {
            return Ok(None);
        };
        let interval = Interval::from_secs(secs);

        self.folders
            .iter()
            .map(|folder| {
                validate_folder(folder)?;
                let mut task = Task::for_folder(folder, interval);
                if let Some(message) = &self.message {
                    task.commit_message = message.clone();
                }
                Ok(task)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}
