use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, warn};

use super::locator::BinaryLocator;
use crate::error::RunnerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Process launch seam. `stdin` is written in full and then closed.
pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        stdin: &str,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        stdin: &str,
    ) -> Result<CommandResult, std::io::Error> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        hide_console_window(&mut command);

        let mut child = command.spawn()?;
        if let Some(mut input) = child.stdin.take() {
            // A command that never reads its input may already have exited.
            match input.write_all(stdin.as_bytes()) {
                Err(error) if error.kind() != ErrorKind::BrokenPipe => return Err(error),
                _ => {}
            }
        }

        let output = child.wait_with_output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(windows)]
fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut Command) {}

/// Runs git inside one task folder.
///
/// Exit codes are not interpreted: a failing `git commit` (for example with
/// nothing to commit) is logged and reported as `Ok`. Only a missing binary
/// or a failed spawn is an error.
#[derive(Debug, Clone)]
pub struct VcsRunner<E = ProcessCommandExecutor> {
    folder: PathBuf,
    locator: Arc<BinaryLocator>,
    executor: E,
}

impl VcsRunner<ProcessCommandExecutor> {
    pub fn new(folder: impl Into<PathBuf>, locator: Arc<BinaryLocator>) -> Self {
        Self { folder: folder.into(), locator, executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> VcsRunner<E> {
    pub fn with_executor(folder: impl Into<PathBuf>, locator: Arc<BinaryLocator>, executor: E) -> Self {
        Self { folder: folder.into(), locator, executor }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// `git add .`
    pub fn stage_all(&self) -> Result<CommandResult, RunnerError> {
        self.run(&["add", "."], "")
    }

    /// `git commit --file=-` with `message` piped through stdin.
    pub fn commit(&self, message: &str) -> Result<CommandResult, RunnerError> {
        self.run(&["commit", "--file=-"], message)
    }

    pub fn run(&self, args: &[&str], stdin: &str) -> Result<CommandResult, RunnerError> {
        let program = self.locator.locate().ok_or(RunnerError::BinaryNotFound)?;
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let command = format!("git {}", args.join(" "));

        debug!(folder = %self.folder.display(), %command, "running git");
        let result = self
            .executor
            .execute(program, &args, &self.folder, stdin)
            .map_err(|source| RunnerError::Spawn { command: command.clone(), source })?;

        if !result.stdout.trim().is_empty() {
            debug!(%command, stdout = %result.stdout.trim_end(), "git output");
        }
        if !result.stderr.trim().is_empty() {
            warn!(folder = %self.folder.display(), %command, stderr = %result.stderr.trim_end(), "git reported errors");
        }
        if !result.success {
            warn!(folder = %self.folder.display(), %command, code = ?result.code, "git exited unsuccessfully");
        }

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Invocation {
        pub program: PathBuf,
        pub args: Vec<String>,
        pub cwd: PathBuf,
        pub stdin: String,
    }

    /// Records every call; either succeeds or fails all of them.
    #[derive(Clone)]
    pub(crate) struct MockExecutor {
        calls: Arc<Mutex<Vec<Invocation>>>,
        fail: bool,
    }

    impl MockExecutor {
        pub(crate) fn succeeding() -> Self {
            Self { calls: Arc::new(Mutex::new(Vec::new())), fail: false }
        }

        pub(crate) fn failing() -> Self {
            Self { calls: Arc::new(Mutex::new(Vec::new())), fail: true }
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().expect("mock calls lock poisoned").clone()
        }
    }

    impl CommandExecutor for MockExecutor {
        fn execute(
            &self,
            program: &Path,
            args: &[String],
            cwd: &Path,
            stdin: &str,
        ) -> Result<CommandResult, std::io::Error> {
            self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
                program: program.to_path_buf(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
                stdin: stdin.to_string(),
            });

            if self.fail {
                return Err(std::io::Error::other("simulated spawn failure"));
            }
            Ok(CommandResult { success: true, code: Some(0), stdout: String::new(), stderr: String::new() })
        }
    }

    pub(crate) fn fixed_locator() -> Arc<BinaryLocator> {
        Arc::new(BinaryLocator::fixed("/usr/bin/git"))
    }
}
