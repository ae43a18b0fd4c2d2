// End-to-end: a task handler watching a real directory, committing through
// a recording executor and through the real git binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autocommit_daemon::git::locator::BinaryLocator;
use autocommit_daemon::git::runner::{CommandExecutor, CommandResult};
use autocommit_daemon::scheduler::{SchedulerState, INITIAL_SYNC_MESSAGE};
use autocommit_daemon::task::{Handler, HandlerContext, Interval, Task};
use tempfile::TempDir;
use tokio::time::{sleep, Instant};

// ── Recording executor ─────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Call {
    args: Vec<String>,
    cwd: PathBuf,
    stdin: String,
}

#[derive(Clone, Default)]
struct RecordingExecutor {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingExecutor {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(
        &self,
        _program: &Path,
        args: &[String],
        cwd: &Path,
        stdin: &str,
    ) -> Result<CommandResult, std::io::Error> {
        self.calls.lock().expect("calls lock poisoned").push(Call {
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
            stdin: stdin.to_string(),
        });
        Ok(CommandResult { success: true, code: Some(0), stdout: String::new(), stderr: String::new() })
    }
}

async fn wait_for(what: &str, timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn modified_file_produces_exactly_one_commit_cycle() {
    let repo = TempDir::new().expect("tempdir should be created");
    std::fs::create_dir_all(repo.path().join(".git")).expect("metadata dir should be created");
    std::fs::write(repo.path().join("notes.txt"), "first\n").expect("seed file should be written");

    let executor = RecordingExecutor::default();
    let context =
        HandlerContext::with_executor(Arc::new(BinaryLocator::fixed("/usr/bin/git")), executor.clone());
    let task = Task::new("notes", repo.path(), Interval::from_secs(1), "Auto: {DETAILS}");

    let handler = Handler::activate(&task, &context).await.expect("handler should start");

    // Initial synchronization happens during activation.
    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args, vec!["add", "."]);
    assert_eq!(calls[1].args, vec!["commit", "--file=-"]);
    assert_eq!(calls[1].stdin, INITIAL_SYNC_MESSAGE);
    assert!(calls.iter().all(|call| call.cwd == repo.path()));

    sleep(Duration::from_millis(200)).await;
    std::fs::write(repo.path().join("notes.txt"), "second\n").expect("file should be modified");

    wait_for("commit cycle", Duration::from_secs(10), || executor.calls().len() >= 4).await;
    // Another full interval with no changes must not commit again.
    sleep(Duration::from_millis(1500)).await;

    let calls = executor.calls();
    assert_eq!(calls.len(), 4, "calls: {calls:?}");
    assert_eq!(calls[2].args, vec!["add", "."]);
    assert_eq!(calls[3].args, vec!["commit", "--file=-"]);
    assert!(calls[3].stdin.starts_with("Auto: "), "message: {:?}", calls[3].stdin);
    assert!(calls[3].stdin.contains("changed notes.txt"), "message: {:?}", calls[3].stdin);

    assert_eq!(handler.cycles(), 1);
    assert_eq!(handler.scheduler_state(), SchedulerState::Idle);
    assert_eq!(handler.pending_count(), 0);
}

#[tokio::test]
async fn deactivated_handler_ignores_changes() {
    let repo = TempDir::new().expect("tempdir should be created");
    std::fs::create_dir_all(repo.path().join(".git")).expect("metadata dir should be created");

    let executor = RecordingExecutor::default();
    let context =
        HandlerContext::with_executor(Arc::new(BinaryLocator::fixed("/usr/bin/git")), executor.clone());
    let task = Task::new("notes", repo.path(), Interval::from_secs(1), "Auto: {DETAILS}");

    let mut handler = Handler::activate(&task, &context).await.expect("handler should start");
    handler.deactivate();
    handler.deactivate();

    std::fs::write(repo.path().join("late.txt"), "late\n").expect("file should be written");
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(executor.calls().len(), 2);
    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.scheduler_state(), SchedulerState::Stopped);
}

// ── Real git ───────────────────────────────────────────────────────

fn run_git(git: &Path, cwd: &Path, args: &[&str]) -> String {
    let output = Command::new(git).args(args).current_dir(cwd).output().expect("git command should run");
    assert!(
        output.status.success(),
        "git {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8 output")
}

#[tokio::test]
async fn commits_into_a_real_repository() {
    let locator = Arc::new(BinaryLocator::new());
    let Some(git) = locator.locate().map(Path::to_path_buf) else {
        eprintln!("git not found, skipping");
        return;
    };

    let repo = TempDir::new().expect("tempdir should be created");
    run_git(&git, repo.path(), &["init"]);
    run_git(&git, repo.path(), &["config", "user.name", "Auto Commit Bot"]);
    run_git(&git, repo.path(), &["config", "user.email", "auto-commit@example.test"]);
    run_git(&git, repo.path(), &["config", "commit.gpgsign", "false"]);
    std::fs::write(repo.path().join("existing.txt"), "untracked\n").expect("seed file should be written");

    let task = Task::new("repo", repo.path(), Interval::from_secs(1), "Auto: {DETAILS}");
    let handler = Handler::activate(&task, &HandlerContext::new(Arc::clone(&locator)))
        .await
        .expect("handler should start");

    let subjects = run_git(&git, repo.path(), &["log", "--format=%s"]);
    assert!(subjects.contains(INITIAL_SYNC_MESSAGE), "log: {subjects}");

    sleep(Duration::from_millis(200)).await;
    std::fs::write(repo.path().join("fresh.txt"), "new\n").expect("file should be written");

    wait_for("auto commit", Duration::from_secs(10), || {
        run_git(&git, repo.path(), &["log", "-1", "--format=%B"]).contains("fresh.txt")
    })
    .await;

    let last = run_git(&git, repo.path(), &["log", "-1", "--format=%B"]);
    assert!(last.starts_with("Auto: "), "message: {last}");
    let tracked = run_git(&git, repo.path(), &["ls-files"]);
    assert!(tracked.contains("existing.txt"));
    assert!(tracked.contains("fresh.txt"));

    drop(handler);
}
