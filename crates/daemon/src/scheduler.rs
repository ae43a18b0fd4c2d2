// Per-task commit loop: on every tick, drain pending changes and run one
// `git add .` + `git commit` cycle on a blocking thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::accumulator::ChangeAccumulator;
use crate::error::RunnerError;
use crate::git::runner::{CommandExecutor, ProcessCommandExecutor, VcsRunner};

/// Message of the cycle run once on activation, before the first tick.
pub const INITIAL_SYNC_MESSAGE: &str = "Synchronizing untracked changes";

/// Replaced by the drained event log when a commit message is rendered.
pub const DETAILS_PLACEHOLDER: &str = "{DETAILS}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Timer armed, waiting for the next tick.
    Idle,
    /// A commit cycle is running; ticks are held back until it ends.
    Flushing,
    Stopped,
}

/// Literal substitution of the placeholder; a template without it is
/// returned unchanged.
pub fn render_commit_message(template: &str, details: &str) -> String {
    template.replace(DETAILS_PLACEHOLDER, details)
}

struct SchedulerInner<E> {
    accumulator: Arc<ChangeAccumulator>,
    runner: VcsRunner<E>,
    template: String,
    state: Mutex<SchedulerState>,
    cycles: AtomicU64,
}

impl<E> SchedulerInner<E> {
    fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Holds the scheduler in `Flushing` for one cycle and puts it back to
/// `Idle` when dropped, however the cycle ended. A stop requested during
/// the cycle wins.
struct FlushGuard<'a> {
    state: &'a Mutex<SchedulerState>,
}

impl<'a> FlushGuard<'a> {
    fn enter(state: &'a Mutex<SchedulerState>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == SchedulerState::Stopped {
            return None;
        }
        *current = SchedulerState::Flushing;
        Some(Self { state })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == SchedulerState::Flushing {
            *current = SchedulerState::Idle;
        }
    }
}

/// Handle to a running commit loop. Dropping it ends the loop after any
/// in-flight cycle.
pub struct CommitScheduler<E = ProcessCommandExecutor> {
    inner: Arc<SchedulerInner<E>>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<E: CommandExecutor + 'static> CommitScheduler<E> {
    /// Run the initial synchronization cycle, then arm the timer so the
    /// first tick lands one full `interval` later.
    pub async fn start(
        interval: Duration,
        template: impl Into<String>,
        accumulator: Arc<ChangeAccumulator>,
        runner: VcsRunner<E>,
    ) -> Self {
        let inner = Arc::new(SchedulerInner {
            accumulator,
            runner,
            template: template.into(),
            state: Mutex::new(SchedulerState::Idle),
            cycles: AtomicU64::new(0),
        });

        info!(folder = %inner.runner.folder().display(), "synchronizing untracked changes");
        run_cycle(&inner, INITIAL_SYNC_MESSAGE.to_string()).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(commit_loop(Arc::clone(&inner), interval, shutdown_rx));
        debug!(
            folder = %inner.runner.folder().display(),
            interval_secs = interval.as_secs_f64(),
            "commit timer armed"
        );

        Self { inner, shutdown_tx, task }
    }
}

impl<E> CommitScheduler<E> {
    /// Prevent further cycles. An in-flight cycle runs to completion.
    pub fn stop(&self) {
        if self.inner.state() != SchedulerState::Stopped {
            self.inner.set_state(SchedulerState::Stopped);
            debug!("commit timer stopped");
        }
        let _ = self.shutdown_tx.send(true);
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.state()
    }

    /// Number of tick cycles that drained changes and ran git.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl<E> Drop for CommitScheduler<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn commit_loop<E: CommandExecutor + 'static>(
    inner: Arc<SchedulerInner<E>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        if inner.accumulator.is_empty() {
            trace!(folder = %inner.runner.folder().display(), "no pending changes");
            continue;
        }

        {
            let Some(_guard) = FlushGuard::enter(&inner.state) else {
                break;
            };

            let drained = inner.accumulator.drain_all();
            for path in &drained.paths {
                info!(folder = %inner.runner.folder().display(), path = %path.display(), "committing change");
            }

            let message = render_commit_message(&inner.template, &drained.details);
            run_cycle(&inner, message).await;
        }

        inner.cycles.fetch_add(1, Ordering::SeqCst);
        ticker.reset();
    }

    debug!(folder = %inner.runner.folder().display(), "commit loop exited");
}

/// `git add .` then `git commit --file=-`. Failures are logged and dropped;
/// the drained changes are not re-queued.
async fn run_cycle<E: CommandExecutor + 'static>(inner: &Arc<SchedulerInner<E>>, message: String) {
    let worker = Arc::clone(inner);
    let outcome = tokio::task::spawn_blocking(move || -> Result<(), RunnerError> {
        worker.runner.stage_all()?;
        worker.runner.commit(&message)?;
        Ok(())
    })
    .await;

    let folder = inner.runner.folder().display();
    match outcome {
        Ok(Ok(())) => debug!(%folder, "commit cycle finished"),
        Ok(Err(e)) => warn!(%folder, error = %e, "commit cycle failed"),
        Err(e) => error!(%folder, error = %e, "commit cycle aborted"),
    }
}
