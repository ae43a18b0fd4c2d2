// git-auto-commit entry point.

use anyhow::{bail, Context};
use autocommit_daemon::app::{locator_for, Application};
use autocommit_daemon::config::SettingsStore;
use autocommit_daemon::task::{HandlerContext, Task};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let tasks = match cli.command_line_tasks() {
        Ok(tasks) => tasks,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(cli, tasks).await
}

async fn run(cli: Cli, tasks: Option<Vec<Task>>) -> anyhow::Result<()> {
    let mut app = match tasks {
        Some(tasks) => {
            let context = HandlerContext::new(locator_for(cli.git.as_deref()));
            Application::from_command_line(tasks, context).await
        }
        None => {
            let store = match cli.settings {
                Some(path) => SettingsStore::at(path),
                None => SettingsStore::resolve().context("failed to locate settings file")?,
            };
            let settings = store.load();
            let git = cli.git.or_else(|| settings.git.clone());
            let context = HandlerContext::new(locator_for(git.as_deref()));
            Application::from_settings(store, settings, context).await
        }
    };

    if app.active_count() == 0 {
        match app.settings_store() {
            Some(store) => bail!("no active tasks in {}", store.path().display()),
            None => bail!("no task could be started"),
        }
    }

    info!(active = app.active_count(), total = app.len(), "running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;

    info!("shutting down");
    app.shutdown();
    Ok(())
}
