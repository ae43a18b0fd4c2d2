// Application: the ordered task list and the settings interface outer
// surfaces (CLI today, an editor UI later) use to change it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{Settings, SettingsStore};
use crate::error::{AppError, HandlerError};
use crate::git::locator::BinaryLocator;
use crate::git::runner::{CommandExecutor, ProcessCommandExecutor};
use crate::task::{validate_folder, Handler, HandlerContext, Task};

/// Pinned locator when an explicit binary is configured, probing otherwise.
pub fn locator_for(git: Option<&Path>) -> Arc<BinaryLocator> {
    match git {
        Some(path) => Arc::new(BinaryLocator::fixed(path)),
        None => Arc::new(BinaryLocator::new()),
    }
}

struct TaskEntry<E> {
    task: Task,
    handler: Option<Handler<E>>,
}

/// Every configured task and the handler running it, if any.
///
/// Settings-driven applications persist changes through their
/// [`SettingsStore`]; command-line-driven ones never write settings.
pub struct Application<E = ProcessCommandExecutor> {
    entries: Vec<TaskEntry<E>>,
    context: HandlerContext<E>,
    store: Option<SettingsStore>,
    git: Option<PathBuf>,
}

impl<E: CommandExecutor + Clone + 'static> Application<E> {
    /// Activate every task from `settings`. A task that cannot start is
    /// logged and kept in the list without a handler.
    pub async fn from_settings(
        store: SettingsStore,
        settings: Settings,
        context: HandlerContext<E>,
    ) -> Self {
        let mut app = Self { entries: Vec::new(), context, store: Some(store), git: settings.git };
        for task in settings.tasks {
            app.push_and_activate(task).await;
        }
        app
    }

    /// Activate tasks built from command-line arguments.
    pub async fn from_command_line(tasks: Vec<Task>, context: HandlerContext<E>) -> Self {
        let mut app = Self { entries: Vec::new(), context, store: None, git: None };
        for task in tasks {
            app.push_and_activate(task).await;
        }
        app
    }

    async fn push_and_activate(&mut self, task: Task) {
        let handler = match activate(&task, &self.context).await {
            Ok(handler) => Some(handler),
            Err(e) => {
                error!(task = %task.name, folder = %task.folder.display(), error = %e, "task left inactive");
                None
            }
        };
        self.entries.push(TaskEntry { task, handler });
    }

    /// Validate and activate `task`, then append it. Returns its index.
    pub async fn add_task(&mut self, task: Task) -> Result<usize, AppError> {
        let handler = activate(&task, &self.context).await?;
        self.entries.push(TaskEntry { task, handler: Some(handler) });
        Ok(self.entries.len() - 1)
    }

    /// Replace the definition at `index`.
    ///
    /// An invalid definition is rejected and the old handler keeps running.
    /// Otherwise the old handler is deactivated before the new one starts;
    /// if that start fails the entry keeps the new definition, inactive.
    pub async fn update_task(&mut self, index: usize, task: Task) -> Result<(), AppError> {
        let entry = self.entries.get_mut(index).ok_or(AppError::NoSuchTask(index))?;
        validate_folder(&task.folder).map_err(HandlerError::from)?;

        if let Some(mut old) = entry.handler.take() {
            old.deactivate();
        }
        entry.task = task;

        let handler = activate(&entry.task, &self.context).await?;
        entry.handler = Some(handler);
        Ok(())
    }
}

impl<E> Application<E> {
    /// Deactivate and drop the task at `index`.
    pub fn remove_task(&mut self, index: usize) -> Result<Task, AppError> {
        if index >= self.entries.len() {
            return Err(AppError::NoSuchTask(index));
        }
        let mut entry = self.entries.remove(index);
        if let Some(handler) = entry.handler.as_mut() {
            handler.deactivate();
        }
        info!(task = %entry.task.name, "task removed");
        Ok(entry.task)
    }

    /// Persist the task list, sorting it by name in place so indices match
    /// the saved order. A no-op for command-line-driven applications.
    pub fn save(&mut self) -> Result<(), AppError> {
        let Some(store) = &self.store else {
            debug!("command-line tasks are not saved");
            return Ok(());
        };
        self.entries.sort_by(|a, b| a.task.name.cmp(&b.task.name));
        let settings = Settings { git: self.git.clone(), tasks: self.tasks().cloned().collect() };
        store.save(&settings)?;
        Ok(())
    }

    /// Deactivate every handler. Task definitions are kept.
    pub fn shutdown(&mut self) {
        for entry in &mut self.entries {
            if let Some(mut handler) = entry.handler.take() {
                handler.deactivate();
            }
        }
        info!("all tasks stopped");
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter().map(|entry| &entry.task)
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.entries.get(index).map(|entry| &entry.task)
    }

    pub fn handler(&self, index: usize) -> Option<&Handler<E>> {
        self.entries.get(index).and_then(|entry| entry.handler.as_ref())
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.handler(index).is_some_and(Handler::is_active)
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.handler.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_command_line_driven(&self) -> bool {
        self.store.is_none()
    }

    pub fn settings_store(&self) -> Option<&SettingsStore> {
        self.store.as_ref()
    }
}

async fn activate<E: CommandExecutor + Clone + 'static>(
    task: &Task,
    context: &HandlerContext<E>,
) -> Result<Handler<E>, HandlerError> {
    if let Err(e) = validate_folder(&task.folder) {
        warn!(task = %task.name, error = %e, "invalid task");
        return Err(e.into());
    }
    Handler::activate(task, context).await
}
