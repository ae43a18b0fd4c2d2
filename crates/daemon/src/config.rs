// Task list persistence.
//
// Installed: `<local data dir>/git-auto-commit/settings.toml`
// Portable:  `settings.toml` next to the executable, when that file exists.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::task::Task;

pub const APP_DIR_NAME: &str = "git-auto-commit";
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Contents of the settings file.
///
/// ```toml
/// git = "/usr/local/bin/git"
///
/// [[task]]
/// name = "notes"
/// folder = "/home/me/notes"
/// interval = 30
/// message = "Automatic commit\n\n{DETAILS}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Skips git discovery when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<PathBuf>,
    #[serde(rename = "task")]
    pub tasks: Vec<Task>,
}

impl Settings {
    pub fn sort_tasks(&mut self) {
        self.tasks.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Load from a specific path. Tasks come back sorted by name.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&contents)?;
        settings.sort_tasks();
        Ok(settings)
    }

    /// Write `<path>.temp`, then move it over `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let mut sorted = self.clone();
        sorted.sort_tasks();
        let contents = toml::to_string_pretty(&sorted)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp = temp_path(path);
        std::fs::write(&temp, contents)?;
        std::fs::rename(&temp, path)?;

        debug!(path = %path.display(), tasks = sorted.tasks.len(), "settings saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".temp");
    PathBuf::from(name)
}

/// Where the settings live and whether that location is portable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsStore {
    path: PathBuf,
    portable: bool,
}

impl SettingsStore {
    /// Portable file beside the running executable if present, else the
    /// per-user location.
    pub fn resolve() -> Result<Self, ConfigError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::resolve_in(exe_dir.as_deref(), dirs::data_local_dir().as_deref())
    }

    pub fn resolve_in(exe_dir: Option<&Path>, data_dir: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(candidate) = exe_dir.map(|dir| dir.join(SETTINGS_FILE_NAME)) {
            if candidate.is_file() {
                return Ok(Self { path: candidate, portable: true });
            }
        }
        let data_dir = data_dir.ok_or(ConfigError::NoSettingsDir)?;
        Ok(Self { path: data_dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME), portable: false })
    }

    /// An explicit settings file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), portable: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_portable(&self) -> bool {
        self.portable
    }

    /// A missing file yields empty settings; an unreadable or corrupt one
    /// is logged and also yields empty settings.
    pub fn load(&self) -> Settings {
        match Settings::load_from(&self.path) {
            Ok(settings) => {
                info!(path = %self.path.display(), tasks = settings.tasks.len(), portable = self.portable, "settings loaded");
                settings
            }
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file yet");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to load settings, starting with no tasks");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.save_to(&self.path)
    }
}
