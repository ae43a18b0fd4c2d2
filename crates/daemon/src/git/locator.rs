// Discovery of the git executable: PATH, then the Git for Windows uninstall
// registry entries, then `git*` folders under the program-files roots.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use super::runner::{CommandExecutor, ProcessCommandExecutor};

pub const GIT_EXE_NAME: &str = if cfg!(windows) { "git.exe" } else { "git" };

const UNINSTALL_KEY: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Git_is1";
const UNINSTALL_KEY_WOW64: &str =
    r"HKLM\SOFTWARE\Wow6432Node\Microsoft\Windows\CurrentVersion\Uninstall\Git_is1";
const INSTALL_LOCATION_VALUE: &str = "InstallLocation";

/// Inputs the locator searches. Captured once so lookups are reproducible.
#[derive(Debug, Clone, Default)]
pub struct LocatorEnv {
    /// Raw executable search path.
    pub path_var: Option<OsString>,
    /// Registry keys whose `InstallLocation` value is probed, in order.
    pub registry_hives: Vec<String>,
    /// Directories scanned for `git*` install folders, in order.
    pub install_roots: Vec<PathBuf>,
}

impl LocatorEnv {
    /// Snapshot of the current process environment. Registry hives and
    /// install roots are only populated on Windows.
    pub fn from_process() -> Self {
        let is_64bit = cfg!(target_pointer_width = "64")
            || std::env::var_os("PROCESSOR_ARCHITEW6432").is_some_and(|value| !value.is_empty());

        let mut registry_hives = Vec::new();
        let mut install_roots = Vec::new();
        if cfg!(windows) {
            registry_hives.push(UNINSTALL_KEY.to_string());
            if is_64bit {
                registry_hives.push(UNINSTALL_KEY_WOW64.to_string());
            }

            install_roots.extend(std::env::var_os("ProgramFiles").map(PathBuf::from));
            if is_64bit {
                install_roots.extend(std::env::var_os("ProgramFiles(x86)").map(PathBuf::from));
            }
        }

        Self { path_var: std::env::var_os("PATH"), registry_hives, install_roots }
    }
}

/// Finds the git executable once and remembers the answer.
///
/// Owned by the application and shared between task runners through an
/// `Arc`; a "not found" result is cached as well.
#[derive(Debug)]
pub struct BinaryLocator {
    exe_name: String,
    env: LocatorEnv,
    cached: OnceLock<Option<PathBuf>>,
}

impl Default for BinaryLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryLocator {
    pub fn new() -> Self {
        Self::with_env(GIT_EXE_NAME, LocatorEnv::from_process())
    }

    pub fn with_env(exe_name: impl Into<String>, env: LocatorEnv) -> Self {
        Self { exe_name: exe_name.into(), env, cached: OnceLock::new() }
    }

    /// A locator that always answers `path` without probing.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self {
            exe_name: GIT_EXE_NAME.to_string(),
            env: LocatorEnv::default(),
            cached: OnceLock::from(Some(path.into())),
        }
    }

    pub fn locate(&self) -> Option<&Path> {
        self.cached.get_or_init(|| self.probe()).as_deref()
    }

    fn probe(&self) -> Option<PathBuf> {
        let found = self
            .search_path()
            .or_else(|| self.search_registry())
            .or_else(|| self.search_install_roots());

        match &found {
            Some(path) => info!(path = %path.display(), "located git executable"),
            None => warn!(exe = %self.exe_name, "git executable not found"),
        }
        found
    }

    fn search_path(&self) -> Option<PathBuf> {
        let path_var = self.env.path_var.as_ref()?;
        std::env::split_paths(path_var)
            .map(|dir| strip_quotes(&dir).join(&self.exe_name))
            .find(|candidate| candidate.is_file())
    }

    fn search_registry(&self) -> Option<PathBuf> {
        self.env
            .registry_hives
            .iter()
            .filter_map(|key| query_install_location(key))
            .map(|location| location.join("bin").join(&self.exe_name))
            .find(|candidate| candidate.is_file())
    }

    fn search_install_roots(&self) -> Option<PathBuf> {
        self.env.install_roots.iter().find_map(|root| {
            let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
                .ok()?
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry.file_name().to_string_lossy().to_ascii_lowercase().starts_with("git")
                })
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();

            dirs.into_iter()
                .map(|dir| dir.join("bin").join(&self.exe_name))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// PATH entries may be wrapped in double quotes on Windows.
fn strip_quotes(dir: &Path) -> PathBuf {
    match dir.to_str() {
        Some(text) if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') => {
            PathBuf::from(&text[1..text.len() - 1])
        }
        _ => dir.to_path_buf(),
    }
}

fn query_install_location(key: &str) -> Option<PathBuf> {
    let args = vec![
        "query".to_string(),
        key.to_string(),
        "/v".to_string(),
        INSTALL_LOCATION_VALUE.to_string(),
    ];
    let cwd = std::env::temp_dir();
    match ProcessCommandExecutor.execute(Path::new("reg"), &args, &cwd, "") {
        Ok(result) if result.success => {
            parse_reg_query_value(&result.stdout, INSTALL_LOCATION_VALUE)
        }
        Ok(_) => None,
        Err(error) => {
            debug!(%key, %error, "registry query failed");
            None
        }
    }
}

/// Extracts a value's data from `reg query` output, e.g.
/// `    InstallLocation    REG_SZ    C:\Program Files\Git\`.
fn parse_reg_query_value(output: &str, value_name: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(value_name)?;
        let (kind, data) = rest.trim_start().split_once(char::is_whitespace)?;
        let data = data.trim();
        (kind.starts_with("REG_") && !data.is_empty()).then(|| PathBuf::from(data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn env_with_path(dirs: &[&Path]) -> LocatorEnv {
        LocatorEnv {
            path_var: Some(std::env::join_paths(dirs).unwrap()),
            ..LocatorEnv::default()
        }
    }

    #[test]
    fn finds_binary_in_later_path_entry() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&empty).unwrap();
        touch(&bin.join("git"));

        let locator = BinaryLocator::with_env("git", env_with_path(&[&empty, &bin]));
        assert_eq!(locator.locate(), Some(bin.join("git").as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn strips_quotes_around_path_entries() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("git"));

        let quoted = format!("\"{}\"", tmp.path().display());
        let locator = BinaryLocator::with_env(
            "git",
            LocatorEnv { path_var: Some(quoted.into()), ..LocatorEnv::default() },
        );
        assert_eq!(locator.locate(), Some(tmp.path().join("git").as_path()));
    }

    #[test]
    fn falls_back_to_git_folders_under_install_roots() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Program Files");
        touch(&root.join("Mercurial").join("bin").join("git"));
        touch(&root.join("Git").join("bin").join("git"));

        let locator = BinaryLocator::with_env(
            "git",
            LocatorEnv { install_roots: vec![root.clone()], ..LocatorEnv::default() },
        );
        assert_eq!(locator.locate(), Some(root.join("Git").join("bin").join("git").as_path()));
    }

    #[test]
    fn path_wins_over_install_roots() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        let root = tmp.path().join("programs");
        touch(&bin.join("git"));
        touch(&root.join("git-portable").join("bin").join("git"));

        let mut env = env_with_path(&[&bin]);
        env.install_roots = vec![root];
        let locator = BinaryLocator::with_env("git", env);
        assert_eq!(locator.locate(), Some(bin.join("git").as_path()));
    }

    #[test]
    fn not_found_when_nothing_matches() {
        let tmp = TempDir::new().unwrap();
        let locator = BinaryLocator::with_env("git", env_with_path(&[tmp.path()]));
        assert!(locator.locate().is_none());
    }

    #[test]
    fn result_is_cached_for_locator_lifetime() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("git");
        touch(&exe);

        let locator = BinaryLocator::with_env("git", env_with_path(&[tmp.path()]));
        assert_eq!(locator.locate(), Some(exe.as_path()));

        fs::remove_file(&exe).unwrap();
        assert_eq!(locator.locate(), Some(exe.as_path()));
    }

    #[test]
    fn fixed_locator_skips_probing() {
        let locator = BinaryLocator::fixed("/opt/custom/git");
        assert_eq!(locator.locate(), Some(Path::new("/opt/custom/git")));
    }

    #[test]
    fn parses_install_location_from_reg_output() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\Git_is1\r\n    InstallLocation    REG_SZ    C:\\Program Files\\Git\\\r\n\r\n";
        assert_eq!(
            parse_reg_query_value(output, "InstallLocation"),
            Some(PathBuf::from("C:\\Program Files\\Git\\"))
        );
    }

    #[test]
    fn reg_output_without_value_yields_none() {
        let output = "ERROR: The system was unable to find the specified registry key or value.\r\n";
        assert!(parse_reg_query_value(output, "InstallLocation").is_none());
        assert!(parse_reg_query_value("    InstallLocation    REG_SZ    ", "InstallLocation").is_none());
    }
}
