// ABOUTME: Per-user locations for the pinion config file and rolling logs.
// ABOUTME: Resolved through the platform's standard directories, with working-directory fallbacks.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";
const LOG_DIR_NAME: &str = "logs";

fn dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("ai", "pinionai", "pinion")
}

/// Resolve a directory from the platform layout, or `fallback` when the
/// home directory cannot be determined (containers, stripped-down CI).
fn resolve(pick: fn(&ProjectDirs) -> &Path, fallback: &str) -> PathBuf {
    dirs()
        .map(|d| pick(&d).to_path_buf())
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// `~/.config/pinion/config.toml` on Linux
pub fn config_file() -> PathBuf {
    resolve(ProjectDirs::config_dir, ".").join(CONFIG_FILE_NAME)
}

/// Where the daily log files go unless `[logging] dir` says otherwise
pub fn log_dir() -> PathBuf {
    resolve(ProjectDirs::data_dir, "./data").join(LOG_DIR_NAME)
}
