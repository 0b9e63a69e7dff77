use crate::error::{Result, WardenError};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "config.yaml";
pub const ACTIVITY_FILE: &str = "activity.json";
pub const CREDENTIALS_DIR: &str = "credentials";

const USER_DIR: &str = ".gatewarden";
const SYSTEM_CONFIG: &str = "/etc/gatewarden/config.yaml";

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The per-user gatewarden directory (`~/.gatewarden`).
pub fn user_dir() -> Result<PathBuf> {
    home::home_dir()
        .map(|h| h.join(USER_DIR))
        .ok_or(WardenError::HomeNotFound)
}

/// Candidate config locations, in precedence order: working directory,
/// per-user directory, system-wide.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
    if let Ok(dir) = user_dir() {
        candidates.push(dir.join(CONFIG_FILE));
    }
    candidates.push(PathBuf::from(SYSTEM_CONFIG));
    candidates
}

/// First existing config file from [`config_candidates`], or an error naming
/// the locations that were checked.
pub fn resolve_config() -> Result<PathBuf> {
    let candidates = config_candidates();
    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }
    let checked = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(WardenError::ConfigNotFound(checked))
}

/// The activity log lives beside the config file.
pub fn activity_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(ACTIVITY_FILE)
}

/// Cached gateway credentials live under the config file's directory.
pub fn credentials_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(CREDENTIALS_DIR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
