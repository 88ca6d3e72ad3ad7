//! Path resolution for the working directory and default search roots.
//!
//! Resolution order for the working directory:
//! 1. `UNATTEND_WORK_DIR` environment variable
//! 2. `acquisition.work_dir` from settings
//! 3. System data directory (e.g. `%LOCALAPPDATA%\unattend\payloads`)

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::naming::slug;
use crate::settings::AcquisitionSettings;

/// Environment variable overriding the working directory.
pub const WORK_DIR_ENV: &str = "UNATTEND_WORK_DIR";

const APP_DIR_NAME: &str = "unattend";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Root directory for application data.
pub fn data_root() -> Result<PathBuf, PathError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(PathError::NoDataDir)
}

/// Resolve the directory payloads are extracted and downloaded into.
pub fn resolve_work_dir(settings: &AcquisitionSettings) -> Result<PathBuf, PathError> {
    if let Ok(value) = env::var(WORK_DIR_ENV) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    if let Some(dir) = &settings.work_dir {
        return Ok(dir.clone());
    }
    Ok(data_root()?.join("payloads"))
}

/// Per-item subdirectory of the working directory.
pub fn item_work_dir(work_dir: &Path, item_name: &str) -> PathBuf {
    work_dir.join(slug(item_name))
}

/// Create a directory (and parents) if it does not exist.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    std::fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Search roots used when settings name none.
///
/// The user's download and desktop folders, then the working directory of
/// the process (installers are often shipped next to the tool).
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = [dirs::download_dir(), dirs::desktop_dir()]
        .into_iter()
        .flatten()
        .collect();
    if let Ok(cwd) = env::current_dir() {
        roots.push(cwd);
    }
    roots.dedup();
    roots
}

/// Environment variables naming vendor install directories on Windows.
const VENDOR_DIR_VARS: [&str; 3] = ["ProgramFiles", "ProgramFiles(x86)", "ProgramData"];

/// Vendor-default install directories, tried for relative local paths when
/// settings name no local roots.
///
/// `Program Files`, `Program Files (x86)` and `ProgramData`, then the
/// per-user `Programs` folder under the local data directory.
pub fn default_local_roots() -> Vec<PathBuf> {
    vendor_roots(|name| env::var(name).ok(), dirs::data_local_dir())
}

fn vendor_roots(
    lookup: impl Fn(&str) -> Option<String>,
    local_data: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = VENDOR_DIR_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .collect();
    roots.extend(local_data.map(|dir| dir.join("Programs")));
    roots.dedup();
    roots
}

/// Local roots from settings, falling back to [`default_local_roots`].
pub fn effective_local_roots(settings: &AcquisitionSettings) -> Vec<PathBuf> {
    if settings.local_roots.is_empty() {
        default_local_roots()
    } else {
        settings.local_roots.clone()
    }
}

/// Search roots from settings, falling back to [`default_search_roots`].
pub fn effective_search_roots(settings: &AcquisitionSettings) -> Vec<PathBuf> {
    if settings.search_roots.is_empty() {
        default_search_roots()
    } else {
        settings.search_roots.clone()
    }
}
