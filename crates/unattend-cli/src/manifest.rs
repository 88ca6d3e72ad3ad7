//! Item manifest.
//!
//! A JSON array of items:
//!
//! ```json
//! [
//!   {
//!     "name": "Hades",
//!     "kind": "game",
//!     "local_path": "Hades/setup.exe",
//!     "remote_url": "https://example.com/hades.exe",
//!     "silent_arguments": "/VERYSILENT /SUPPRESSMSGBOXES",
//!     "install_dir": "D:\\Games\\Hades"
//!   }
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use unattend_core::{InstallStrategy, InstallableItem, ItemKind, normalize_name};

use crate::error::CliError;

/// One manifest entry. Only `name` and `kind` are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub embedded_resource: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub search_pattern: Option<String>,
    #[serde(default)]
    pub silent_arguments: String,
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub strategy: InstallStrategy,
    #[serde(default)]
    pub requires_elevation: bool,
}

impl ManifestEntry {
    pub fn into_item(self) -> InstallableItem {
        let mut item = InstallableItem::new(self.name, self.kind)
            .with_silent_arguments(self.silent_arguments)
            .with_strategy(self.strategy)
            .with_elevation(self.requires_elevation);
        if let Some(path) = self.local_path {
            item = item.with_local_path(path);
        }
        if let Some(resource) = self.embedded_resource {
            item = item.with_embedded_resource(resource);
        }
        if let Some(url) = self.remote_url {
            item = item.with_remote_url(url);
        }
        if let Some(pattern) = self.search_pattern {
            item = item.with_search_pattern(pattern);
        }
        if let Some(dir) = self.install_dir {
            item = item.with_install_dir(dir);
        }
        item
    }
}

pub fn parse_manifest(json: &str) -> Result<Vec<ManifestEntry>, CliError> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(json).map_err(|e| CliError::Manifest(e.to_string()))?;
    if let Some(entry) = entries.iter().find(|entry| entry.name.trim().is_empty()) {
        return Err(CliError::Manifest(format!(
            "entry of kind {:?} has an empty name",
            entry.kind
        )));
    }
    Ok(entries)
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, CliError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CliError::Manifest(format!("{}: {e}", path.display())))?;
    parse_manifest(&json)
}

/// Find an entry by name, ignoring case, punctuation and size annotations.
pub fn find_entry<'a>(entries: &'a [ManifestEntry], name: &str) -> Option<&'a ManifestEntry> {
    let wanted = normalize_name(name);
    entries
        .iter()
        .find(|entry| entry.name == name)
        .or_else(|| entries.iter().find(|entry| normalize_name(&entry.name) == wanted))
}
