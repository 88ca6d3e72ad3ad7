//! Fuzzy directory search for installers.
//!
//! Walks the configured roots, scores each subdirectory name against the
//! item's search name and looks for a known installer file inside the best
//! matches.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};
use unattend_core::{
    AcquisitionSettings, InstallableItem, PayloadSearchPort, effective_search_roots,
    normalize_name, significant_tokens,
};
use walkdir::WalkDir;

/// How well a directory name matches the wanted name. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    Prefix,
    TokenOverlap,
    Substring,
}

/// Score a normalized candidate against a normalized target.
pub fn match_tier(target: &str, candidate: &str) -> Option<MatchTier> {
    if target.is_empty() || candidate.is_empty() {
        return None;
    }
    if candidate == target {
        return Some(MatchTier::Exact);
    }
    if candidate.starts_with(target) || target.starts_with(candidate) {
        return Some(MatchTier::Prefix);
    }

    let wanted = significant_tokens(target);
    if !wanted.is_empty() {
        let have: Vec<&str> = candidate.split_whitespace().collect();
        let matched = wanted.iter().filter(|token| have.contains(token)).count();
        if matched > 0 && matched * 2 >= wanted.len() {
            return Some(MatchTier::TokenOverlap);
        }
    }

    if candidate.contains(target) || target.contains(candidate) {
        return Some(MatchTier::Substring);
    }
    None
}

/// Default [`PayloadSearchPort`]: prioritized roots, fuzzy names, shallow walk.
#[derive(Debug, Clone)]
pub struct DirectorySearch {
    roots: Vec<PathBuf>,
    installer_names: Vec<String>,
    max_depth: usize,
}

struct Candidate {
    tier: MatchTier,
    root_index: usize,
    name: String,
    path: PathBuf,
}

impl DirectorySearch {
    pub fn new(roots: Vec<PathBuf>, installer_names: Vec<String>, max_depth: usize) -> Self {
        Self {
            roots,
            installer_names,
            max_depth,
        }
    }

    pub fn from_settings(settings: &AcquisitionSettings) -> Self {
        Self::new(
            effective_search_roots(settings),
            settings.installer_names.clone(),
            settings.search_depth,
        )
    }

    /// Blocking search; see [`PayloadSearchPort::search`] for the async form.
    pub fn search_blocking(&self, search_name: &str) -> Option<PathBuf> {
        let target = normalize_name(search_name);
        if target.is_empty() {
            return None;
        }

        let mut candidates = self.candidates(&target);
        candidates.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then(a.root_index.cmp(&b.root_index))
                .then_with(|| a.name.cmp(&b.name))
        });

        candidates.iter().find_map(|candidate| {
            trace!(
                target: "unattend.install",
                dir = %candidate.path.display(),
                tier = ?candidate.tier,
                "Checking search candidate"
            );
            self.find_installer(&candidate.path)
        })
    }

    fn candidates(&self, target: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        for (root_index, root) in self.roots.iter().enumerate() {
            let Ok(entries) = std::fs::read_dir(root) else {
                debug!(target: "unattend.install", root = %root.display(), "Search root unreadable");
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = normalize_name(&entry.file_name().to_string_lossy());
                if let Some(tier) = match_tier(target, &name) {
                    out.push(Candidate {
                        tier,
                        root_index,
                        name,
                        path,
                    });
                }
            }
        }
        out
    }

    /// Shallowest known installer file below `dir`.
    fn find_installer(&self, dir: &Path) -> Option<PathBuf> {
        WalkDir::new(dir)
            .max_depth(self.max_depth + 1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.is_installer_name(&entry.file_name().to_string_lossy()))
            .min_by_key(walkdir::DirEntry::depth)
            .map(walkdir::DirEntry::into_path)
    }

    fn is_installer_name(&self, file_name: &str) -> bool {
        self.installer_names
            .iter()
            .any(|known| known.eq_ignore_ascii_case(file_name))
    }
}

#[async_trait]
impl PayloadSearchPort for DirectorySearch {
    async fn search(&self, item: &InstallableItem) -> Option<PathBuf> {
        let search = self.clone();
        let name = item.search_name().to_string();
        tokio::task::spawn_blocking(move || search.search_blocking(&name))
            .await
            .ok()
            .flatten()
    }
}
