//! The installable item and its bookkeeping.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::InstallStatus;
use crate::errors::InstallError;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of an item, unique for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Category of the item. Order is install priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Driver,
    Program,
    Game,
}

impl ItemKind {
    /// Lower ranks are installed first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Driver => 0,
            Self::Program => 1,
            Self::Game => 2,
        }
    }
}

/// Executor path used to launch the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    /// Spawn the payload directly with a hidden window.
    #[default]
    Direct,
    /// Wrap the invocation in a batch script started elevated.
    ElevatedBatch,
    /// Hand the package to `msiexec`.
    MsiPackage,
}

/// One installable unit and its lifecycle state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallableItem {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    /// Absolute path, or a path relative to the configured local roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_local_path: Option<PathBuf>,
    /// Name of a resource inside the embedded payload bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Name used by the fuzzy directory search instead of `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_search_pattern: Option<String>,
    #[serde(default)]
    pub silent_arguments: String,
    /// Install-directory override; also the verification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub strategy: InstallStrategy,
    #[serde(default)]
    pub requires_elevation: bool,
    pub status: InstallStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl InstallableItem {
    /// Create a new waiting item with a fresh ID.
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: ItemId::next(),
            name: name.into(),
            kind,
            preferred_local_path: None,
            embedded_resource: None,
            remote_url: None,
            alternative_search_pattern: None,
            silent_arguments: String::new(),
            install_dir: None,
            strategy: InstallStrategy::Direct,
            requires_elevation: false,
            status: InstallStatus::Waiting,
            progress: 0,
            start_time: None,
            end_time: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferred_local_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_embedded_resource(mut self, resource: impl Into<String>) -> Self {
        self.embedded_resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_search_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.alternative_search_pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_silent_arguments(mut self, args: impl Into<String>) -> Self {
        self.silent_arguments = args.into();
        self
    }

    #[must_use]
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: InstallStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_elevation(mut self, required: bool) -> Self {
        self.requires_elevation = required;
        self
    }

    /// Name used by the fuzzy search.
    pub fn search_name(&self) -> &str {
        self.alternative_search_pattern
            .as_deref()
            .unwrap_or(&self.name)
    }

    /// Apply a validated status change and its bookkeeping.
    ///
    /// - entering an in-flight state from `Waiting` stamps `start_time`
    /// - entering a terminal state stamps `end_time`
    /// - `progress` is 100 on `Completed`, 0 outside `Installing`
    /// - a retry back to `Waiting` clears timestamps and the error
    pub fn transition(&mut self, to: InstallStatus) -> Result<(), InstallError> {
        if !InstallStatus::can_transition(self.status, to) {
            return Err(InstallError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        if self.status == InstallStatus::Waiting && to.is_in_flight() {
            self.start_time = Some(now);
        }
        if to.is_terminal() {
            self.end_time = Some(now);
        }
        if to == InstallStatus::Waiting {
            self.start_time = None;
            self.end_time = None;
            self.last_error = None;
        }

        self.progress = if to == InstallStatus::Completed { 100 } else { 0 };
        self.status = to;
        Ok(())
    }

    /// Transition to `Failed` and record the reason.
    pub fn fail(&mut self, error: &InstallError) -> Result<(), InstallError> {
        self.transition(InstallStatus::Failed)?;
        self.last_error = Some(error.user_message());
        Ok(())
    }

    /// Record a progress sample. Returns `true` if the stored value moved.
    ///
    /// Only accepted while installing, and only forward.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.status != InstallStatus::Installing || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = InstallableItem::new("a", ItemKind::Game);
        let b = InstallableItem::new("b", ItemKind::Game);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_priority_orders_drivers_first() {
        let mut kinds = vec![ItemKind::Game, ItemKind::Driver, ItemKind::Program];
        kinds.sort_by_key(|k| k.priority());
        assert_eq!(kinds, vec![ItemKind::Driver, ItemKind::Program, ItemKind::Game]);
    }

    #[test]
    fn test_transition_stamps_times() {
        let mut item = InstallableItem::new("7-Zip", ItemKind::Program);
        item.transition(InstallStatus::Installing).unwrap();
        assert!(item.start_time.is_some());
        assert!(item.end_time.is_none());

        item.transition(InstallStatus::Completed).unwrap();
        assert!(item.end_time.is_some());
        assert_eq!(item.progress, 100);
    }

    #[test]
    fn test_illegal_transition_leaves_item_untouched() {
        let mut item = InstallableItem::new("7-Zip", ItemKind::Program);
        item.transition(InstallStatus::Installing).unwrap();
        item.transition(InstallStatus::Completed).unwrap();

        let err = item.transition(InstallStatus::Installing).unwrap_err();
        assert!(matches!(err, InstallError::InvalidTransition { .. }));
        assert_eq!(item.status, InstallStatus::Completed);
    }

    #[test]
    fn test_progress_is_monotonic_and_installing_only() {
        let mut item = InstallableItem::new("Game", ItemKind::Game);
        assert!(!item.record_progress(10));
        assert_eq!(item.progress, 0);

        item.transition(InstallStatus::Installing).unwrap();
        assert!(item.record_progress(10));
        assert!(!item.record_progress(10));
        assert!(!item.record_progress(5));
        assert!(item.record_progress(250));
        assert_eq!(item.progress, 100);
    }

    #[test]
    fn test_failure_resets_progress_and_keeps_error() {
        let mut item = InstallableItem::new("Game", ItemKind::Game);
        item.transition(InstallStatus::Installing).unwrap();
        item.record_progress(40);
        item.fail(&InstallError::verification_failed("empty dir"))
            .unwrap();

        assert_eq!(item.status, InstallStatus::Failed);
        assert_eq!(item.progress, 0);
        assert!(item.last_error.as_deref().unwrap().contains("empty dir"));
    }

    #[test]
    fn test_retry_clears_attempt_state() {
        let mut item = InstallableItem::new("Game", ItemKind::Game);
        item.fail(&InstallError::payload_not_found("Game")).unwrap();
        item.transition(InstallStatus::Waiting).unwrap();

        assert!(item.last_error.is_none());
        assert!(item.end_time.is_none());
    }

    #[test]
    fn test_manifest_deserialization_defaults() {
        let json = r#"{
            "id": 42, "name": "Steam", "kind": "program",
            "remote_url": "https://example.invalid/SteamSetup.exe",
            "silent_arguments": "/S", "status": "waiting", "progress": 0
        }"#;
        let item: InstallableItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id.get(), 42);
        assert_eq!(item.strategy, InstallStrategy::Direct);
        assert!(!item.requires_elevation);
        assert_eq!(item.search_name(), "Steam");
    }
}
