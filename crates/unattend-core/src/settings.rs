//! Settings domain types and validation.
//!
//! Every knob of the engine lives here, including the timings of the
//! auxiliary-process cleanup, which were tuned empirically for one installer
//! framework and are therefore configuration rather than constants.
//! Durations are stored as milliseconds so the JSON stays readable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity of the visible queue.
pub const DEFAULT_MAX_VISIBLE: u32 = 10;

/// Default wall-clock budget for one installer run.
pub const DEFAULT_INSTALL_TIMEOUT_MS: u64 = 3 * 60 * 1000;

/// Application settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub queue: QueueSettings,
    pub executor: ExecutorSettings,
    pub monitor: MonitorSettings,
    pub auxiliary: AuxiliaryWatchSettings,
    pub acquisition: AcquisitionSettings,
}

/// Visible queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueSettings {
    /// Capacity of the visible list (1-50).
    pub max_visible: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
        }
    }
}

/// Installer launch and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Wall-clock budget before the process tree is force-killed.
    pub timeout_ms: u64,
    /// Exit codes treated as success (3010/1641 mean "reboot required").
    pub success_exit_codes: Vec<i32>,
    /// Without an executable in the install dir, more files than this pass.
    pub verify_min_files: usize,
    /// Write Inno/NSIS answer files next to the payload.
    pub write_sidecars: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_INSTALL_TIMEOUT_MS,
            success_exit_codes: vec![0, 3010, 1641],
            verify_min_files: 5,
            write_sidecars: true,
        }
    }
}

impl ExecutorSettings {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_success_code(&self, code: i32) -> bool {
        self.success_exit_codes.contains(&code)
    }
}

/// Progress inference settings.
///
/// The resource and elapsed-time estimators are last-resort guesses; these
/// floors keep them from reporting progress before real work starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorSettings {
    pub progress_poll_ms: u64,
    /// Resident memory below this is treated as "not started".
    pub memory_floor_mb: u64,
    /// Resource estimates need at least this much elapsed time.
    pub resource_elapsed_floor_ms: u64,
    pub memory_mb_per_percent: u64,
    /// Temp files smaller than this are ignored.
    pub temp_file_min_mb: u64,
    pub temp_mb_per_percent: u64,
    /// Upper bound for every estimated (non-observed) value.
    pub estimate_cap_percent: u8,
    /// Duration the elapsed-time estimate maps to 100%.
    pub expected_install_ms: u64,
    /// The elapsed-time estimate stays silent below this value.
    pub elapsed_floor_percent: u8,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            progress_poll_ms: 500,
            memory_floor_mb: 100,
            resource_elapsed_floor_ms: 10_000,
            memory_mb_per_percent: 20,
            temp_file_min_mb: 10,
            temp_mb_per_percent: 50,
            estimate_cap_percent: 90,
            expected_install_ms: 120_000,
            elapsed_floor_percent: 5,
        }
    }
}

impl MonitorSettings {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub const fn resource_elapsed_floor(&self) -> Duration {
        Duration::from_millis(self.resource_elapsed_floor_ms)
    }

    pub const fn expected_install(&self) -> Duration {
        Duration::from_millis(self.expected_install_ms)
    }
}

/// Two-phase auxiliary-process watch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuxiliaryWatchSettings {
    pub enabled: bool,
    /// Phase 1: transient extraction helper names (exact or prefix).
    pub extraction_helpers: Vec<String>,
    /// Phase 2: unwanted helper names (exact or prefix).
    pub unwanted_helpers: Vec<String>,
    pub phase1_timeout_ms: u64,
    pub phase2_timeout_ms: u64,
    pub poll_ms: u64,
    /// How long a graceful close may take before the process is killed.
    pub graceful_wait_ms: u64,
    /// Pause between terminating the phase-1 and the phase-2 process.
    pub cleanup_gap_ms: u64,
}

impl Default for AuxiliaryWatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extraction_helpers: vec!["unarc".to_string(), "isdone".to_string()],
            unwanted_helpers: vec!["quicksfv".to_string()],
            phase1_timeout_ms: 4 * 60 * 1000,
            phase2_timeout_ms: 10 * 60 * 1000,
            poll_ms: 1000,
            graceful_wait_ms: 1000,
            cleanup_gap_ms: 500,
        }
    }
}

impl AuxiliaryWatchSettings {
    pub const fn phase1_timeout(&self) -> Duration {
        Duration::from_millis(self.phase1_timeout_ms)
    }

    pub const fn phase2_timeout(&self) -> Duration {
        Duration::from_millis(self.phase2_timeout_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub const fn graceful_wait(&self) -> Duration {
        Duration::from_millis(self.graceful_wait_ms)
    }

    pub const fn cleanup_gap(&self) -> Duration {
        Duration::from_millis(self.cleanup_gap_ms)
    }
}

/// Payload acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Where payloads are extracted/downloaded. Defaults to the data dir.
    pub work_dir: Option<PathBuf>,
    /// Roots tried for relative `preferred_local_path` values. Empty means
    /// the vendor install directories.
    pub local_roots: Vec<PathBuf>,
    /// Roots walked by the fuzzy search, highest priority first.
    pub search_roots: Vec<PathBuf>,
    /// Installer file names the fuzzy search looks for.
    pub installer_names: Vec<String>,
    /// Levels below a matched directory the search may descend.
    pub search_depth: usize,
    /// Zip archive holding embedded payloads.
    pub bundle_path: Option<PathBuf>,
    /// `host:port` used for the reachability probe.
    pub connectivity_host: String,
    pub connectivity_timeout_ms: u64,
    /// How long a probe result is reused.
    pub connectivity_ttl_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            work_dir: None,
            local_roots: Vec::new(),
            search_roots: Vec::new(),
            installer_names: vec![
                "setup.exe".to_string(),
                "install.exe".to_string(),
                "installer.exe".to_string(),
            ],
            search_depth: 2,
            bundle_path: None,
            connectivity_host: "8.8.8.8:53".to_string(),
            connectivity_timeout_ms: 1500,
            connectivity_ttl_ms: 30_000,
        }
    }
}

impl AcquisitionSettings {
    pub const fn connectivity_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_timeout_ms)
    }

    pub const fn connectivity_ttl(&self) -> Duration {
        Duration::from_millis(self.connectivity_ttl_ms)
    }
}

/// Settings validation and loading errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Max visible queue size must be between 1 and 50, got {0}")]
    InvalidQueueSize(u32),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("Progress percentage {field} must be at most 100, got {value}")]
    InvalidPercent { field: &'static str, value: u8 },

    #[error("Success exit code list cannot be empty")]
    NoSuccessCodes,

    #[error("Installer name list cannot be empty")]
    NoInstallerNames,

    #[error("Failed to read settings from {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid settings JSON: {0}")]
    Parse(String),
}

impl Settings {
    /// Create settings with the shipped defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_settings(self)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loading settings");
        Self::from_json(&json)
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let max_visible = settings.queue.max_visible;
    if !(1..=50).contains(&max_visible) {
        return Err(SettingsError::InvalidQueueSize(max_visible));
    }

    let durations = [
        ("executor.timeout_ms", settings.executor.timeout_ms),
        ("monitor.progress_poll_ms", settings.monitor.progress_poll_ms),
        ("monitor.expected_install_ms", settings.monitor.expected_install_ms),
        ("auxiliary.poll_ms", settings.auxiliary.poll_ms),
        ("auxiliary.phase1_timeout_ms", settings.auxiliary.phase1_timeout_ms),
        ("auxiliary.phase2_timeout_ms", settings.auxiliary.phase2_timeout_ms),
    ];
    if let Some((field, _)) = durations.iter().find(|(_, value)| *value == 0) {
        return Err(SettingsError::ZeroDuration { field });
    }

    for (field, value) in [
        (
            "monitor.estimate_cap_percent",
            settings.monitor.estimate_cap_percent,
        ),
        (
            "monitor.elapsed_floor_percent",
            settings.monitor.elapsed_floor_percent,
        ),
    ] {
        if value > 100 {
            return Err(SettingsError::InvalidPercent { field, value });
        }
    }

    if settings.executor.success_exit_codes.is_empty() {
        return Err(SettingsError::NoSuccessCodes);
    }

    if settings.acquisition.installer_names.is_empty() {
        return Err(SettingsError::NoInstallerNames);
    }

    Ok(())
}
