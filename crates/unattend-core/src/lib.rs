//! Core domain types and port definitions for the unattended installer.
//!
//! This crate performs no OS access. The item model and its status machine,
//! events, errors and settings live here, together with the traits the
//! install engine uses to reach processes, windows and the network.

#![deny(unused_crate_dependencies)]

pub mod errors;
pub mod events;
pub mod item;
pub mod naming;
pub mod paths;
pub mod ports;
pub mod settings;

pub use errors::{InstallError, InstallResult};
pub use events::InstallEvent;
pub use item::{
    InstallStatus, InstallStrategy, InstallableItem, ItemId, ItemKind, ItemSummary, QueueSnapshot,
    RunSummary,
};
pub use naming::{normalize_name, significant_tokens, slug};
pub use paths::{
    PathError, data_root, default_local_roots, default_search_roots, effective_local_roots,
    effective_search_roots, ensure_directory, item_work_dir, resolve_work_dir,
};
pub use ports::{
    ConnectivityProbe, ControlInfo, DownloadProgress, DownloadProgressCallback,
    EmbeddedPayloadPort, EventBroadcaster, InstallEventEmitterPort, InstallerLauncher,
    InstallerProcess, LaunchRequest, NoopInstallEmitter, NoopWindowInspector, PROGRESS_BAR_CLASS,
    PayloadDownloader, PayloadSearchPort, ProcessInfo, ProcessTablePort, ProgressContext,
    ProgressInspector, ProgressRange, WindowInfo, WindowInspectorPort, descendants_deepest_first,
    find_process, process_name_matches,
};
pub use settings::{
    AcquisitionSettings, AuxiliaryWatchSettings, ExecutorSettings, MonitorSettings,
    QueueSettings, Settings, SettingsError, validate_settings,
};
