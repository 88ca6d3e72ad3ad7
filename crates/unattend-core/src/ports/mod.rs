//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the install engine expects from the OS and
//! the network. They use only domain types; adapters live in
//! `unattend-runtime`.

pub mod acquisition;
pub mod event_emitter;
pub mod launcher;
pub mod process_table;
pub mod progress_inspector;
pub mod window_inspector;

pub use acquisition::{
    ConnectivityProbe, DownloadProgress, DownloadProgressCallback, EmbeddedPayloadPort,
    PayloadDownloader, PayloadSearchPort,
};
pub use event_emitter::{EventBroadcaster, InstallEventEmitterPort, NoopInstallEmitter};
pub use launcher::{InstallerLauncher, InstallerProcess, LaunchRequest};
pub use process_table::{
    ProcessInfo, ProcessTablePort, descendants_deepest_first, find_process, process_name_matches,
};
pub use progress_inspector::{ProgressContext, ProgressInspector};
pub use window_inspector::{
    ControlInfo, NoopWindowInspector, PROGRESS_BAR_CLASS, ProgressRange, WindowInfo,
    WindowInspectorPort,
};
