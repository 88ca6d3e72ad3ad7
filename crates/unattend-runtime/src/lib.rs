//! OS adapters for the unattended installer.
//!
//! Implements the `unattend-core` ports against the real system: the
//! process table (`sysinfo`), installer launching and tree kills
//! (`tokio::process`), Win32 window inspection, TCP reachability,
//! HTTP downloads (`reqwest`) and the zip payload bundle.

#![deny(unused_crate_dependencies)]

pub mod bundle;
pub mod network;
pub mod process;
pub mod window;

pub use bundle::ZipPayloadBundle;
pub use network::{
    CachedConnectivityProbe, HttpPayloadDownloader, TcpConnectivityProbe, file_name_from_url,
};
pub use process::{SysinfoProcessTable, TokioInstallerLauncher, TokioInstallerProcess};
pub use window::platform_window_inspector;

#[cfg(windows)]
pub use window::Win32WindowInspector;
