//! Install engine: the visible queue, payload acquisition, installer
//! execution and process monitoring.
//!
//! - `queue` - bounded visible list with FIFO backlog
//! - `resolver` - local, embedded, network and search acquisition
//! - `executor` - silent command lines, launch, timeout and verification
//! - `monitor` - progress detection and auxiliary-process cleanup
//! - `manager` - the single-flight orchestrator

#![deny(unused_crate_dependencies)]

// Dev dependencies used only by integration tests.
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use unattend_runtime as _;

// Re-export core types for convenience
pub use unattend_core::{
    InstallError, InstallEvent, InstallStatus, InstallableItem, ItemId, QueueSnapshot, RunSummary,
};

pub mod executor;
pub mod monitor;
pub(crate) mod progress;
pub mod queue;
pub mod resolver;

// Re-export progress helpers for adapters
pub use progress::{ProgressGate, ProgressThrottle};

mod manager;

pub use executor::{ExecutionReport, InstallExecutor, InstallerFramework};
pub use manager::{InstallManager, InstallManagerDeps, WorkerDeps, build_install_manager};
pub use monitor::{MonitorUpdate, MonitoringSession, ProcessMonitor, progress_stream};
pub use queue::VisibleQueue;
pub use resolver::{
    AcquisitionObserver, AcquisitionResolver, DirectorySearch, NoopObserver, PayloadSource,
    ResolvedPayload, ResolverDeps,
};
