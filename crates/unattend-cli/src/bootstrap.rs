//! CLI bootstrap - the composition root.
//!
//! The only place where concrete adapters are instantiated:
//! - process table, launcher and window inspector (via unattend-runtime)
//! - connectivity probe, downloader and payload bundle (via unattend-runtime)
//! - resolver, executor, monitor and manager (via unattend-install)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use unattend_core::{
    EmbeddedPayloadPort, EventBroadcaster, ProcessTablePort, Settings, effective_local_roots,
    ensure_directory, resolve_work_dir,
};
use unattend_install::{
    AcquisitionResolver, DirectorySearch, InstallExecutor, InstallManager, InstallManagerDeps,
    ProcessMonitor, ResolverDeps, build_install_manager,
};
use unattend_runtime::{
    CachedConnectivityProbe, HttpPayloadDownloader, SysinfoProcessTable, TcpConnectivityProbe,
    TokioInstallerLauncher, ZipPayloadBundle, platform_window_inspector,
};

use crate::error::CliError;

/// Load settings from `path`, or the defaults when none is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => {
            let settings = Settings::load(path)?;
            info!(path = %path.display(), "Loaded settings");
            Ok(settings)
        }
        None => Ok(Settings::with_defaults()),
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub settings: Settings,
    pub work_dir: PathBuf,
    pub manager: InstallManager,
    /// Subscribe before enqueueing to see every event.
    pub events: EventBroadcaster,
}

/// Build the acquisition resolver. Also used on its own by `resolve`.
pub fn build_resolver(settings: &Settings, work_dir: &Path) -> AcquisitionResolver {
    let acquisition = &settings.acquisition;

    let embedded = acquisition.bundle_path.as_deref().and_then(|path| {
        match ZipPayloadBundle::open(path) {
            Ok(bundle) => Some(Arc::new(bundle) as Arc<dyn EmbeddedPayloadPort>),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Payload bundle unavailable");
                None
            }
        }
    });

    let probe = CachedConnectivityProbe::new(
        Arc::new(TcpConnectivityProbe::from_settings(acquisition)),
        acquisition.connectivity_ttl(),
    );

    AcquisitionResolver::new(
        ResolverDeps {
            embedded,
            probe: Arc::new(probe),
            downloader: Arc::new(HttpPayloadDownloader::new()),
            search: Arc::new(DirectorySearch::from_settings(acquisition)),
        },
        effective_local_roots(acquisition),
        work_dir.to_path_buf(),
    )
}

/// Resolve and create the working directory.
pub fn prepare_work_dir(settings: &Settings) -> Result<PathBuf, CliError> {
    let work_dir = resolve_work_dir(&settings.acquisition)?;
    ensure_directory(&work_dir)?;
    debug!(path = %work_dir.display(), "Working directory ready");
    Ok(work_dir)
}

/// Wire everything and spawn the install manager.
///
/// Must be called from within the tokio runtime.
pub fn bootstrap(settings: Settings) -> Result<CliContext, CliError> {
    let work_dir = prepare_work_dir(&settings)?;

    let table: Arc<dyn ProcessTablePort> = Arc::new(SysinfoProcessTable::new());
    let monitor = ProcessMonitor::new(
        Arc::clone(&table),
        platform_window_inspector(),
        settings.monitor.clone(),
        settings.auxiliary.clone(),
    );
    let executor = InstallExecutor::new(
        Arc::new(TokioInstallerLauncher::new(Arc::clone(&table))),
        monitor,
        settings.executor.clone(),
        work_dir.clone(),
    );

    let events = EventBroadcaster::new();
    let manager = build_install_manager(InstallManagerDeps {
        resolver: build_resolver(&settings, &work_dir),
        executor,
        event_emitter: Arc::new(events.clone()),
        config: settings.queue.clone(),
    });

    Ok(CliContext {
        settings,
        work_dir,
        manager,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "queue": { "max_visible": 0 } }"#).unwrap();

        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "executor": { "timeout_ms": 60000 } }"#).unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.executor.timeout_ms, 60_000);
        assert_eq!(settings.queue, Settings::default().queue);
    }
}
