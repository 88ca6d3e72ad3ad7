//! Acquisition resolver.
//!
//! Finds the payload for an item, trying in order: a local file, the
//! embedded bundle, a network download and finally a fuzzy search of the
//! configured directories. The first source that yields a file wins.

mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unattend_core::{
    ConnectivityProbe, DownloadProgress, EmbeddedPayloadPort, InstallError, InstallStatus,
    InstallableItem, PayloadDownloader, PayloadSearchPort, item_work_dir,
};

pub use search::{DirectorySearch, MatchTier, match_tier};

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Local,
    Embedded,
    Network,
    Search,
}

/// A payload on disk ready to hand to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPayload {
    pub path: PathBuf,
    pub source: PayloadSource,
}

/// Receives stage changes while a payload is acquired.
pub trait AcquisitionObserver: Send + Sync {
    /// The resolver entered `Extracting` or `Downloading`.
    fn stage(&self, status: InstallStatus);

    fn download_progress(&self, _progress: DownloadProgress) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl AcquisitionObserver for NoopObserver {
    fn stage(&self, _status: InstallStatus) {}
}

/// Collaborators of the resolver.
#[derive(Clone)]
pub struct ResolverDeps {
    pub embedded: Option<Arc<dyn EmbeddedPayloadPort>>,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub downloader: Arc<dyn PayloadDownloader>,
    pub search: Arc<dyn PayloadSearchPort>,
}

/// Resolves items to payload files.
#[derive(Clone)]
pub struct AcquisitionResolver {
    deps: ResolverDeps,
    local_roots: Vec<PathBuf>,
    work_dir: PathBuf,
}

impl AcquisitionResolver {
    pub fn new(deps: ResolverDeps, local_roots: Vec<PathBuf>, work_dir: PathBuf) -> Self {
        Self {
            deps,
            local_roots,
            work_dir,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolve `item` to a payload.
    ///
    /// Returns `PayloadNotFound` when every source comes up empty and
    /// `Cancelled` if `cancel` fires during a download.
    pub async fn resolve(
        &self,
        item: &InstallableItem,
        observer: &dyn AcquisitionObserver,
        cancel: &CancellationToken,
    ) -> Result<ResolvedPayload, InstallError> {
        if let Some(path) = self.find_local(item) {
            info!(target: "unattend.install", id = %item.id, path = %path.display(), "Using local payload");
            return Ok(ResolvedPayload {
                path,
                source: PayloadSource::Local,
            });
        }

        if let Some(path) = self.try_embedded(item, observer).await {
            return Ok(ResolvedPayload {
                path,
                source: PayloadSource::Embedded,
            });
        }

        match self.try_network(item, observer, cancel).await {
            Ok(Some(path)) => {
                return Ok(ResolvedPayload {
                    path,
                    source: PayloadSource::Network,
                });
            }
            Err(InstallError::Cancelled) => return Err(InstallError::Cancelled),
            Err(e) => {
                warn!(target: "unattend.install", id = %item.id, error = %e, "Download failed, falling back to search");
            }
            Ok(None) => {}
        }

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        if let Some(path) = self.deps.search.search(item).await {
            info!(target: "unattend.install", id = %item.id, path = %path.display(), "Found payload by search");
            return Ok(ResolvedPayload {
                path,
                source: PayloadSource::Search,
            });
        }

        Err(InstallError::payload_not_found(&item.name))
    }

    fn item_dir(&self, item: &InstallableItem) -> PathBuf {
        item_work_dir(&self.work_dir, &item.name)
    }

    fn find_local(&self, item: &InstallableItem) -> Option<PathBuf> {
        let preferred = item.preferred_local_path.as_ref()?;

        if preferred.is_absolute() {
            if preferred.is_file() {
                return Some(preferred.clone());
            }
        } else if let Some(hit) = self
            .local_roots
            .iter()
            .map(|root| root.join(preferred))
            .find(|candidate| candidate.is_file())
        {
            return Some(hit);
        }

        // Payload fetched on an earlier attempt.
        let cached = self.item_dir(item).join(preferred.file_name()?);
        cached.is_file().then_some(cached)
    }

    async fn try_embedded(
        &self,
        item: &InstallableItem,
        observer: &dyn AcquisitionObserver,
    ) -> Option<PathBuf> {
        let resource = item.embedded_resource.as_deref()?;
        let bundle = self.deps.embedded.as_ref()?;
        if !bundle.contains(resource) {
            debug!(target: "unattend.install", id = %item.id, resource, "Resource not in bundle");
            return None;
        }

        observer.stage(InstallStatus::Extracting);
        match bundle.extract(resource, &self.item_dir(item)).await {
            Ok(path) => {
                info!(target: "unattend.install", id = %item.id, path = %path.display(), "Extracted embedded payload");
                Some(path)
            }
            Err(e) => {
                warn!(target: "unattend.install", id = %item.id, error = %e, "Embedded extraction failed");
                None
            }
        }
    }

    async fn try_network(
        &self,
        item: &InstallableItem,
        observer: &dyn AcquisitionObserver,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>, InstallError> {
        let Some(url) = item.remote_url.as_deref() else {
            return Ok(None);
        };

        let reachable = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(InstallError::Cancelled),
            reachable = self.deps.probe.is_reachable() => reachable,
        };
        if !reachable {
            info!(target: "unattend.install", id = %item.id, "Offline, skipping download");
            return Ok(None);
        }

        observer.stage(InstallStatus::Downloading);
        let on_progress = |progress: DownloadProgress| observer.download_progress(progress);
        let path = self
            .deps
            .downloader
            .download(url, &self.item_dir(item), &on_progress, cancel)
            .await?;
        info!(target: "unattend.install", id = %item.id, path = %path.display(), "Downloaded payload");
        Ok(Some(path))
    }
}
