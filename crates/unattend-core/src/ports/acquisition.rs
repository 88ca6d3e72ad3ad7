//! Acquisition ports: the collaborators the resolver tries in order.
//!
//! ```text
//! local file ─▶ EmbeddedPayloadPort ─▶ ConnectivityProbe + PayloadDownloader ─▶ PayloadSearchPort
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::InstallError;
use crate::item::InstallableItem;

/// Byte progress of a payload download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Total size if the server announced one.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Completion percentage, when the total is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|t| *t > 0)?;
        let pct = self.downloaded.saturating_mul(100) / total;
        Some(u8::try_from(pct.min(100)).unwrap_or(100))
    }
}

/// Callback receiving download progress.
pub type DownloadProgressCallback<'a> = dyn Fn(DownloadProgress) + Send + Sync + 'a;

/// Payloads shipped inside the application bundle.
#[async_trait]
pub trait EmbeddedPayloadPort: Send + Sync {
    /// Whether the bundle carries `resource`.
    fn contains(&self, resource: &str) -> bool;

    /// Extract `resource` into `dest_dir` and return the installer path.
    async fn extract(&self, resource: &str, dest_dir: &Path) -> Result<PathBuf, InstallError>;
}

/// Cheap reachability check run before any network fetch.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Streams a remote payload to disk.
#[async_trait]
pub trait PayloadDownloader: Send + Sync {
    /// Download `url` into `dest_dir` and return the file path.
    ///
    /// Partial files are removed on failure or cancellation.
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: &DownloadProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, InstallError>;
}

/// Last-resort search for an installer on local disks.
#[async_trait]
pub trait PayloadSearchPort: Send + Sync {
    async fn search(&self, item: &InstallableItem) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_percent() {
        let progress = DownloadProgress {
            downloaded: 50,
            total: Some(200),
        };
        assert_eq!(progress.percent(), Some(25));

        let unknown = DownloadProgress {
            downloaded: 50,
            total: None,
        };
        assert_eq!(unknown.percent(), None);

        let overshoot = DownloadProgress {
            downloaded: 300,
            total: Some(200),
        };
        assert_eq!(overshoot.percent(), Some(100));
    }
}
