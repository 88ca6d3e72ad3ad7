//! Streaming HTTP payload downloader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use unattend_core::{DownloadProgress, DownloadProgressCallback, InstallError, PayloadDownloader};

const USER_AGENT: &str = concat!("unattend/", env!("CARGO_PKG_VERSION"));
const FALLBACK_FILE_NAME: &str = "payload.exe";

/// Downloads payloads with `reqwest`, streaming chunks to disk.
#[derive(Debug, Clone)]
pub struct HttpPayloadDownloader {
    client: Client,
}

impl HttpPayloadDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpPayloadDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// File name for a download: last path segment without query or fragment.
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    path.split_once('/')
        .and_then(|(_, tail)| tail.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map_or_else(|| FALLBACK_FILE_NAME.to_string(), ToString::to_string)
}

#[async_trait]
impl PayloadDownloader for HttpPayloadDownloader {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: &DownloadProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, InstallError> {
        fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(file_name_from_url(url));

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(InstallError::Cancelled),
            response = self.client.get(url).header("User-Agent", USER_AGENT).send() => {
                response.map_err(|e| InstallError::network(e.to_string()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::network_with_status(
                format!("GET {url} failed"),
                status.as_u16(),
            ));
        }

        let total = response.content_length();
        info!(target: "unattend.runtime", url, total = ?total, dest = %dest.display(), "Downloading payload");

        let result = stream_to_file(response, &dest, total, on_progress, cancel).await;
        if result.is_err() {
            // Partial files would be picked up by the local-file strategy later.
            let _ = fs::remove_file(&dest).await;
        }
        result.map(|()| dest)
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    dest: &Path,
    total: Option<u64>,
    on_progress: &DownloadProgressCallback<'_>,
    cancel: &CancellationToken,
) -> Result<(), InstallError> {
    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(InstallError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| InstallError::network(e.to_string()))?;

        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(DownloadProgress { downloaded, total });
    }

    file.flush().await?;
    debug!(target: "unattend.runtime", downloaded, "Download finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://cdn.example.com/files/SteamSetup.exe?sig=abc"),
            "SteamSetup.exe"
        );
        assert_eq!(
            file_name_from_url("https://example.com/a/b/driver.msi#frag"),
            "driver.msi"
        );
        assert_eq!(file_name_from_url("https://example.com/"), FALLBACK_FILE_NAME);
        assert_eq!(file_name_from_url("https://example.com"), FALLBACK_FILE_NAME);
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let downloader = HttpPayloadDownloader::new();
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Unroutable address; cancellation must win without waiting.
        let err = downloader
            .download("http://10.255.255.1/setup.exe", dir.path(), &|_| {}, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let err = HttpPayloadDownloader::new()
            .download(
                &format!("http://{addr}/missing.exe"),
                dir.path(),
                &|_| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InstallError::Network {
                status_code: Some(404),
                ..
            }
        ));
        assert!(!dir.path().join("missing.exe").exists());
    }
}
