//! Embedded payload bundle backed by a zip archive.
//!
//! A resource is either a single file entry (`drivers/chipset.exe`) or a
//! directory prefix (`vcredist/`) whose entries are extracted together; the
//! returned path is the installer inside it.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use unattend_core::{EmbeddedPayloadPort, InstallError};
use zip::ZipArchive;

const INSTALLER_EXTENSIONS: [&str; 2] = ["exe", "msi"];

/// Payload bundle stored as a zip file next to the application.
#[derive(Debug, Clone)]
pub struct ZipPayloadBundle {
    archive_path: PathBuf,
    entries: Vec<String>,
}

impl ZipPayloadBundle {
    /// Open the archive and index its entry names.
    pub fn open(archive_path: impl Into<PathBuf>) -> Result<Self, InstallError> {
        let archive_path = archive_path.into();
        let file = File::open(&archive_path)?;
        let archive = ZipArchive::new(file).map_err(|e| {
            InstallError::other(format!(
                "Invalid payload bundle {}: {e}",
                archive_path.display()
            ))
        })?;
        let entries = archive.file_names().map(ToString::to_string).collect();
        Ok(Self {
            archive_path,
            entries,
        })
    }

    fn matching_entries(&self, resource: &str) -> Vec<String> {
        let resource = resource.trim_start_matches('/');
        let prefix = format!("{}/", resource.trim_end_matches('/'));
        self.entries
            .iter()
            .filter(|name| name.as_str() == resource || name.starts_with(&prefix))
            .filter(|name| !name.ends_with('/'))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmbeddedPayloadPort for ZipPayloadBundle {
    fn contains(&self, resource: &str) -> bool {
        !self.matching_entries(resource).is_empty()
    }

    async fn extract(&self, resource: &str, dest_dir: &Path) -> Result<PathBuf, InstallError> {
        let entries = self.matching_entries(resource);
        if entries.is_empty() {
            return Err(InstallError::payload_not_found(resource));
        }

        let archive_path = self.archive_path.clone();
        let dest_dir = dest_dir.to_path_buf();
        let resource = resource.to_string();

        tokio::task::spawn_blocking(move || {
            extract_entries(&archive_path, &entries, &dest_dir, &resource)
        })
        .await
        .map_err(|e| InstallError::other(format!("Extraction task failed: {e}")))?
    }
}

fn extract_entries(
    archive_path: &Path,
    entries: &[String],
    dest_dir: &Path,
    resource: &str,
) -> Result<PathBuf, InstallError> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| InstallError::other(format!("Invalid bundle: {e}")))?;
    fs::create_dir_all(dest_dir)?;

    let mut extracted = Vec::with_capacity(entries.len());
    for name in entries {
        let mut entry = archive
            .by_name(name)
            .map_err(|e| InstallError::other(format!("Bundle entry {name}: {e}")))?;
        // enclosed_name rejects absolute paths and `..` traversal.
        let Some(relative) = entry.enclosed_name() else {
            debug!(target: "unattend.runtime", entry = %name, "Skipping unsafe bundle entry");
            continue;
        };
        let target = dest_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(target);
    }

    info!(
        target: "unattend.runtime",
        resource,
        files = extracted.len(),
        dest = %dest_dir.display(),
        "Extracted embedded payload"
    );

    pick_installer(&extracted).ok_or_else(|| InstallError::payload_not_found(resource))
}

/// Shallowest installer-looking file; `setup.exe` wins ties.
fn pick_installer(files: &[PathBuf]) -> Option<PathBuf> {
    files
        .iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    INSTALLER_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
        })
        .min_by_key(|path| {
            let is_setup = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case("setup.exe"));
            (path.components().count(), !is_setup)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_bundle(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_extract_directory_resource() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle_path = tmp.path().join("payloads.zip");
        write_bundle(
            &bundle_path,
            &[
                ("vcredist/readme.txt", b"hi"),
                ("vcredist/setup.exe", b"MZ"),
                ("vcredist/lib/helper.exe", b"MZ"),
                ("other/tool.exe", b"MZ"),
            ],
        );

        let bundle = ZipPayloadBundle::open(&bundle_path).unwrap();
        assert!(bundle.contains("vcredist"));
        assert!(!bundle.contains("missing"));

        let out = tmp.path().join("out");
        let installer = bundle.extract("vcredist", &out).await.unwrap();
        assert_eq!(installer, out.join("vcredist").join("setup.exe"));
        assert!(out.join("vcredist/readme.txt").exists());
        assert!(!out.join("other").exists());
    }

    #[tokio::test]
    async fn test_extract_single_file_resource() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle_path = tmp.path().join("payloads.zip");
        write_bundle(&bundle_path, &[("drivers/chipset.exe", b"MZ")]);

        let bundle = ZipPayloadBundle::open(&bundle_path).unwrap();
        let installer = bundle
            .extract("drivers/chipset.exe", tmp.path())
            .await
            .unwrap();
        assert!(installer.ends_with("drivers/chipset.exe"));
    }

    #[tokio::test]
    async fn test_missing_resource() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle_path = tmp.path().join("payloads.zip");
        write_bundle(&bundle_path, &[("a.txt", b"x")]);

        let bundle = ZipPayloadBundle::open(&bundle_path).unwrap();
        let err = bundle.extract("nope", tmp.path()).await.unwrap_err();
        assert!(matches!(err, InstallError::PayloadNotFound { .. }));
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bogus.zip");
        fs::write(&path, b"not a zip").unwrap();
        assert!(ZipPayloadBundle::open(&path).is_err());
    }
}
