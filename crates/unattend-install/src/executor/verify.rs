//! Post-install verification of the install directory.

use std::path::{Path, PathBuf};

use unattend_core::InstallError;
use walkdir::WalkDir;

/// How deep to look for files below the install directory.
const VERIFY_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub files: usize,
    pub has_executable: bool,
}

/// Check that `dir` looks like an installed program.
///
/// Passes with at least one file plus either an `.exe` or more than
/// `min_files` files in total.
pub fn verify_install_dir(dir: &Path, min_files: usize) -> Result<VerifyReport, InstallError> {
    if !dir.is_dir() {
        return Err(InstallError::verification_failed(format!(
            "{} does not exist",
            dir.display()
        )));
    }

    let mut report = VerifyReport {
        files: 0,
        has_executable: false,
    };
    for entry in WalkDir::new(dir)
        .max_depth(VERIFY_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        report.files += 1;
        if entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
        {
            report.has_executable = true;
        }
        if report.has_executable && report.files > min_files {
            break;
        }
    }

    if report.files == 0 {
        return Err(InstallError::verification_failed(format!(
            "{} is empty",
            dir.display()
        )));
    }
    if !report.has_executable && report.files <= min_files {
        return Err(InstallError::verification_failed(format!(
            "{} has {} files and no executable",
            dir.display(),
            report.files
        )));
    }
    Ok(report)
}

/// [`verify_install_dir`] on the blocking pool.
pub async fn verify_install_dir_async(
    dir: PathBuf,
    min_files: usize,
) -> Result<VerifyReport, InstallError> {
    tokio::task::spawn_blocking(move || verify_install_dir(&dir, min_files))
        .await
        .map_err(|e| InstallError::other(format!("verification task failed: {e}")))?
}
