//! Answer files written next to the installer.
//!
//! Inno Setup reads `/LOADINF`; NSIS-based repacks commonly look for an
//! options INI in their working directory. Both pre-answer the usual prompts.
//! Writing them is best-effort.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::command_line::{InstallerFramework, quote};

pub const INNO_SCRIPT_NAME: &str = "unattend.inf";
pub const OPTIONS_INI_NAME: &str = "setup.ini";

pub fn inno_script(item_name: &str, install_dir: Option<&Path>) -> String {
    let mut out = String::from("[Setup]\r\nLang=english\r\n");
    if let Some(dir) = install_dir {
        let _ = write!(out, "Dir={}\r\n", dir.display());
    }
    let _ = write!(out, "Group={item_name}\r\n");
    out.push_str("NoIcons=0\r\nTasks=desktopicon\r\n");
    out
}

pub fn options_ini(install_dir: Option<&Path>) -> String {
    let mut out = String::from("[Options]\r\n");
    if let Some(dir) = install_dir {
        let _ = write!(out, "InstallDir={}\r\n", dir.display());
    }
    out.push_str(
        "DesktopShortcut=1\r\n\
         StartMenuShortcut=1\r\n\
         LaunchAfterInstall=0\r\n\
         Telemetry=0\r\n\
         CheckForUpdates=0\r\n",
    );
    out
}

/// Write the sidecars for `framework` into `dir`.
///
/// Returns extra installer arguments (the Inno `/LOADINF` switch). Write
/// failures are logged and produce no arguments.
pub async fn write_sidecars(
    framework: InstallerFramework,
    dir: &Path,
    item_name: &str,
    install_dir: Option<&Path>,
) -> Vec<String> {
    match framework {
        InstallerFramework::Inno => {
            let path = dir.join(INNO_SCRIPT_NAME);
            match write_file(&path, inno_script(item_name, install_dir)).await {
                Some(path) => vec![format!("/LOADINF={}", quote(&path))],
                None => Vec::new(),
            }
        }
        InstallerFramework::Nsis | InstallerFramework::Unknown => {
            write_file(&dir.join(OPTIONS_INI_NAME), options_ini(install_dir)).await;
            Vec::new()
        }
        InstallerFramework::Msi => Vec::new(),
    }
}

async fn write_file(path: &Path, contents: String) -> Option<PathBuf> {
    match tokio::fs::write(path, contents).await {
        Ok(()) => {
            debug!(target: "unattend.install", path = %path.display(), "Wrote answer file");
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!(target: "unattend.install", path = %path.display(), error = %e, "Could not write answer file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inno_script_contents() {
        let script = inno_script("Hades", Some(Path::new(r"D:\Games\Hades")));
        assert!(script.starts_with("[Setup]"));
        assert!(script.contains(r"Dir=D:\Games\Hades"));
        assert!(script.contains("Tasks=desktopicon"));
        assert!(script.contains("NoIcons=0"));
    }

    #[test]
    fn test_options_ini_answers() {
        let ini = options_ini(None);
        assert!(ini.contains("DesktopShortcut=1"));
        assert!(ini.contains("StartMenuShortcut=1"));
        assert!(ini.contains("LaunchAfterInstall=0"));
        assert!(ini.contains("Telemetry=0"));
        assert!(!ini.contains("InstallDir"));
    }

    #[tokio::test]
    async fn test_inno_sidecar_adds_loadinf() {
        let tmp = tempfile::tempdir().unwrap();
        let args = write_sidecars(InstallerFramework::Inno, tmp.path(), "Hades", None).await;
        assert_eq!(args.len(), 1);
        assert!(args[0].starts_with("/LOADINF=\""));
        assert!(tmp.path().join(INNO_SCRIPT_NAME).is_file());
    }

    #[tokio::test]
    async fn test_write_failure_is_ignored() {
        let args = write_sidecars(
            InstallerFramework::Inno,
            Path::new("/definitely/not/here"),
            "Hades",
            None,
        )
        .await;
        assert!(args.is_empty());
    }
}
