//! Resolve command handler.
//!
//! Runs only the acquisition resolver for one manifest entry and prints
//! where the payload came from. Nothing is installed.

use std::path::Path;

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;
use unattend_core::{DownloadProgress, InstallStatus, Settings};
use unattend_install::AcquisitionObserver;

use crate::bootstrap::{build_resolver, prepare_work_dir};
use crate::error::CliError;
use crate::manifest::{find_entry, load_manifest};

struct PrintingObserver;

impl AcquisitionObserver for PrintingObserver {
    fn stage(&self, status: InstallStatus) {
        eprintln!("{status}...");
    }

    fn download_progress(&self, progress: DownloadProgress) {
        if let Some(percent) = progress.percent() {
            eprint!("\r{percent:>3}%");
        }
    }
}

pub async fn execute(settings: &Settings, manifest: &Path, name: &str) -> Result<()> {
    let entries = load_manifest(manifest)?;
    let Some(entry) = find_entry(&entries, name) else {
        bail!("no entry named '{name}' in {}", manifest.display());
    };
    let item = entry.clone().into_item();

    let work_dir = prepare_work_dir(settings)?;
    let resolver = build_resolver(settings, &work_dir);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let payload = resolver
        .resolve(&item, &PrintingObserver, &cancel)
        .await
        .map_err(CliError::from)?;

    println!("{}", payload.path.display());
    println!("source = {:?}", payload.source);
    Ok(())
}
