//! Run command handler.
//!
//! Enqueues every manifest entry, starts the queue and renders progress
//! until the run completes. Ctrl-C stops the queue after cancelling the
//! active item.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use unattend_core::{RunSummary, Settings};

use crate::bootstrap::bootstrap;
use crate::error::CliError;
use crate::manifest::load_manifest;
use crate::presentation::{RunProgress, format_summary};

/// A fatal manager error ends the actor without a completion event.
const FATAL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub async fn execute(
    mut settings: Settings,
    manifest: &Path,
    max_visible: Option<u32>,
) -> Result<RunSummary> {
    let entries = load_manifest(manifest)?;
    if let Some(max_visible) = max_visible {
        settings.queue.max_visible = max_visible;
    }
    settings.validate().map_err(CliError::from)?;

    let ctx = bootstrap(settings)?;
    let mut events = ctx.events.subscribe();
    let mut progress = RunProgress::new();

    for entry in entries {
        let item = entry.into_item();
        let name = item.name.clone();
        let id = ctx.manager.enqueue(item).await.map_err(CliError::from)?;
        progress.add(id, &name);
    }
    ctx.manager.start().await.map_err(CliError::from)?;

    let mut stopping = false;
    let mut health = tokio::time::interval(FATAL_CHECK_INTERVAL);
    let summary = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(summary) = progress.apply(&event) {
                        break summary;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Progress display lagged behind events");
                }
                Err(RecvError::Closed) => {
                    anyhow::bail!("install manager stopped before the run completed");
                }
            },
            interrupted = tokio::signal::ctrl_c(), if !stopping => {
                interrupted?;
                stopping = true;
                progress.println("Stopping after the active item is cancelled...");
                ctx.manager.stop().await.map_err(CliError::from)?;
            }
            _ = health.tick() => {
                if let Some(fatal) = ctx.manager.fatal_error() {
                    return Err(CliError::from(fatal).into());
                }
            }
        }
    };

    progress.println(&format_summary(&summary));
    if let Err(e) = ctx.manager.shutdown().await {
        warn!(error = %e, "Install manager did not shut down cleanly");
    }
    Ok(summary)
}
