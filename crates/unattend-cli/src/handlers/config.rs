//! Config command handler.

use anyhow::Result;
use unattend_core::{Settings, effective_local_roots, effective_search_roots, resolve_work_dir};

/// Print the effective settings as JSON, then the derived paths.
pub fn execute(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    println!();
    println!("work_dir = {}", resolve_work_dir(&settings.acquisition)?.display());
    for root in effective_local_roots(&settings.acquisition) {
        println!("local_root = {}", root.display());
    }
    for root in effective_search_roots(&settings.acquisition) {
        println!("search_root = {}", root.display());
    }
    Ok(())
}
