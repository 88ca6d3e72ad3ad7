//! Subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Install every item of a manifest, one at a time
    Run {
        /// Manifest file (JSON array of items)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Override the visible queue size
        #[arg(long)]
        max_visible: Option<u32>,
    },

    /// Find the payload for one manifest item without installing it
    Resolve {
        #[arg(short, long)]
        manifest: PathBuf,
        /// Item name as written in the manifest
        #[arg(short, long)]
        name: String,
    },

    /// Show how a name is normalized for directory matching
    Normalize {
        name: String,
    },

    /// Print the effective settings as JSON
    Config,
}
