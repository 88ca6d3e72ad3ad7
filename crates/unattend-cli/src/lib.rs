//! Command-line front end for the unattended installer.
//!
//! `main.rs` parses arguments and dispatches; `bootstrap` is the only place
//! where the runtime adapters are wired into the install engine.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

// Used by the binary only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, bootstrap, build_resolver, load_settings};
pub use commands::Commands;
pub use error::CliError;
pub use manifest::{ManifestEntry, load_manifest, parse_manifest};
pub use parser::Cli;
