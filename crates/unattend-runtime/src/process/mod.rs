//! Process adapters: the process table, graceful close and the launcher.

mod launcher;
mod signal;
mod table;

pub use launcher::{TokioInstallerLauncher, TokioInstallerProcess};
pub use table::SysinfoProcessTable;
