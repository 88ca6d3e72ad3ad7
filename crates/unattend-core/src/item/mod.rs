//! Item model: the installable unit, its status machine, and snapshots.

mod model;
mod snapshot;
mod status;

pub use model::{InstallStrategy, InstallableItem, ItemId, ItemKind};
pub use snapshot::{ItemSummary, QueueSnapshot, RunSummary};
pub use status::InstallStatus;
