//! Queue entry types.

use unattend_core::{InstallableItem, ItemId};

/// An item plus its enqueue sequence number.
///
/// The sequence breaks ties between items of the same kind; item IDs can
/// come from a manifest and are not guaranteed to follow enqueue order.
#[derive(Debug, Clone)]
pub struct QueueSlot {
    pub seq: u64,
    pub item: InstallableItem,
}

/// Where an admitted item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Entered the visible list, possibly evicting a terminal item.
    Visible { evicted: Option<ItemId> },
    /// Visible list is full of live items; waiting in the backlog.
    Backlog { position: usize },
    /// A terminal backlog item with no room to land; dropped.
    Dropped,
}

/// One backlog promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub promoted: ItemId,
    pub evicted: Option<ItemId>,
}
