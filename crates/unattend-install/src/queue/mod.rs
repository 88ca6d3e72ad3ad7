//! Visible install queue.
//!
//! A pure state machine: a bounded visible list plus an unbounded backlog of
//! waiting items. No I/O is performed here; the manager owns the queue and
//! turns changes into events.
//!
//! # Eviction
//!
//! When the visible list is full and an item must enter, one terminal item
//! leaves: `Completed` before `Failed`/`Cancelled`/`Skipped`, oldest
//! `end_time` first. Waiting and in-flight items are never evicted; if
//! nothing qualifies the newcomer stays in the backlog.

// Queue lengths are bounded by MAX_VISIBLE (≤ 50) and manifest sizes
#![allow(clippy::cast_possible_truncation)]

mod types;

use std::collections::VecDeque;

use unattend_core::{
    InstallError, InstallStatus, InstallableItem, ItemId, ItemSummary, QueueSnapshot,
};

pub use types::{Placement, Promotion, QueueSlot};

/// Bounded visible list with a FIFO backlog.
///
/// Sync type with no internal locking; the manager's actor is the only
/// writer.
pub struct VisibleQueue {
    visible: Vec<QueueSlot>,
    backlog: VecDeque<QueueSlot>,
    max_visible: usize,
    next_seq: u64,
}

impl VisibleQueue {
    /// Create a queue with the given visible capacity (at least 1).
    pub fn new(max_visible: u32) -> Self {
        Self {
            visible: Vec::new(),
            backlog: VecDeque::new(),
            max_visible: (max_visible as usize).max(1),
            next_seq: 0,
        }
    }

    pub const fn max_visible(&self) -> usize {
        self.max_visible
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.backlog.is_empty()
    }

    /// Whether the item is in the visible list.
    pub fn is_visible(&self, id: ItemId) -> bool {
        self.visible.iter().any(|slot| slot.item.id == id)
    }

    /// Visible items, in display order.
    pub fn visible_items(&self) -> impl Iterator<Item = &InstallableItem> {
        self.visible.iter().map(|slot| &slot.item)
    }

    /// Every item the queue holds, visible first.
    pub fn items(&self) -> impl Iterator<Item = &InstallableItem> {
        self.visible
            .iter()
            .chain(self.backlog.iter())
            .map(|slot| &slot.item)
    }

    pub fn get(&self, id: ItemId) -> Option<&InstallableItem> {
        self.items().find(|item| item.id == id)
    }

    /// Number of items currently `Installing`.
    pub fn installing_count(&self) -> usize {
        self.items()
            .filter(|item| item.status == InstallStatus::Installing)
            .count()
    }

    /// Whether any item could still be started.
    pub fn has_waiting(&self) -> bool {
        self.items().any(|item| item.status == InstallStatus::Waiting)
    }

    /// Add a new item. It enters the visible list if there is room (or a
    /// terminal item can be evicted), otherwise the backlog.
    pub fn push(&mut self, item: InstallableItem) -> Result<Placement, InstallError> {
        if self.get(item.id).is_some() {
            return Err(InstallError::other(format!("Item {} is already queued", item.id)));
        }
        let slot = QueueSlot {
            seq: self.next_seq,
            item,
        };
        self.next_seq += 1;

        // Keep FIFO order: nothing jumps ahead of an existing backlog.
        if !self.backlog.is_empty() {
            self.backlog.push_back(slot);
            return Ok(Placement::Backlog {
                position: self.backlog.len(),
            });
        }
        Ok(self.admit(slot))
    }

    fn admit(&mut self, slot: QueueSlot) -> Placement {
        if self.visible.len() < self.max_visible {
            self.visible.push(slot);
            return Placement::Visible { evicted: None };
        }
        if let Some(evicted) = self.evict_one() {
            self.visible.push(slot);
            return Placement::Visible {
                evicted: Some(evicted),
            };
        }
        if slot.item.status.is_terminal() {
            return Placement::Dropped;
        }
        self.backlog.push_back(slot);
        Placement::Backlog {
            position: self.backlog.len(),
        }
    }

    /// Remove the best eviction candidate, if any.
    fn evict_one(&mut self) -> Option<ItemId> {
        let index = self
            .visible
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.item.status.is_terminal())
            .min_by_key(|(_, slot)| {
                let class = u8::from(slot.item.status != InstallStatus::Completed);
                (class, slot.item.end_time, slot.seq)
            })
            .map(|(index, _)| index)?;
        Some(self.visible.remove(index).item.id)
    }

    /// Move backlog items into the visible list while they fit.
    pub fn promote_backlog(&mut self) -> Vec<Promotion> {
        let mut promotions = Vec::new();
        while let Some(front) = self.backlog.front() {
            let fits = self.visible.len() < self.max_visible
                || self.visible.iter().any(|slot| slot.item.status.is_terminal());
            if !fits {
                break;
            }
            let promoted = front.item.id;
            let Some(slot) = self.backlog.pop_front() else {
                break;
            };
            if let Placement::Visible { evicted } = self.admit(slot) {
                promotions.push(Promotion { promoted, evicted });
            }
        }
        promotions
    }

    /// Pick the next item to start.
    ///
    /// Waiting visible items in kind order (drivers, programs, games), then
    /// enqueue order. With no visible candidate the backlog front is
    /// promoted first.
    pub fn next_waiting(&mut self) -> Option<ItemId> {
        if let Some(id) = self.best_visible_waiting() {
            return Some(id);
        }
        self.promote_backlog();
        self.best_visible_waiting()
    }

    fn best_visible_waiting(&self) -> Option<ItemId> {
        self.visible
            .iter()
            .filter(|slot| slot.item.status == InstallStatus::Waiting)
            .min_by_key(|slot| (slot.item.kind.priority(), slot.seq))
            .map(|slot| slot.item.id)
    }

    /// Apply a validated status change and return the item as it now
    /// stands.
    ///
    /// A backlog item that leaves `Waiting` moves to the visible list (or is
    /// dropped when terminal and there is no room), so the backlog only ever
    /// holds waiting items. The returned summary is taken before any move,
    /// so it is valid even for a dropped item.
    pub fn transition(
        &mut self,
        id: ItemId,
        to: InstallStatus,
    ) -> Result<ItemSummary, InstallError> {
        self.settle(id, to, None)
    }

    /// Mark an item failed with a reason.
    pub fn fail(&mut self, id: ItemId, error: &InstallError) -> Result<ItemSummary, InstallError> {
        self.settle(id, InstallStatus::Failed, Some(error.user_message()))
    }

    fn settle(
        &mut self,
        id: ItemId,
        to: InstallStatus,
        error: Option<String>,
    ) -> Result<ItemSummary, InstallError> {
        if let Some(slot) = self.visible.iter_mut().find(|slot| slot.item.id == id) {
            slot.item.transition(to)?;
            if error.is_some() {
                slot.item.last_error = error;
            }
            return Ok(ItemSummary::from(&slot.item));
        }

        let index = self
            .backlog
            .iter()
            .position(|slot| slot.item.id == id)
            .ok_or_else(|| InstallError::not_in_queue(id))?;
        let slot = &mut self.backlog[index];
        slot.item.transition(to)?;
        if error.is_some() {
            slot.item.last_error = error;
        }
        let summary = ItemSummary::from(&slot.item);
        if to != InstallStatus::Waiting {
            if let Some(slot) = self.backlog.remove(index) {
                self.admit(slot);
            }
        }
        Ok(summary)
    }

    /// Record progress for the installing item. Returns `true` if it moved.
    pub fn record_progress(&mut self, id: ItemId, percent: u8) -> bool {
        self.visible
            .iter_mut()
            .find(|slot| slot.item.id == id)
            .is_some_and(|slot| slot.item.record_progress(percent))
    }

    /// Drop every terminal item from the visible list, then refill it.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.visible.len();
        self.visible.retain(|slot| !slot.item.status.is_terminal());
        let removed = before - self.visible.len();
        self.promote_backlog();
        removed
    }

    /// Read-only view for observers.
    pub fn snapshot(&self, active: Option<ItemId>) -> QueueSnapshot {
        QueueSnapshot {
            items: self.visible_items().map(ItemSummary::from).collect(),
            max_visible: self.max_visible as u32,
            backlog_count: self.backlog.len() as u32,
            active,
        }
    }
}
