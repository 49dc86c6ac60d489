//! Follow-up work scheduled for a later tick.
//!
//! Host events often need a second pass once the host has finished
//! applying them: neighbor proxies are reshaped after a block disappears,
//! a freshly placed head is re-skinned once its state settles, and a loaded
//! region is scanned once its entities are in place. Tasks are keyed by the
//! engine's tick counter and run in (tick, submission) order.

use crate::fixed::Ticks;
use crate::id::VariantId;
use ductwork_spatial::{BlockPos, Facing, RegionKey};
use std::collections::BTreeMap;

/// Ticks between a block change and the reshaping of neighboring proxies.
pub const NEIGHBOR_REFRESH_DELAY: Ticks = 1;
/// Ticks between placing a pipe and re-skinning its head block.
pub const BLOCK_VISUAL_DELAY: Ticks = 2;
/// Ticks between a region load and its restore scan.
pub const RESTORE_DELAY: Ticks = 1;

// ---------------------------------------------------------------------------
// Task enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// Reshape the proxies of pipes whose input or output is `pos`.
    RefreshNeighbors(BlockPos),
    /// Re-skin the head block of a placed pipe.
    RefreshBlockVisual {
        pos: BlockPos,
        variant: VariantId,
        facing: Facing,
    },
    /// Rebuild index entries of a region from its proxies.
    Restore(RegionKey),
}

// ---------------------------------------------------------------------------
// DeferredQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: BTreeMap<Ticks, Vec<DeferredTask>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run on tick `due`.
    pub fn schedule(&mut self, due: Ticks, task: DeferredTask) {
        self.pending.entry(due).or_default().push(task);
    }

    /// Remove and return every task due at or before `tick`, oldest first.
    pub fn drain_due(&mut self, tick: Ticks) -> Vec<DeferredTask> {
        let later = match tick.checked_add(1) {
            Some(next) => self.pending.split_off(&next),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.pending, later);
        due.into_values().flatten().collect()
    }

    /// Number of tasks waiting.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
