//! Inbound host events and the outbound engine event log.
//!
//! The host translates its own block and region notifications into
//! [`WorldEvent`]s and hands them to the engine one at a time. The engine
//! answers each with an [`EventOutcome`] telling the host what to change
//! about its own handling, and records what it did as [`PipeEvent`]s in a
//! bounded [`EventLog`] the host drains at its leisure.

use crate::fixed::Ticks;
use crate::id::VariantId;
use crate::item::ItemStack;
use ductwork_spatial::{BlockPos, Facing, RegionKey};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A block or region change reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// A block was placed. `variant` is set when the item in hand was a pipe.
    BlockPlaced {
        pos: BlockPos,
        /// Face of the clicked block the new block was placed against,
        /// pointing from the clicked block toward `pos`.
        against: Option<Facing>,
        /// Player yaw in degrees, used when `against` is unknown.
        yaw: f32,
        variant: Option<VariantId>,
    },
    /// Broken by a player. The pipe item drops.
    BlockBroken { pos: BlockPos },
    /// Burned away. Nothing drops.
    BlockBurned { pos: BlockPos },
    /// Destroyed by physics or commands. Nothing drops.
    BlockDestroyed { pos: BlockPos },
    /// Blocks caught in an explosion. Each pipe drops with probability `yield_`.
    Explosion { blocks: Vec<BlockPos>, yield_: f32 },
    /// Blocks about to be pushed or pulled by a piston.
    PistonMoved { blocks: Vec<BlockPos> },
    RegionLoaded(RegionKey),
    RegionUnloaded(RegionKey),
}

/// What the host should change about its own handling of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Cancel the host event (e.g. a corner placed against a ceiling).
    pub cancelled: bool,
    /// Positions whose default block drop must be suppressed; the engine
    /// already handled them.
    pub suppress_drops: Vec<BlockPos>,
}

impl EventOutcome {
    pub fn cancel() -> Self {
        Self {
            cancelled: true,
            suppress_drops: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Why a node left the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    Broken,
    Burned,
    Destroyed,
    Exploded,
    Piston,
    /// The block vanished without an event.
    Stale,
    /// Administrative deletion.
    Admin,
}

/// Something the engine did. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEvent {
    NodeRegistered {
        pos: BlockPos,
        variant: VariantId,
        facing: Facing,
        tick: Ticks,
    },
    NodeRemoved {
        pos: BlockPos,
        variant: VariantId,
        cause: RemovalCause,
        tick: Ticks,
    },
    PlacementRejected {
        pos: BlockPos,
        tick: Ticks,
    },
    ItemsMoved {
        from: BlockPos,
        to: BlockPos,
        stack: ItemStack,
        tick: Ticks,
    },
    ItemsDropped {
        at: BlockPos,
        stack: ItemStack,
        tick: Ticks,
    },
    RegionRestored {
        region: RegionKey,
        registered: usize,
        tick: Ticks,
    },
    OrphansRemoved {
        count: usize,
        tick: Ticks,
    },
}

/// Discriminant tag for pipe events, used for suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeEventKind {
    NodeRegistered,
    NodeRemoved,
    PlacementRejected,
    ItemsMoved,
    ItemsDropped,
    RegionRestored,
    OrphansRemoved,
}

const PIPE_EVENT_KIND_COUNT: usize = 7;

impl PipeEventKind {
    fn index(self) -> usize {
        self as usize
    }
}

impl PipeEvent {
    pub fn kind(&self) -> PipeEventKind {
        match self {
            PipeEvent::NodeRegistered { .. } => PipeEventKind::NodeRegistered,
            PipeEvent::NodeRemoved { .. } => PipeEventKind::NodeRemoved,
            PipeEvent::PlacementRejected { .. } => PipeEventKind::PlacementRejected,
            PipeEvent::ItemsMoved { .. } => PipeEventKind::ItemsMoved,
            PipeEvent::ItemsDropped { .. } => PipeEventKind::ItemsDropped,
            PipeEvent::RegionRestored { .. } => PipeEventKind::RegionRestored,
            PipeEvent::OrphansRemoved { .. } => PipeEventKind::OrphansRemoved,
        }
    }

    pub fn tick(&self) -> Ticks {
        match *self {
            PipeEvent::NodeRegistered { tick, .. }
            | PipeEvent::NodeRemoved { tick, .. }
            | PipeEvent::PlacementRejected { tick, .. }
            | PipeEvent::ItemsMoved { tick, .. }
            | PipeEvent::ItemsDropped { tick, .. }
            | PipeEvent::RegionRestored { tick, .. }
            | PipeEvent::OrphansRemoved { tick, .. } => tick,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Bounded buffer of pipe events. When full, the oldest event is dropped.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<PipeEvent>,
    capacity: usize,
    suppressed: [bool; PIPE_EVENT_KIND_COUNT],
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            suppressed: [false; PIPE_EVENT_KIND_COUNT],
            dropped: 0,
        }
    }

    /// Stop recording events of `kind`.
    pub fn suppress(&mut self, kind: PipeEventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: PipeEventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn push(&mut self, event: PipeEvent) {
        if self.capacity == 0 || self.is_suppressed(event.kind()) {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<PipeEvent> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipeEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ductwork_spatial::WorldId;

    fn restored(tick: Ticks) -> PipeEvent {
        PipeEvent::RegionRestored {
            region: RegionKey::new(WorldId(0), 0, 0),
            registered: 1,
            tick,
        }
    }

    #[test]
    fn log_push_and_drain() {
        let mut log = EventLog::new(8);
        log.push(restored(1));
        log.push(PipeEvent::OrphansRemoved { count: 2, tick: 2 });
        assert_eq!(log.len(), 2);
        let events = log.drain();
        assert_eq!(events[0].tick(), 1);
        assert_eq!(events[1].kind(), PipeEventKind::OrphansRemoved);
        assert!(log.is_empty());
    }

    #[test]
    fn log_drops_oldest_when_full() {
        let mut log = EventLog::new(2);
        for t in 0..5 {
            log.push(restored(t));
        }
        let ticks: Vec<Ticks> = log.iter().map(PipeEvent::tick).collect();
        assert_eq!(ticks, vec![3, 4]);
        assert_eq!(log.dropped_count(), 3);
    }

    #[test]
    fn suppressed_kinds_are_not_recorded() {
        let mut log = EventLog::new(8);
        log.suppress(PipeEventKind::RegionRestored);
        log.push(restored(1));
        assert!(log.is_empty());
        assert!(log.is_suppressed(PipeEventKind::RegionRestored));
        assert!(!log.is_suppressed(PipeEventKind::ItemsMoved));
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut log = EventLog::new(0);
        log.push(restored(1));
        assert!(log.is_empty());
        assert_eq!(log.dropped_count(), 0);
    }

    #[test]
    fn cancel_outcome() {
        let outcome = EventOutcome::cancel();
        assert!(outcome.cancelled);
        assert!(outcome.suppress_drops.is_empty());
        assert!(!EventOutcome::default().cancelled);
    }
}
