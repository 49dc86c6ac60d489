//! Per-node item transfer and the polling schedule that drives it.

use crate::catalog::VariantCatalog;
use crate::fixed::{Fixed64, Millis, Ticks, Vec3, f64_to_fixed64};
use crate::index::{PipeNode, SpatialNodeIndex};
use crate::item::ItemStack;
use crate::resolver::{Resolution, resolve};
use crate::rng::SimRng;
use crate::sim::{DropConfig, EngineConfig};
use crate::world::{BlockKind, ItemDrop, World};
use ductwork_spatial::{BlockPos, Facing};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a service attempt moved nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    /// Corner pipes never pull.
    Corner,
    /// No container behind the pipe.
    NoSource,
    /// The source container is empty.
    EmptySource,
    /// The destination cannot take the whole amount.
    DestinationFull,
}

/// Result of one service attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    Idle(IdleReason),
    /// Items went from the container behind the pipe into a container.
    Moved {
        from: BlockPos,
        to: BlockPos,
        stack: ItemStack,
    },
    /// Items were thrown out of an open pipe end.
    Dropped { last: BlockPos, stack: ItemStack },
    /// The pipe block no longer exists. The caller drops the index entry.
    Stale,
}

// ---------------------------------------------------------------------------
// Drop geometry
// ---------------------------------------------------------------------------

/// Fixed-point copy of [`DropConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropShape {
    pub base_speed: Fixed64,
    pub spread: Fixed64,
    pub exit_offset: Fixed64,
    pub horizontal_height: Fixed64,
    pub vertical_height: Fixed64,
    pub down_nudge: Fixed64,
}

impl From<&DropConfig> for DropShape {
    fn from(cfg: &DropConfig) -> Self {
        Self {
            base_speed: f64_to_fixed64(cfg.base_speed),
            spread: f64_to_fixed64(cfg.spread),
            exit_offset: f64_to_fixed64(cfg.exit_offset),
            horizontal_height: f64_to_fixed64(cfg.horizontal_height),
            vertical_height: f64_to_fixed64(cfg.vertical_height),
            down_nudge: f64_to_fixed64(cfg.down_nudge),
        }
    }
}

impl DropShape {
    /// Spawn point just outside the output face of the pipe at `last`.
    pub fn position(&self, last: BlockPos, facing: Facing) -> Vec3 {
        let half = Fixed64::from_num(0.5);
        let height = if facing.is_vertical() {
            self.vertical_height
        } else {
            self.horizontal_height
        };
        let base = Vec3::from_offset((last.x, last.y, last.z))
            + Vec3::new(half, height, half);
        let mut pos = base + Vec3::from_offset(facing.offset()) * self.exit_offset;
        if facing == Facing::Down {
            pos.y = pos.y.saturating_sub(self.down_nudge);
        }
        pos
    }

    /// Outward velocity with a small random jitter on every axis.
    pub fn velocity(&self, facing: Facing, rng: &mut SimRng) -> Vec3 {
        let speed = if facing == Facing::Down {
            Fixed64::ZERO
        } else {
            self.base_speed
        };
        let outward = Vec3::from_offset(facing.offset()) * speed;
        let jitter = Vec3::new(
            rng.jitter(self.spread),
            rng.jitter(self.spread),
            rng.jitter(self.spread),
        );
        outward + jitter
    }
}

// ---------------------------------------------------------------------------
// Service attempt
// ---------------------------------------------------------------------------

/// Move at most one stack's worth of items for `node`.
///
/// Never partially inserts into a container. When the resolved destination
/// cannot take the whole amount the source is left untouched.
pub fn service_node(
    index: &SpatialNodeIndex,
    world: &mut dyn World,
    node: &PipeNode,
    shape: &DropShape,
    rng: &mut SimRng,
) -> ServiceOutcome {
    if node.is_corner() {
        return ServiceOutcome::Idle(IdleReason::Corner);
    }
    if world.block_kind(node.pos) != BlockKind::PipeHead {
        return ServiceOutcome::Stale;
    }

    let source_pos = node.source_pos();
    let Some(source) = world.container(source_pos) else {
        return ServiceOutcome::Idle(IdleReason::NoSource);
    };
    let Some((slot, stack)) = (0..source.size())
        .find_map(|slot| source.get(slot).filter(|s| !s.is_empty()).map(|s| (slot, s)))
    else {
        return ServiceOutcome::Idle(IdleReason::EmptySource);
    };

    let resolution = resolve(
        index,
        &*world,
        node.pos,
        node.facing,
        node.variant.items_per_transfer,
    );
    let amount = stack.quantity.min(resolution.flow_cap());
    let outgoing = stack.with_quantity(amount);

    let (moved, outcome) = match resolution {
        Resolution::Container { pos, .. } => {
            let Some(dest) = world.container_mut(pos) else {
                return ServiceOutcome::Idle(IdleReason::DestinationFull);
            };
            if !dest.can_accept(&outgoing) {
                return ServiceOutcome::Idle(IdleReason::DestinationFull);
            }
            let inserted = match dest.add(outgoing.clone()) {
                None => amount,
                Some(leftover) => {
                    tracing::warn!(
                        dest = %pos,
                        leftover = leftover.quantity,
                        "container accepted less than it reported room for"
                    );
                    amount.saturating_sub(leftover.quantity)
                }
            };
            if inserted == 0 {
                return ServiceOutcome::Idle(IdleReason::DestinationFull);
            }
            let moved = outgoing.with_quantity(inserted);
            (
                inserted,
                ServiceOutcome::Moved {
                    from: source_pos,
                    to: pos,
                    stack: moved,
                },
            )
        }
        Resolution::OpenDrop { last, facing, .. } => {
            world.spawn_item(ItemDrop {
                world: last.world,
                stack: outgoing.clone(),
                position: shape.position(last, facing),
                velocity: shape.velocity(facing, rng),
            });
            (
                amount,
                ServiceOutcome::Dropped {
                    last,
                    stack: outgoing,
                },
            )
        }
    };

    debit(world, source_pos, slot, moved);
    outcome
}

/// Remove `amount` from a source slot, clearing it at zero.
fn debit(world: &mut dyn World, pos: BlockPos, slot: usize, amount: u32) {
    let Some(source) = world.container_mut(pos) else {
        return;
    };
    if let Some(mut current) = source.get(slot) {
        let _ = current.take(amount);
        source.set(slot, if current.is_empty() { None } else { Some(current) });
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Decides which ticks run a polling pass and which nodes are due on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferScheduler {
    poll_interval: Ticks,
    start_delay: Ticks,
    tick_duration_ms: Millis,
    /// Tick at which the current schedule was (re)started.
    started_at: Option<Ticks>,
}

impl TransferScheduler {
    pub fn new(catalog: &VariantCatalog, config: &EngineConfig) -> Self {
        Self {
            poll_interval: Self::poll_interval_for(catalog, config.default_interval_ticks),
            start_delay: config.start_delay_ticks,
            tick_duration_ms: config.tick_duration_ms,
            started_at: None,
        }
    }

    /// The fastest variant interval, never slower than `default_interval`
    /// and never below one tick.
    pub fn poll_interval_for(catalog: &VariantCatalog, default_interval: u32) -> Ticks {
        let fastest = catalog
            .fastest_interval()
            .map_or(default_interval, |f| f.min(default_interval));
        Ticks::from(fastest.max(1))
    }

    pub fn poll_interval(&self) -> Ticks {
        self.poll_interval
    }

    pub fn start(&mut self, tick: Ticks) {
        self.started_at = Some(tick);
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Whether `tick` falls on an `every`-tick cadence that begins with
    /// the first polling pass.
    pub fn is_cadence_tick(&self, tick: Ticks, every: Ticks) -> bool {
        let Some(started) = self.started_at else {
            return false;
        };
        let first = started + self.start_delay;
        tick >= first && (tick - first) % every.max(1) == 0
    }

    /// Recompute the polling interval and restart the schedule.
    ///
    /// `node_intervals` are the intervals of live nodes, which may still
    /// hold variants the new catalog dropped. Polling is fast enough for
    /// those too.
    pub fn restart(
        &mut self,
        catalog: &VariantCatalog,
        config: &EngineConfig,
        node_intervals: impl IntoIterator<Item = u32>,
        tick: Ticks,
    ) {
        *self = Self::new(catalog, config);
        if let Some(fastest) = node_intervals.into_iter().min() {
            self.poll_interval = self.poll_interval.min(Ticks::from(fastest.max(1)));
        }
        self.start(tick);
    }

    /// Whether `tick` runs a polling pass.
    pub fn is_poll_tick(&self, tick: Ticks) -> bool {
        self.is_cadence_tick(tick, self.poll_interval)
    }

    /// Whether `node` is due for service at wall-clock time `now`.
    pub fn is_due(&self, node: &PipeNode, now: Millis) -> bool {
        let interval_ms = u64::from(node.variant.interval_ticks) * self.tick_duration_ms;
        node.last_service
            .is_none_or(|last| now.saturating_sub(last) >= interval_ms)
    }

    /// Service every due node once. Stale nodes are removed from the index.
    pub fn poll(
        &self,
        index: &mut SpatialNodeIndex,
        world: &mut dyn World,
        now: Millis,
        shape: &DropShape,
        rng: &mut SimRng,
    ) -> Vec<(PipeNode, ServiceOutcome)> {
        let due: Vec<PipeNode> = index
            .iter()
            .filter(|node| self.is_due(node, now))
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(due.len());
        for node in due {
            let outcome = service_node(index, world, &node, shape, rng);
            tracing::debug!(pos = %node.pos, ?outcome, "serviced pipe");
            if outcome == ServiceOutcome::Stale {
                tracing::debug!(pos = %node.pos, "dropping stale pipe entry");
                index.unregister(node.pos);
            } else {
                index.touch(node.pos, now);
            }
            results.push((node, outcome));
        }
        results
    }
}
