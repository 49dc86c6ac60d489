//! The pipe engine: owns the node index and orchestrates transfers, host
//! events, deferred follow-ups and reconciliation.
//!
//! # Architecture
//!
//! The `PipeEngine` owns:
//! - A shared [`VariantCatalog`]
//! - The [`SpatialNodeIndex`] of every loaded pipe
//! - A [`TransferScheduler`] deciding which ticks poll
//! - A [`DeferredQueue`] of follow-up work keyed by tick
//! - A [`SimRng`] for drop jitter and explosion rolls
//! - An [`EventLog`] the host drains
//!
//! The world is never owned. Every operation that reads or changes blocks,
//! inventories or proxies borrows it as `&mut dyn World` for the call.
//!
//! # Step
//!
//! Each `step()` runs:
//! 1. **Advance** -- increment the tick counter
//! 2. **Deferred** -- run follow-up tasks due this tick
//! 3. **Transfer** -- on polling ticks, service every due node

use crate::catalog::VariantCatalog;
use crate::deferred::{
    BLOCK_VISUAL_DELAY, DeferredQueue, DeferredTask, NEIGHBOR_REFRESH_DELAY, RESTORE_DELAY,
};
use crate::event::{EventLog, EventOutcome, PipeEvent, PipeEventKind, RemovalCause, WorldEvent};
use crate::fixed::{Fixed64, Millis, Ticks};
use crate::id::VariantId;
use crate::index::{PipeNode, SpatialNodeIndex};
use crate::marker::{self, MarkerRole};
use crate::pose::{pose_for, roles_for};
use crate::reconcile::{ScanMode, ScanReport, scan_region, scan_world};
use crate::rng::SimRng;
use crate::sim::{EngineConfig, SimState, StateHash, StepReport};
use crate::transfer::{DropShape, ServiceOutcome, TransferScheduler};
use crate::world::{BlockKind, World};
use ductwork_spatial::{BlockPos, Facing, RegionKey, WorldId};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// PipeEngine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PipeEngine {
    catalog: Arc<VariantCatalog>,
    config: EngineConfig,
    shape: DropShape,
    index: SpatialNodeIndex,
    scheduler: TransferScheduler,
    deferred: DeferredQueue,
    rng: SimRng,
    events: EventLog,
    pub sim_state: SimState,
}

impl PipeEngine {
    pub fn new(catalog: Arc<VariantCatalog>, config: EngineConfig) -> Self {
        Self {
            shape: DropShape::from(&config.drop),
            scheduler: TransferScheduler::new(&catalog, &config),
            rng: SimRng::new(config.rng_seed),
            catalog,
            config,
            index: SpatialNodeIndex::new(),
            deferred: DeferredQueue::new(),
            events: EventLog::default(),
            sim_state: SimState::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Restore every loaded region and start the polling schedule.
    pub fn start(&mut self, world: &mut dyn World) -> ScanReport {
        let mut regions = world.loaded_regions();
        regions.sort();
        let mut report = ScanReport::default();
        for region in regions {
            report.merge(self.restore_region(world, region));
        }
        self.scheduler.start(self.sim_state.tick);
        tracing::info!(
            restored = report.registered.len(),
            poll_interval = self.scheduler.poll_interval(),
            "pipe engine started"
        );
        report
    }

    /// Stop polling and forget all state. Touches no blocks or proxies.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.deferred.clear();
        self.index.clear();
        tracing::info!("pipe engine shut down");
    }

    /// Swap in a new catalog and restart the polling schedule at the new
    /// granularity. Existing nodes pick up their variant's new definition;
    /// nodes whose variant vanished keep the old one and are still polled
    /// at its interval.
    pub fn reload(&mut self, catalog: Arc<VariantCatalog>) {
        let missing = self.index.rebind_variants(&catalog);
        if missing > 0 {
            tracing::warn!(missing, "pipes kept variants absent from the reloaded catalog");
        }
        self.catalog = catalog;
        let was_running = self.scheduler.is_running();
        self.scheduler.restart(
            &self.catalog,
            &self.config,
            self.index.iter().map(|node| node.variant.interval_ticks),
            self.sim_state.tick,
        );
        if !was_running {
            self.scheduler.stop();
        }
        tracing::info!(
            variants = self.catalog.len(),
            poll_interval = self.scheduler.poll_interval(),
            "pipe catalog reloaded"
        );
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one host tick. `now` is the host's wall clock in milliseconds.
    pub fn step(&mut self, world: &mut dyn World, now: Millis) -> StepReport {
        self.sim_state.tick += 1;
        let tick = self.sim_state.tick;
        let mut report = StepReport {
            tick,
            ..StepReport::default()
        };

        for task in self.deferred.drain_due(tick) {
            self.run_task(world, task);
            report.deferred += 1;
        }

        if self.scheduler.is_poll_tick(tick) {
            report.polled = true;
            let results =
                self.scheduler
                    .poll(&mut self.index, world, now, &self.shape, &mut self.rng);
            report.serviced = results.len();
            for (node, outcome) in results {
                match outcome {
                    ServiceOutcome::Moved { from, to, stack } => {
                        report.moved += 1;
                        self.events.push(PipeEvent::ItemsMoved {
                            from,
                            to,
                            stack,
                            tick,
                        });
                    }
                    ServiceOutcome::Dropped { last, stack } => {
                        report.dropped += 1;
                        self.events.push(PipeEvent::ItemsDropped {
                            at: last,
                            stack,
                            tick,
                        });
                    }
                    ServiceOutcome::Stale => {
                        report.stale += 1;
                        self.events.push(PipeEvent::NodeRemoved {
                            pos: node.pos,
                            variant: node.variant.id.clone(),
                            cause: RemovalCause::Stale,
                            tick,
                        });
                    }
                    ServiceOutcome::Idle(_) => {}
                }
            }
        }

        let debug = &self.config.debug;
        if debug.highlight_pipes
            && self.scheduler.is_cadence_tick(tick, debug.highlight_interval_ticks)
        {
            for node in self.index.iter() {
                world.highlight_pipe(node.pos);
            }
            report.highlighted = self.index.len();
        }

        report
    }

    fn run_task(&mut self, world: &mut dyn World, task: DeferredTask) {
        match task {
            DeferredTask::RefreshNeighbors(pos) => self.refresh_neighbors(world, pos),
            DeferredTask::RefreshBlockVisual {
                pos,
                variant,
                facing,
            } => {
                if world.block_kind(pos) != BlockKind::PipeHead {
                    return;
                }
                if let Some(variant) = self.catalog.get(&variant) {
                    world.refresh_block_visual(pos, variant, facing);
                }
            }
            DeferredTask::Restore(region) => {
                if world.loaded_regions().contains(&region) {
                    self.restore_region(world, region);
                }
            }
        }
    }

    fn restore_region(&mut self, world: &mut dyn World, region: RegionKey) -> ScanReport {
        let tick = self.sim_state.tick;
        let report = scan_region(
            &mut self.index,
            world,
            &self.catalog,
            region,
            ScanMode::Restore,
        );
        if !report.registered.is_empty() {
            tracing::info!(
                world = region.world.0,
                region_x = region.x,
                region_z = region.z,
                count = report.registered.len(),
                "restored pipes"
            );
            self.events.push(PipeEvent::RegionRestored {
                region,
                registered: report.registered.len(),
                tick,
            });
        }
        if report.removed > 0 {
            self.events.push(PipeEvent::OrphansRemoved {
                count: report.removed,
                tick,
            });
        }
        report
    }

    // -----------------------------------------------------------------------
    // Host events
    // -----------------------------------------------------------------------

    /// Apply one host event.
    pub fn handle_event(&mut self, world: &mut dyn World, event: WorldEvent) -> EventOutcome {
        match event {
            WorldEvent::BlockPlaced {
                pos,
                against,
                yaw,
                variant,
            } => self.on_place(world, pos, against, yaw, variant),
            WorldEvent::BlockBroken { pos } => {
                self.on_single_removal(world, pos, true, RemovalCause::Broken)
            }
            WorldEvent::BlockBurned { pos } => {
                // Fire leaves no drop to suppress.
                self.remove_pipe(world, pos, false, RemovalCause::Burned);
                self.schedule_neighbor_refresh(pos);
                EventOutcome::default()
            }
            WorldEvent::BlockDestroyed { pos } => {
                self.on_single_removal(world, pos, false, RemovalCause::Destroyed)
            }
            WorldEvent::Explosion { blocks, yield_ } => self.on_explosion(world, blocks, yield_),
            WorldEvent::PistonMoved { blocks } => self.on_piston(world, blocks),
            WorldEvent::RegionLoaded(region) => {
                self.deferred
                    .schedule(self.sim_state.tick + RESTORE_DELAY, DeferredTask::Restore(region));
                EventOutcome::default()
            }
            WorldEvent::RegionUnloaded(region) => {
                let evicted = self.index.evict_region(region);
                tracing::debug!(
                    world = region.world.0,
                    region_x = region.x,
                    region_z = region.z,
                    evicted,
                    "evicted region"
                );
                EventOutcome::default()
            }
        }
    }

    fn on_place(
        &mut self,
        world: &mut dyn World,
        pos: BlockPos,
        against: Option<Facing>,
        yaw: f32,
        variant: Option<VariantId>,
    ) -> EventOutcome {
        let variant = match variant {
            Some(id) => match self.catalog.get(&id) {
                Some(v) => Some(Arc::clone(v)),
                None => {
                    tracing::warn!(variant = %id, pos = %pos, "placed unknown pipe variant");
                    None
                }
            },
            None => None,
        };

        if let Some(variant) = variant {
            let mut facing = against.unwrap_or_else(|| Facing::from_yaw(yaw));
            // Corners point away from the clicked face.
            if variant.is_corner() {
                facing = facing.opposite();
            }
            if !variant.allows_facing(facing) {
                self.events.push(PipeEvent::PlacementRejected {
                    pos,
                    tick: self.sim_state.tick,
                });
                return EventOutcome::cancel();
            }

            if let Some(old) = self.index.unregister(pos) {
                self.remove_proxies(world, &old);
            }
            world.set_block(pos, BlockKind::PipeHead);
            self.deferred.schedule(
                self.sim_state.tick + BLOCK_VISUAL_DELAY,
                DeferredTask::RefreshBlockVisual {
                    pos,
                    variant: variant.id.clone(),
                    facing,
                },
            );

            let proxies = roles_for(variant.behavior)
                .iter()
                .map(|&role| {
                    let tag = marker::encode(pos, facing, &variant.id, role);
                    let pose = pose_for(&self.index, &*world, pos, facing, variant.behavior, role);
                    world.spawn_proxy(pos, &tag, &pose)
                })
                .collect();
            self.events.push(PipeEvent::NodeRegistered {
                pos,
                variant: variant.id.clone(),
                facing,
                tick: self.sim_state.tick,
            });
            tracing::debug!(pos = %pos, variant = %variant.id, %facing, "placed pipe");
            self.index.register(pos, facing, variant, proxies);
        }

        self.refresh_neighbors(world, pos);
        EventOutcome::default()
    }

    fn on_single_removal(
        &mut self,
        world: &mut dyn World,
        pos: BlockPos,
        drop_item: bool,
        cause: RemovalCause,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        if self.remove_pipe(world, pos, drop_item, cause).is_some() {
            outcome.suppress_drops.push(pos);
        }
        self.schedule_neighbor_refresh(pos);
        outcome
    }

    fn on_explosion(
        &mut self,
        world: &mut dyn World,
        blocks: Vec<BlockPos>,
        yield_: f32,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        let chance = if yield_.is_finite() {
            Fixed64::from_num(yield_.clamp(0.0, 1.0))
        } else {
            Fixed64::ZERO
        };
        for pos in blocks {
            if !self.index.contains(pos) {
                continue;
            }
            let drop_item = self.rng.chance(chance);
            if self
                .remove_pipe(world, pos, drop_item, RemovalCause::Exploded)
                .is_some()
            {
                world.set_block(pos, BlockKind::Air);
                outcome.suppress_drops.push(pos);
            }
        }
        for &pos in &outcome.suppress_drops {
            self.schedule_neighbor_refresh(pos);
        }
        outcome
    }

    fn on_piston(&mut self, world: &mut dyn World, blocks: Vec<BlockPos>) -> EventOutcome {
        let mut affected = Vec::new();
        for pos in blocks {
            if self
                .remove_pipe(world, pos, true, RemovalCause::Piston)
                .is_some()
            {
                world.set_block(pos, BlockKind::Air);
                affected.push(pos);
            }
        }
        for pos in affected {
            self.schedule_neighbor_refresh(pos);
        }
        EventOutcome::default()
    }

    fn schedule_neighbor_refresh(&mut self, pos: BlockPos) {
        self.deferred.schedule(
            self.sim_state.tick + NEIGHBOR_REFRESH_DELAY,
            DeferredTask::RefreshNeighbors(pos),
        );
    }

    // -----------------------------------------------------------------------
    // Node removal and proxy upkeep
    // -----------------------------------------------------------------------

    /// Unregister the pipe at `pos` and delete its proxies. Returns the
    /// removed node, or `None` if no pipe was registered there.
    pub fn remove_pipe(
        &mut self,
        world: &mut dyn World,
        pos: BlockPos,
        drop_item: bool,
        cause: RemovalCause,
    ) -> Option<PipeNode> {
        let node = self.index.unregister(pos)?;
        self.remove_proxies(world, &node);
        if drop_item {
            world.drop_pipe_item(pos, &node.variant);
        }
        self.events.push(PipeEvent::NodeRemoved {
            pos,
            variant: node.variant.id.clone(),
            cause,
            tick: self.sim_state.tick,
        });
        tracing::debug!(pos = %pos, ?cause, "removed pipe");
        Some(node)
    }

    /// Delete a node's proxies by id. If any id is stale, also delete every
    /// nearby proxy whose marker points at the node's block.
    fn remove_proxies(&self, world: &mut dyn World, node: &PipeNode) {
        let mut all_removed = !node.proxies.is_empty();
        for &id in &node.proxies {
            if !world.remove_proxy(id) {
                all_removed = false;
            }
        }
        if all_removed {
            return;
        }
        for proxy in world.proxies_near(node.pos) {
            let matches = proxy
                .tags
                .iter()
                .any(|tag| marker::matches_position(tag, node.pos));
            if matches {
                world.remove_proxy(proxy.id);
            }
        }
    }

    /// Reshape the proxies of every pipe whose input or output is `pos`.
    fn refresh_neighbors(&self, world: &mut dyn World, pos: BlockPos) {
        for face in Facing::all() {
            let adjacent = pos.offset(face);
            let Some(node) = self.index.lookup(adjacent) else {
                continue;
            };
            if face == node.facing || face == node.facing.opposite() {
                self.refresh_proxies(world, adjacent);
            }
        }
    }

    fn refresh_proxies(&self, world: &mut dyn World, pos: BlockPos) {
        let Some(node) = self.index.lookup(pos) else {
            return;
        };
        let roles = roles_for(node.variant.behavior);
        for (i, &id) in node.proxies.iter().enumerate() {
            let role = roles.get(i).copied().unwrap_or(MarkerRole::Primary);
            let pose = pose_for(
                &self.index,
                &*world,
                pos,
                node.facing,
                node.variant.behavior,
                role,
            );
            world.set_proxy_pose(id, &pose);
        }
    }

    // -----------------------------------------------------------------------
    // Administrative surface
    // -----------------------------------------------------------------------

    pub fn counts_by_variant(&self) -> BTreeMap<VariantId, usize> {
        self.index.counts_by_variant()
    }

    pub fn total_nodes(&self) -> usize {
        self.index.len()
    }

    /// Proxies in the loaded regions of `world_id` whose block is no longer
    /// a pipe head. Changes nothing.
    pub fn count_orphans(&mut self, world: &mut dyn World, world_id: WorldId) -> usize {
        scan_world(
            &mut self.index,
            world,
            &self.catalog,
            world_id,
            ScanMode::Audit,
        )
        .orphans
        .len()
    }

    /// Delete every orphaned proxy in the loaded regions of `world_id`.
    pub fn remove_orphans(&mut self, world: &mut dyn World, world_id: WorldId) -> usize {
        let report = scan_world(
            &mut self.index,
            world,
            &self.catalog,
            world_id,
            ScanMode::Purge,
        );
        if report.removed > 0 {
            self.events.push(PipeEvent::OrphansRemoved {
                count: report.removed,
                tick: self.sim_state.tick,
            });
        }
        tracing::info!(world = world_id.0, removed = report.removed, "removed orphaned proxies");
        report.removed
    }

    /// Remove every pipe in `world_id`: its block, its proxies and its
    /// index entry. Returns the number of pipes deleted.
    pub fn delete_all(&mut self, world: &mut dyn World, world_id: WorldId) -> usize {
        let positions = self.index.positions_in_world(world_id);
        for &pos in &positions {
            if world.block_kind(pos) == BlockKind::PipeHead {
                world.set_block(pos, BlockKind::Air);
            }
            self.remove_pipe(world, pos, false, RemovalCause::Admin);
        }
        tracing::info!(world = world_id.0, count = positions.len(), "deleted all pipes");
        positions.len()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn index(&self) -> &SpatialNodeIndex {
        &self.index
    }

    pub fn lookup(&self, pos: BlockPos) -> Option<&PipeNode> {
        self.index.lookup(pos)
    }

    pub fn catalog(&self) -> &Arc<VariantCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn poll_interval(&self) -> Ticks {
        self.scheduler.poll_interval()
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Stop recording events of `kind`.
    pub fn suppress_event(&mut self, kind: PipeEventKind) {
        self.events.suppress(kind);
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<PipeEvent> {
        self.events.drain()
    }

    /// Hash of the index contents (positions, facings, variants, proxy
    /// counts). Service timestamps are excluded.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        for node in self.index.iter() {
            h.write_u32(node.pos.world.0);
            h.write_i32(node.pos.x);
            h.write_i32(node.pos.y);
            h.write_i32(node.pos.z);
            h.write(node.facing.name().as_bytes());
            h.write(node.variant.id.as_str().as_bytes());
            h.write_u64(node.proxies.len() as u64);
        }
        h.finish()
    }
}
