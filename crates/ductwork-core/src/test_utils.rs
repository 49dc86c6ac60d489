//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::{Behavior, CatalogBuilder, PipeVariant, VariantCatalog, VariantDef};
use crate::id::{ItemTypeId, ProxyId};
use crate::item::ItemStack;
use crate::world::{
    BlockKind, Container, DEFAULT_MAX_STACK, ItemDrop, ProxyPose, ProxySnapshot, World,
};
use ductwork_spatial::{BlockPos, Facing, RegionKey};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

// ===========================================================================
// Catalog and item constructors
// ===========================================================================

/// Four variants covering every behavior the engine distinguishes:
///
/// | id              | behavior | interval | per transfer |
/// |-----------------|----------|----------|--------------|
/// | `copper`        | regular  | 10       | 4            |
/// | `copper_corner` | corner   | 10       | 4            |
/// | `wide`          | regular  | 10       | 64           |
/// | `fast`          | regular  | 2        | 1            |
pub fn test_catalog() -> VariantCatalog {
    let mut b = CatalogBuilder::new();
    for def in [
        VariantDef::new("copper", Behavior::Regular, 10, 4),
        VariantDef::new("copper_corner", Behavior::Corner, 10, 4),
        VariantDef::new("wide", Behavior::Regular, 10, 64),
        VariantDef::new("fast", Behavior::Regular, 2, 1),
    ] {
        b.register(def).unwrap();
    }
    b.build()
}

pub fn iron() -> ItemTypeId {
    ItemTypeId(1)
}

pub fn gold() -> ItemTypeId {
    ItemTypeId(2)
}

// ===========================================================================
// MemoryContainer
// ===========================================================================

/// A plain slotted inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContainer {
    slots: Vec<Option<ItemStack>>,
    max_stack: u32,
}

impl MemoryContainer {
    pub fn new(size: usize, max_stack: u32) -> Self {
        Self {
            slots: vec![None; size],
            max_stack,
        }
    }

    pub fn total(&self) -> u32 {
        self.slots.iter().flatten().map(|s| s.quantity).sum()
    }
}

impl Container for MemoryContainer {
    fn size(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, slot: usize) -> Option<ItemStack> {
        self.slots.get(slot).cloned().flatten()
    }

    fn set(&mut self, slot: usize, stack: Option<ItemStack>) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = stack.filter(|s| !s.is_empty());
        }
    }

    fn add(&mut self, mut stack: ItemStack) -> Option<ItemStack> {
        let max = self.max_stack;
        for existing in self.slots.iter_mut().flatten() {
            if stack.is_empty() {
                break;
            }
            if existing.is_similar(&stack) {
                let room = max.saturating_sub(existing.quantity);
                existing.quantity += stack.take(room);
            }
        }
        for slot in self.slots.iter_mut() {
            if stack.is_empty() {
                break;
            }
            if slot.is_none() {
                let moved = stack.take(max);
                *slot = Some(stack.with_quantity(moved));
            }
        }
        if stack.is_empty() { None } else { Some(stack) }
    }

    fn max_stack_size(&self) -> u32 {
        self.max_stack
    }
}

// ===========================================================================
// MemoryWorld
// ===========================================================================

#[derive(Debug, Clone)]
struct ProxyEntry {
    pos: BlockPos,
    tags: Vec<String>,
    pose: Option<ProxyPose>,
}

/// An in-memory host world. Regions become loaded as soon as anything is
/// placed in them, until explicitly unloaded.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    blocks: BTreeMap<BlockPos, BlockKind>,
    containers: BTreeMap<BlockPos, MemoryContainer>,
    proxies: SlotMap<ProxyId, ProxyEntry>,
    touched: BTreeSet<RegionKey>,
    unloaded: BTreeSet<RegionKey>,
    drops: Vec<ItemDrop>,
    pipe_item_drops: usize,
    visual_refreshes: Vec<BlockPos>,
    highlights: Vec<BlockPos>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, pos: BlockPos) {
        self.touched.insert(pos.region());
    }

    // -- blocks ------------------------------------------------------------

    pub fn set_pipe_head(&mut self, pos: BlockPos) {
        self.set_block(pos, BlockKind::PipeHead);
    }

    pub fn set_solid(&mut self, pos: BlockPos) {
        self.set_block(pos, BlockKind::Solid);
    }

    pub fn set_air(&mut self, pos: BlockPos) {
        self.set_block(pos, BlockKind::Air);
    }

    // -- containers --------------------------------------------------------

    pub fn add_container(&mut self, pos: BlockPos, slots: usize) {
        self.add_container_with_limit(pos, slots, DEFAULT_MAX_STACK);
    }

    pub fn add_container_with_limit(&mut self, pos: BlockPos, slots: usize, max_stack: u32) {
        self.touch(pos);
        self.blocks.insert(pos, BlockKind::Container);
        self.containers
            .insert(pos, MemoryContainer::new(slots, max_stack));
    }

    /// Put `stack` straight into `slot`, replacing its contents.
    pub fn insert(&mut self, pos: BlockPos, slot: usize, stack: ItemStack) {
        self.containers
            .get_mut(&pos)
            .expect("no container at position")
            .set(slot, Some(stack));
    }

    pub fn slot(&self, pos: BlockPos, slot: usize) -> Option<ItemStack> {
        self.containers.get(&pos).and_then(|c| c.get(slot))
    }

    pub fn total_items(&self, pos: BlockPos) -> u32 {
        self.containers.get(&pos).map_or(0, MemoryContainer::total)
    }

    // -- proxies -----------------------------------------------------------

    /// Spawn a bare proxy carrying one tag, as a previous session would
    /// have left it.
    pub fn add_tagged_proxy(&mut self, pos: BlockPos, tag: &str) -> ProxyId {
        self.add_tagged_proxies(pos, &[tag])
    }

    pub fn add_tagged_proxies(&mut self, pos: BlockPos, tags: &[&str]) -> ProxyId {
        self.touch(pos);
        self.proxies.insert(ProxyEntry {
            pos,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pose: None,
        })
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn proxy_tags(&self, id: ProxyId) -> Option<Vec<String>> {
        self.proxies.get(id).map(|p| p.tags.clone())
    }

    pub fn proxy_pose(&self, id: ProxyId) -> Option<&ProxyPose> {
        self.proxies.get(id).and_then(|p| p.pose.as_ref())
    }

    // -- regions -----------------------------------------------------------

    pub fn unload_region(&mut self, region: RegionKey) {
        self.unloaded.insert(region);
    }

    pub fn load_region(&mut self, region: RegionKey) {
        self.unloaded.remove(&region);
        self.touched.insert(region);
    }

    // -- host side effects -------------------------------------------------

    pub fn drops(&self) -> &[ItemDrop] {
        &self.drops
    }

    /// Items dropped out of open pipe ends, summed.
    pub fn dropped_items(&self) -> u32 {
        self.drops.iter().map(|d| d.stack.quantity).sum()
    }

    /// How many broken pipes gave their item back.
    pub fn pipe_item_drops(&self) -> usize {
        self.pipe_item_drops
    }

    pub fn visual_refreshes(&self) -> &[BlockPos] {
        &self.visual_refreshes
    }

    pub fn highlights(&self) -> &[BlockPos] {
        &self.highlights
    }
}

impl World for MemoryWorld {
    fn block_kind(&self, pos: BlockPos) -> BlockKind {
        self.blocks.get(&pos).copied().unwrap_or(BlockKind::Air)
    }

    fn set_block(&mut self, pos: BlockPos, kind: BlockKind) {
        self.touch(pos);
        self.containers.remove(&pos);
        match kind {
            BlockKind::Air => {
                self.blocks.remove(&pos);
            }
            BlockKind::Container => {
                self.blocks.insert(pos, kind);
                self.containers
                    .insert(pos, MemoryContainer::new(27, DEFAULT_MAX_STACK));
            }
            _ => {
                self.blocks.insert(pos, kind);
            }
        }
    }

    fn container(&self, pos: BlockPos) -> Option<&dyn Container> {
        self.containers.get(&pos).map(|c| c as &dyn Container)
    }

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut dyn Container> {
        self.containers
            .get_mut(&pos)
            .map(|c| c as &mut dyn Container)
    }

    fn loaded_regions(&self) -> Vec<RegionKey> {
        self.touched.difference(&self.unloaded).copied().collect()
    }

    fn proxies_in_region(&self, region: RegionKey) -> Vec<ProxySnapshot> {
        if self.unloaded.contains(&region) {
            return Vec::new();
        }
        self.proxies
            .iter()
            .filter(|(_, p)| region.contains(&p.pos))
            .map(|(id, p)| ProxySnapshot {
                id,
                tags: p.tags.clone(),
            })
            .collect()
    }

    fn proxies_near(&self, pos: BlockPos) -> Vec<ProxySnapshot> {
        self.proxies
            .iter()
            .filter(|(_, p)| {
                p.pos.world == pos.world
                    && (p.pos.x - pos.x).abs() <= 1
                    && (p.pos.y - pos.y).abs() <= 1
                    && (p.pos.z - pos.z).abs() <= 1
            })
            .map(|(id, p)| ProxySnapshot {
                id,
                tags: p.tags.clone(),
            })
            .collect()
    }

    fn spawn_proxy(&mut self, pos: BlockPos, tag: &str, pose: &ProxyPose) -> ProxyId {
        self.touch(pos);
        self.proxies.insert(ProxyEntry {
            pos,
            tags: vec![tag.to_string()],
            pose: Some(pose.clone()),
        })
    }

    fn set_proxy_pose(&mut self, id: ProxyId, pose: &ProxyPose) -> bool {
        match self.proxies.get_mut(id) {
            Some(p) => {
                p.pose = Some(pose.clone());
                true
            }
            None => false,
        }
    }

    fn remove_proxy(&mut self, id: ProxyId) -> bool {
        self.proxies.remove(id).is_some()
    }

    fn spawn_item(&mut self, drop: ItemDrop) {
        self.drops.push(drop);
    }

    fn refresh_block_visual(&mut self, pos: BlockPos, _variant: &PipeVariant, _facing: Facing) {
        self.visual_refreshes.push(pos);
    }

    fn highlight_pipe(&mut self, pos: BlockPos) {
        self.highlights.push(pos);
    }

    fn drop_pipe_item(&mut self, _pos: BlockPos, _variant: &PipeVariant) {
        self.pipe_item_drops += 1;
    }
}
