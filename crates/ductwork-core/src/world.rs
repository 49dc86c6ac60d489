//! Host-facing traits.
//!
//! The engine never owns blocks, inventories or entities. It reads and
//! mutates them through [`World`] and [`Container`], which the host game
//! implements over its own data.

use crate::catalog::{Behavior, PipeVariant};
use crate::fixed::Vec3;
use crate::id::ProxyId;
use crate::item::ItemStack;
use crate::marker::MarkerRole;
use ductwork_spatial::{BlockPos, Facing, RegionKey, WorldId};
use serde::{Deserialize, Serialize};

/// Default per-slot stack limit when a container does not say otherwise.
pub const DEFAULT_MAX_STACK: u32 = 64;

/// What occupies a block, as far as pipes are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Air or any non-solid block items can fall through.
    Air,
    Solid,
    /// A block with an inventory.
    Container,
    /// The physical block a pipe node sits in.
    PipeHead,
}

/// A slotted inventory owned by the host.
pub trait Container {
    fn size(&self) -> usize;

    /// The stack in `slot`, or `None` if empty or out of range.
    fn get(&self, slot: usize) -> Option<ItemStack>;

    /// Replace the contents of `slot`. `None` clears it.
    fn set(&mut self, slot: usize, stack: Option<ItemStack>);

    /// Insert a stack, merging into similar stacks first. Returns whatever
    /// did not fit.
    fn add(&mut self, stack: ItemStack) -> Option<ItemStack>;

    fn max_stack_size(&self) -> u32 {
        DEFAULT_MAX_STACK
    }

    /// Whether the whole of `stack` would fit.
    fn can_accept(&self, stack: &ItemStack) -> bool {
        let max = self.max_stack_size();
        let mut room: u64 = 0;
        for slot in 0..self.size() {
            room += match self.get(slot) {
                None => max as u64,
                Some(existing) if existing.is_empty() => max as u64,
                Some(existing) if existing.is_similar(stack) => {
                    max.saturating_sub(existing.quantity) as u64
                }
                Some(_) => 0,
            };
            if room >= stack.quantity as u64 {
                return true;
            }
        }
        room >= stack.quantity as u64
    }
}

/// The classification of a block next to a pipe, handed to the host so it
/// can shape the pipe's render proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeighborKind {
    Air,
    Solid,
    Container,
    /// A regular pipe pointing the same way.
    PipeContinuous,
    /// A regular pipe pointing back at this one.
    PipeInto,
    /// A regular pipe pointing sideways.
    PipeOrthogonal,
    /// A corner pipe whose output faces this pipe.
    CornerInto,
    /// A corner pipe that does not feed this pipe.
    CornerPipe,
}

/// Everything the host needs to place and shape one render proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPose {
    pub role: MarkerRole,
    pub facing: Facing,
    pub behavior: Behavior,
    /// Block on the input side. Not meaningful for secondary proxies.
    pub behind: NeighborKind,
    /// Block on the output side.
    pub ahead: NeighborKind,
}

/// A render proxy as listed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySnapshot {
    pub id: ProxyId,
    pub tags: Vec<String>,
}

/// A free item to spawn in the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDrop {
    pub world: WorldId,
    pub stack: ItemStack,
    /// Absolute world position.
    pub position: Vec3,
    /// Blocks per tick.
    pub velocity: Vec3,
}

/// The host world, as seen by the engine.
pub trait World {
    fn block_kind(&self, pos: BlockPos) -> BlockKind;

    fn set_block(&mut self, pos: BlockPos, kind: BlockKind);

    fn container(&self, pos: BlockPos) -> Option<&dyn Container>;

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut dyn Container>;

    /// Regions currently loaded, in any order.
    fn loaded_regions(&self) -> Vec<RegionKey>;

    fn proxies_in_region(&self, region: RegionKey) -> Vec<ProxySnapshot>;

    /// Proxies within one block of `pos` (center to center).
    fn proxies_near(&self, pos: BlockPos) -> Vec<ProxySnapshot>;

    fn spawn_proxy(&mut self, pos: BlockPos, tag: &str, pose: &ProxyPose) -> ProxyId;

    /// Returns `false` if the proxy no longer exists.
    fn set_proxy_pose(&mut self, id: ProxyId, pose: &ProxyPose) -> bool;

    /// Returns `false` if the proxy no longer exists.
    fn remove_proxy(&mut self, id: ProxyId) -> bool;

    fn spawn_item(&mut self, drop: ItemDrop);

    /// Re-skin the pipe head block after placement.
    fn refresh_block_visual(&mut self, _pos: BlockPos, _variant: &PipeVariant, _facing: Facing) {}

    /// Give back the pipe item itself when a pipe is broken.
    fn drop_pipe_item(&mut self, _pos: BlockPos, _variant: &PipeVariant) {}

    /// Mark an indexed pipe with a short-lived visual cue. Only called when
    /// debug highlighting is enabled.
    fn highlight_pipe(&mut self, _pos: BlockPos) {}
}
