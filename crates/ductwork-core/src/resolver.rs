//! Destination resolution along a chain of pipes.

use crate::index::SpatialNodeIndex;
use crate::world::{BlockKind, World};
use ductwork_spatial::{BlockPos, Facing};
use std::collections::BTreeSet;

/// Where a transfer starting at some pipe ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A container accepts the items.
    Container { pos: BlockPos, flow_cap: u32 },
    /// No container. Items are dropped out of the face of `last`.
    OpenDrop {
        last: BlockPos,
        facing: Facing,
        flow_cap: u32,
    },
}

impl Resolution {
    pub fn flow_cap(&self) -> u32 {
        match *self {
            Resolution::Container { flow_cap, .. } | Resolution::OpenDrop { flow_cap, .. } => {
                flow_cap
            }
        }
    }
}

/// Follow the chain from `start` until it reaches a container or stops.
///
/// At each step the block ahead of the current pipe is examined:
/// - already visited: drop at the current pipe
/// - a container: deliver there
/// - a pipe facing straight back (head-to-head): drop at the current pipe,
///   cap unchanged
/// - any other pipe: tighten the cap to that pipe's rate and follow its facing
/// - anything else: drop at the current pipe
///
/// Terminates in at most `index.len() + 1` steps.
pub fn resolve(
    index: &SpatialNodeIndex,
    world: &dyn World,
    start: BlockPos,
    start_facing: Facing,
    start_cap: u32,
) -> Resolution {
    let mut visited = BTreeSet::from([start]);
    let mut current = start;
    let mut facing = start_facing;
    let mut flow_cap = start_cap;

    loop {
        let next = current.offset(facing);
        let open_drop = Resolution::OpenDrop {
            last: current,
            facing,
            flow_cap,
        };

        if !visited.insert(next) {
            return open_drop;
        }
        if world.block_kind(next) == BlockKind::Container {
            return Resolution::Container {
                pos: next,
                flow_cap,
            };
        }
        let Some(node) = index.lookup(next) else {
            return open_drop;
        };
        if node.facing == facing.opposite() {
            return open_drop;
        }
        flow_cap = flow_cap.min(node.variant.items_per_transfer);
        current = next;
        facing = node.facing;
    }
}
