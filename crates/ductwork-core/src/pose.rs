//! Classification of the blocks around a pipe, used to shape its render
//! proxies.

use crate::catalog::Behavior;
use crate::index::SpatialNodeIndex;
use crate::marker::MarkerRole;
use crate::world::{BlockKind, NeighborKind, ProxyPose, World};
use ductwork_spatial::{BlockPos, Facing};

/// Classify the block on the input side of a pipe at `pos` facing `facing`.
pub fn classify_behind(
    index: &SpatialNodeIndex,
    world: &dyn World,
    pos: BlockPos,
    facing: Facing,
) -> NeighborKind {
    let neighbor = pos.offset(facing.opposite());
    match index.lookup(neighbor) {
        // A corner behind us feeds us only when it points our way.
        Some(node) if node.is_corner() => {
            if node.facing == facing {
                NeighborKind::CornerInto
            } else {
                NeighborKind::Solid
            }
        }
        Some(node) => relative_kind(node.facing, facing),
        None => block_kind(world, neighbor),
    }
}

/// Classify the block on the output side of a pipe at `pos` facing `facing`.
pub fn classify_ahead(
    index: &SpatialNodeIndex,
    world: &dyn World,
    pos: BlockPos,
    facing: Facing,
) -> NeighborKind {
    let neighbor = pos.offset(facing);
    match index.lookup(neighbor) {
        Some(node) if node.is_corner() => {
            if node.facing == facing.opposite() {
                NeighborKind::CornerInto
            } else {
                NeighborKind::CornerPipe
            }
        }
        Some(node) => relative_kind(node.facing, facing),
        None => block_kind(world, neighbor),
    }
}

fn relative_kind(neighbor: Facing, ours: Facing) -> NeighborKind {
    if neighbor == ours {
        NeighborKind::PipeContinuous
    } else if neighbor == ours.opposite() {
        NeighborKind::PipeInto
    } else {
        NeighborKind::PipeOrthogonal
    }
}

fn block_kind(world: &dyn World, pos: BlockPos) -> NeighborKind {
    match world.block_kind(pos) {
        BlockKind::Air => NeighborKind::Air,
        BlockKind::Container => NeighborKind::Container,
        BlockKind::Solid | BlockKind::PipeHead => NeighborKind::Solid,
    }
}

/// Build the pose of one proxy of a pipe from its current surroundings.
pub fn pose_for(
    index: &SpatialNodeIndex,
    world: &dyn World,
    pos: BlockPos,
    facing: Facing,
    behavior: Behavior,
    role: MarkerRole,
) -> ProxyPose {
    ProxyPose {
        role,
        facing,
        behavior,
        behind: classify_behind(index, world, pos, facing),
        ahead: classify_ahead(index, world, pos, facing),
    }
}

/// Proxy roles a node of the given behavior carries, primary first.
pub fn roles_for(behavior: Behavior) -> &'static [MarkerRole] {
    match behavior {
        Behavior::Regular => &[MarkerRole::Primary],
        Behavior::Corner => &[MarkerRole::Primary, MarkerRole::Secondary],
    }
}
