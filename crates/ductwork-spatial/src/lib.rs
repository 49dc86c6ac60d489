//! Voxel coordinates, facings, and regions.
//!
//! Provides the block-aligned 3D position type every pipe lookup is keyed
//! by, the six axis facings a pipe can point in, and the 16x16 region
//! columns the host loads and unloads as a unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifies a world (dimension) hosted by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Edge length of a region column, in blocks.
pub const REGION_SIZE: i32 = 16;

/// A block-aligned position in a world.
///
/// Ordering is world-major, then x, y, z. Iterating a map keyed by
/// `BlockPos` is therefore deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The neighboring block one step in `facing`.
    pub fn offset(&self, facing: Facing) -> Self {
        let (dx, dy, dz) = facing.offset();
        Self {
            world: self.world,
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// The region column containing this block.
    pub fn region(&self) -> RegionKey {
        RegionKey {
            world: self.world,
            x: self.x.div_euclid(REGION_SIZE),
            z: self.z.div_euclid(REGION_SIZE),
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}) in world {}", self.x, self.y, self.z, self.world.0)
    }
}

/// A free-floating position, as reported by the host for entities and
/// clicks. Normalizes to the block containing it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// The block containing this location (each axis floored).
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.world,
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// A 16x16 column of blocks, loaded and unloaded by the host as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl RegionKey {
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Whether `pos` lies inside this region.
    pub fn contains(&self, pos: &BlockPos) -> bool {
        pos.region() == *self
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// One of the six axis directions a block face can point in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Facing {
    /// All six facings, horizontal ones first.
    pub fn all() -> [Facing; 6] {
        [
            Facing::North,
            Facing::South,
            Facing::East,
            Facing::West,
            Facing::Up,
            Facing::Down,
        ]
    }

    /// Unit offset `(dx, dy, dz)`. North is -z, East is +x, Up is +y.
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::East => (1, 0, 0),
            Facing::West => (-1, 0, 0),
            Facing::Up => (0, 1, 0),
            Facing::Down => (0, -1, 0),
        }
    }

    pub fn opposite(&self) -> Facing {
        match self {
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::East => Facing::West,
            Facing::West => Facing::East,
            Facing::Up => Facing::Down,
            Facing::Down => Facing::Up,
        }
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self, Facing::Up | Facing::Down)
    }

    /// Canonical upper-case name, as written into markers.
    pub fn name(&self) -> &'static str {
        match self {
            Facing::North => "NORTH",
            Facing::South => "SOUTH",
            Facing::East => "EAST",
            Facing::West => "WEST",
            Facing::Up => "UP",
            Facing::Down => "DOWN",
        }
    }

    /// Horizontal facing a player with the given yaw (degrees) looks toward.
    pub fn from_yaw(yaw: f32) -> Facing {
        let yaw = yaw.rem_euclid(360.0);
        if !(45.0..315.0).contains(&yaw) {
            Facing::South
        } else if yaw < 135.0 {
            Facing::West
        } else if yaw < 225.0 {
            Facing::North
        } else {
            Facing::East
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Facing {
    type Err = SpatialError;

    /// Parses the exact upper-case names produced by [`Facing::name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facing::all()
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| SpatialError::UnknownFacing(s.to_string()))
    }
}

/// Errors from spatial parsing.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    #[error("unknown facing '{0}'")]
    UnknownFacing(String),
}
