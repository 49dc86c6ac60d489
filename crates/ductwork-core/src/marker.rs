//! Textual markers attached to render proxies.
//!
//! A marker is the only durable record of a pipe node: the host persists
//! proxies with their tags, and the engine rebuilds its index from them on
//! every region load. Format:
//!
//! ```text
//! pipe:{variant}:{x}_{y}_{z}_{FACING}        primary
//! pipe:{variant}:{x}_{y}_{z}_{FACING}_dir    secondary
//! ```
//!
//! The world is not encoded. It is the world of the proxy carrying the tag.

use crate::id::VariantId;
use ductwork_spatial::{BlockPos, Facing, WorldId};
use serde::{Deserialize, Serialize};

pub const MARKER_PREFIX: &str = "pipe:";
pub const SECONDARY_SUFFIX: &str = "_dir";

/// Which proxy of a node carries the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerRole {
    /// The main proxy. Every node has exactly one.
    Primary,
    /// The directional arrow of a corner node.
    Secondary,
}

/// Decoded identity of a node, as carried by one proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub pos: BlockPos,
    pub facing: Facing,
    pub variant: VariantId,
    pub role: MarkerRole,
}

impl Marker {
    pub fn new(pos: BlockPos, facing: Facing, variant: VariantId, role: MarkerRole) -> Self {
        Self {
            pos,
            facing,
            variant,
            role,
        }
    }

    pub fn encode(&self) -> String {
        encode(self.pos, self.facing, &self.variant, self.role)
    }

    /// Strict parse. Anything that is not exactly a marker yields `None`.
    pub fn decode(tag: &str, world: WorldId) -> Option<Marker> {
        decode(tag, world)
    }
}

pub fn encode(pos: BlockPos, facing: Facing, variant: &VariantId, role: MarkerRole) -> String {
    let suffix = match role {
        MarkerRole::Primary => "",
        MarkerRole::Secondary => SECONDARY_SUFFIX,
    };
    format!(
        "{MARKER_PREFIX}{variant}:{}_{}_{}_{}{suffix}",
        pos.x,
        pos.y,
        pos.z,
        facing.name()
    )
}

pub fn decode(tag: &str, world: WorldId) -> Option<Marker> {
    let body = tag.strip_prefix(MARKER_PREFIX)?;
    let (body, role) = match body.strip_suffix(SECONDARY_SUFFIX) {
        Some(rest) => (rest, MarkerRole::Secondary),
        None => (body, MarkerRole::Primary),
    };
    let (variant, data) = body.split_once(':')?;
    let variant = VariantId::new(variant).ok()?;

    let mut parts = data.split('_');
    let x = parse_coord(parts.next()?)?;
    let y = parse_coord(parts.next()?)?;
    let z = parse_coord(parts.next()?)?;
    let facing = parts.next()?.parse::<Facing>().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(Marker {
        pos: BlockPos::new(world, x, y, z),
        facing,
        variant,
        role,
    })
}

/// Accepts an optional leading `-` and ASCII digits only.
fn parse_coord(s: &str) -> Option<i32> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Whether `tag` looks like a marker at all.
pub fn is_marker(tag: &str) -> bool {
    tag.starts_with(MARKER_PREFIX)
}

/// The first tag in a proxy's tag set that decodes as a marker. Other
/// plugins' tags, including ones that share the prefix, are skipped.
pub fn find_marker<S: AsRef<str>>(tags: &[S], world: WorldId) -> Option<Marker> {
    tags.iter().find_map(|t| decode(t.as_ref(), world))
}

/// Whether `tag` decodes to a marker for the block at `pos`.
pub fn matches_position(tag: &str, pos: BlockPos) -> bool {
    decode(tag, pos.world).is_some_and(|m| m.pos == pos)
}
