//! In-memory index of the pipes in loaded regions.

use crate::catalog::{PipeVariant, VariantCatalog};
use crate::fixed::Millis;
use crate::id::{ProxyId, VariantId};
use ductwork_spatial::{BlockPos, Facing, RegionKey, WorldId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One registered pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeNode {
    pub pos: BlockPos,
    /// Fixed for the node's lifetime.
    pub facing: Facing,
    pub variant: Arc<PipeVariant>,
    /// Render proxies, primary first.
    pub proxies: Vec<ProxyId>,
    /// Wall-clock time of the last service attempt.
    pub last_service: Option<Millis>,
}

impl PipeNode {
    pub fn is_corner(&self) -> bool {
        self.variant.is_corner()
    }

    /// The block items are pulled from.
    pub fn source_pos(&self) -> BlockPos {
        self.pos.offset(self.facing.opposite())
    }

    /// The block items are pushed into.
    pub fn target_pos(&self) -> BlockPos {
        self.pos.offset(self.facing)
    }
}

/// Authoritative map from block position to pipe node for every loaded
/// region. Ordered, so iteration (and therefore servicing order) is
/// deterministic.
#[derive(Debug, Default)]
pub struct SpatialNodeIndex {
    nodes: BTreeMap<BlockPos, PipeNode>,
}

impl SpatialNodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any existing node at `pos`. Returns the
    /// replaced node.
    pub fn register(
        &mut self,
        pos: BlockPos,
        facing: Facing,
        variant: Arc<PipeVariant>,
        proxies: Vec<ProxyId>,
    ) -> Option<PipeNode> {
        self.nodes.insert(
            pos,
            PipeNode {
                pos,
                facing,
                variant,
                proxies,
                last_service: None,
            },
        )
    }

    pub fn unregister(&mut self, pos: BlockPos) -> Option<PipeNode> {
        self.nodes.remove(&pos)
    }

    pub fn lookup(&self, pos: BlockPos) -> Option<&PipeNode> {
        self.nodes.get(&pos)
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.nodes.contains_key(&pos)
    }

    /// Record a service attempt. Returns `false` if no node is at `pos`.
    pub fn touch(&mut self, pos: BlockPos, now: Millis) -> bool {
        match self.nodes.get_mut(&pos) {
            Some(node) => {
                node.last_service = Some(now);
                true
            }
            None => false,
        }
    }

    /// Point every node at the same-id variant of a new catalog. Nodes whose
    /// variant is gone keep the old definition. Returns how many kept it.
    pub fn rebind_variants(&mut self, catalog: &VariantCatalog) -> usize {
        let mut missing = 0;
        for node in self.nodes.values_mut() {
            match catalog.get(&node.variant.id) {
                Some(variant) => node.variant = Arc::clone(variant),
                None => missing += 1,
            }
        }
        missing
    }

    /// Number of nodes per variant.
    pub fn counts_by_variant(&self) -> BTreeMap<VariantId, usize> {
        let mut counts = BTreeMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.variant.id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Drop every node in `region` without touching the world. Returns the
    /// number of nodes evicted.
    pub fn evict_region(&mut self, region: RegionKey) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|pos, _| !region.contains(pos));
        before - self.nodes.len()
    }

    /// Positions of every node in `world`, in index order.
    pub fn positions_in_world(&self, world: WorldId) -> Vec<BlockPos> {
        self.nodes
            .keys()
            .filter(|pos| pos.world == world)
            .copied()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipeNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
