//! Rebuilding the index from render-proxy markers.
//!
//! Markers are the only durable record of a pipe, so every region load
//! reconstructs that region's nodes from the proxies found in it. Each
//! decoded marker is checked against the block grid: a marker whose block
//! is still a pipe head restores a node, anything else is an orphan left
//! behind by a pipe that vanished while its region was unloaded.

use crate::catalog::{PipeVariant, VariantCatalog};
use crate::id::ProxyId;
use crate::index::SpatialNodeIndex;
use crate::marker::{self, MarkerRole};
use crate::world::{BlockKind, World};
use ductwork_spatial::{BlockPos, Facing, RegionKey, WorldId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a scan is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Register missing nodes and delete orphaned proxies.
    Restore,
    /// Count orphans. Changes nothing.
    Audit,
    /// Delete orphaned proxies. Registers nothing.
    Purge,
}

/// Result of scanning one or more regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Positions of nodes newly added to the index.
    pub registered: Vec<BlockPos>,
    /// Proxies whose marker points at a block that is no longer a pipe head.
    pub orphans: Vec<ProxyId>,
    /// Orphans actually deleted.
    pub removed: usize,
    /// Pipe-prefixed tags that failed to decode, and markers whose facing
    /// the variant does not allow.
    pub ignored: usize,
    /// Markers naming a variant the catalog does not know.
    pub unknown_variant: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.registered.extend(other.registered);
        self.orphans.extend(other.orphans);
        self.removed += other.removed;
        self.ignored += other.ignored;
        self.unknown_variant += other.unknown_variant;
    }
}

/// Proxies found for one pipe position.
struct Group {
    facing: Facing,
    variant: Arc<PipeVariant>,
    has_primary: bool,
    proxies: Vec<(MarkerRole, ProxyId)>,
}

/// Scan every proxy in `region`.
pub fn scan_region(
    index: &mut SpatialNodeIndex,
    world: &mut dyn World,
    catalog: &VariantCatalog,
    region: RegionKey,
    mode: ScanMode,
) -> ScanReport {
    let mut report = ScanReport::default();
    let mut groups: BTreeMap<BlockPos, Group> = BTreeMap::new();

    for proxy in world.proxies_in_region(region) {
        let Some(decoded) = marker::find_marker(&proxy.tags, region.world) else {
            if proxy.tags.iter().any(|t| marker::is_marker(t)) {
                report.ignored += 1;
            }
            continue;
        };
        let Some(variant) = catalog.get(&decoded.variant) else {
            tracing::warn!(
                variant = %decoded.variant,
                pos = %decoded.pos,
                "unknown pipe variant in marker"
            );
            report.unknown_variant += 1;
            continue;
        };
        if !variant.allows_facing(decoded.facing) {
            tracing::warn!(
                variant = %decoded.variant,
                pos = %decoded.pos,
                facing = decoded.facing.name(),
                "marker facing not allowed for variant"
            );
            report.ignored += 1;
            continue;
        }

        if world.block_kind(decoded.pos) != BlockKind::PipeHead {
            report.orphans.push(proxy.id);
            continue;
        }

        let is_primary = decoded.role == MarkerRole::Primary;
        let group = groups.entry(decoded.pos).or_insert_with(|| Group {
            facing: decoded.facing,
            variant: Arc::clone(variant),
            has_primary: false,
            proxies: Vec::new(),
        });
        if is_primary && !group.has_primary {
            group.facing = decoded.facing;
            group.variant = Arc::clone(variant);
            group.has_primary = true;
        }
        group.proxies.push((decoded.role, proxy.id));
    }

    if mode != ScanMode::Audit {
        for &id in &report.orphans {
            if world.remove_proxy(id) {
                report.removed += 1;
            }
        }
    }

    if mode == ScanMode::Restore {
        for (pos, mut group) in groups {
            if index.contains(pos) {
                continue;
            }
            group.proxies.sort_by_key(|&(role, _)| role);
            let proxies = group.proxies.into_iter().map(|(_, id)| id).collect();
            index.register(pos, group.facing, group.variant, proxies);
            report.registered.push(pos);
        }
    }

    report
}

/// Scan every loaded region of `world_id`.
pub fn scan_world(
    index: &mut SpatialNodeIndex,
    world: &mut dyn World,
    catalog: &VariantCatalog,
    world_id: WorldId,
    mode: ScanMode,
) -> ScanReport {
    let mut regions: Vec<RegionKey> = world
        .loaded_regions()
        .into_iter()
        .filter(|r| r.world == world_id)
        .collect();
    regions.sort();
    let mut report = ScanReport::default();
    for region in regions {
        report.merge(scan_region(index, world, catalog, region, mode));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::VariantId;
    use crate::marker::encode;
    use crate::test_utils::{MemoryWorld, test_catalog};

    const W: WorldId = WorldId(0);
    const REGION: RegionKey = RegionKey { world: W, x: 0, z: 0 };

    fn at(x: i32) -> BlockPos {
        BlockPos::new(W, x, 64, 0)
    }

    fn tag(pos: BlockPos, facing: Facing, variant: &str, role: MarkerRole) -> String {
        encode(pos, facing, &VariantId::new(variant).unwrap(), role)
    }

    #[test]
    fn restores_regular_and_corner_nodes() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        world.set_pipe_head(at(2));
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::East, "copper", MarkerRole::Primary));
        // Secondary listed first; the index must still order primary first.
        let secondary =
            world.add_tagged_proxy(at(2), &tag(at(2), Facing::North, "copper_corner", MarkerRole::Secondary));
        let primary =
            world.add_tagged_proxy(at(2), &tag(at(2), Facing::North, "copper_corner", MarkerRole::Primary));

        let report = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert_eq!(report.registered, vec![at(1), at(2)]);
        assert!(report.orphans.is_empty());
        assert_eq!(index.lookup(at(1)).unwrap().facing, Facing::East);
        let corner = index.lookup(at(2)).unwrap();
        assert!(corner.is_corner());
        assert_eq!(corner.proxies, vec![primary, secondary]);
    }

    #[test]
    fn restore_is_idempotent() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::East, "copper", MarkerRole::Primary));

        scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        let first: Vec<_> = index.iter().cloned().collect();
        let again = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert!(again.registered.is_empty());
        let second: Vec<_> = index.iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn orphans_follow_the_mode() {
        let catalog = test_catalog();
        for (mode, removed, left) in [
            (ScanMode::Audit, 0, 1),
            (ScanMode::Purge, 1, 0),
            (ScanMode::Restore, 1, 0),
        ] {
            let mut world = MemoryWorld::new();
            let mut index = SpatialNodeIndex::new();
            let orphan = world.add_tagged_proxy(at(3), &tag(at(3), Facing::Up, "copper", MarkerRole::Primary));
            let report = scan_region(&mut index, &mut world, &catalog, REGION, mode);
            assert_eq!(report.orphans, vec![orphan], "{mode:?}");
            assert_eq!(report.removed, removed, "{mode:?}");
            assert_eq!(world.proxy_count(), left, "{mode:?}");
        }
    }

    #[test]
    fn audit_and_purge_register_nothing() {
        let catalog = test_catalog();
        for mode in [ScanMode::Audit, ScanMode::Purge] {
            let mut world = MemoryWorld::new();
            let mut index = SpatialNodeIndex::new();
            world.set_pipe_head(at(1));
            world.add_tagged_proxy(at(1), &tag(at(1), Facing::East, "copper", MarkerRole::Primary));
            let report = scan_region(&mut index, &mut world, &catalog, REGION, mode);
            assert!(report.registered.is_empty());
            assert!(index.is_empty());
        }
    }

    #[test]
    fn skips_malformed_foreign_and_unknown_markers() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        world.add_tagged_proxy(at(1), "pipe:copper:garbage");
        world.add_tagged_proxy(at(1), "some_other_plugin");
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::East, "iron", MarkerRole::Primary));
        // Unknown variant at a missing block is still not an orphan.
        world.add_tagged_proxy(at(4), &tag(at(4), Facing::East, "iron", MarkerRole::Primary));

        let report = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.unknown_variant, 2);
        assert!(report.orphans.is_empty());
        assert!(index.is_empty());
        assert_eq!(world.proxy_count(), 4);
    }

    #[test]
    fn upward_corner_markers_are_not_restored() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::Up, "copper_corner", MarkerRole::Primary));
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::Up, "copper_corner", MarkerRole::Secondary));
        // A regular pipe may face up.
        world.set_pipe_head(at(2));
        world.add_tagged_proxy(at(2), &tag(at(2), Facing::Up, "copper", MarkerRole::Primary));

        let report = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert_eq!(report.ignored, 2);
        assert_eq!(report.registered, vec![at(2)]);
        assert!(index.lookup(at(1)).is_none());
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn marker_behind_a_foreign_prefixed_tag_is_restored() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        let marker = tag(at(1), Facing::East, "copper", MarkerRole::Primary);
        let proxy = world.add_tagged_proxies(at(1), &["pipe:foreign", marker.as_str()]);

        let report = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert_eq!(report.registered, vec![at(1)]);
        assert_eq!(report.ignored, 0);
        assert_eq!(index.lookup(at(1)).unwrap().proxies, vec![proxy]);
    }

    #[test]
    fn existing_entries_are_kept() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        world.set_pipe_head(at(1));
        index.register(at(1), Facing::West, Arc::clone(catalog.get_str("copper").unwrap()), vec![]);
        world.add_tagged_proxy(at(1), &tag(at(1), Facing::East, "copper", MarkerRole::Primary));
        let report = scan_region(&mut index, &mut world, &catalog, REGION, ScanMode::Restore);
        assert!(report.registered.is_empty());
        assert_eq!(index.lookup(at(1)).unwrap().facing, Facing::West);
    }

    #[test]
    fn scan_world_covers_loaded_regions_only() {
        let catalog = test_catalog();
        let mut world = MemoryWorld::new();
        let mut index = SpatialNodeIndex::new();
        let far = BlockPos::new(W, 40, 64, 0);
        let elsewhere = BlockPos::new(WorldId(1), 0, 64, 0);
        for pos in [at(1), far, elsewhere] {
            world.set_pipe_head(pos);
            world.add_tagged_proxy(pos, &tag(pos, Facing::East, "copper", MarkerRole::Primary));
        }
        world.unload_region(far.region());

        let report = scan_world(&mut index, &mut world, &catalog, W, ScanMode::Restore);
        assert_eq!(report.registered, vec![at(1)]);
    }
}
