//! Integration test: item flow through pipe networks
//!
//! Builds small networks in an in-memory world from a catalog loaded off
//! disk, then runs the engine tick by tick and checks where items end up:
//! flow capped by the narrowest pipe, no partial insertion, passive corners
//! and head-to-head pipes that throw items out between them.

use ductwork_core::engine::PipeEngine;
use ductwork_core::event::WorldEvent;
use ductwork_core::id::VariantId;
use ductwork_core::item::ItemStack;
use ductwork_core::sim::EngineConfig;
use ductwork_core::test_utils::{MemoryWorld, iron};
use ductwork_spatial::{BlockPos, Facing, WorldId};
use std::path::PathBuf;
use std::sync::Arc;

const W: WorldId = WorldId(0);

const VARIANTS: &str = r#"[
    (id: "copper", interval_ticks: 10, items_per_transfer: 4),
    (id: "thin", interval_ticks: 10, items_per_transfer: 2),
    (id: "wide", interval_ticks: 10, items_per_transfer: 64),
    (id: "copper_corner", behavior: corner, interval_ticks: 10, items_per_transfer: 4),
]"#;

const RELAY_VARIANTS: &str = r#"[
    (id: "relay", interval_ticks: 1, items_per_transfer: 4),
    (id: "relay_narrow", interval_ticks: 1, items_per_transfer: 2),
]"#;

fn data_dir(name: &str, variants: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ductwork_it_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("variants.ron"), variants).unwrap();
    std::fs::write(dir.join("engine.toml"), "start_delay_ticks = 0\n").unwrap();
    dir
}

fn engine(name: &str) -> PipeEngine {
    engine_with(name, VARIANTS)
}

fn engine_with(name: &str, variants: &str) -> PipeEngine {
    let dir = data_dir(name, variants);
    let data = ductwork_data::load_pipe_data(&dir).unwrap();
    let _ = std::fs::remove_dir_all(&dir);
    assert_eq!(data.config.start_delay_ticks, 0);
    PipeEngine::new(Arc::new(data.catalog), data.config)
}

fn at(x: i32, z: i32) -> BlockPos {
    BlockPos::new(W, x, 64, z)
}

fn place(engine: &mut PipeEngine, world: &mut MemoryWorld, pos: BlockPos, against: Facing, variant: &str) {
    let outcome = engine.handle_event(
        world,
        WorldEvent::BlockPlaced {
            pos,
            against: Some(against),
            yaw: 0.0,
            variant: Some(VariantId::new(variant).unwrap()),
        },
    );
    assert!(!outcome.cancelled);
}

/// Step until `tick`, feeding wall-clock time at the default tick length.
fn run_until(engine: &mut PipeEngine, world: &mut MemoryWorld, tick: u64) {
    while engine.tick() < tick {
        let now = (engine.tick() + 1) * EngineConfig::default().tick_duration_ms;
        engine.step(world, now);
    }
}

#[test]
fn narrow_pipe_caps_the_whole_chain() {
    let mut engine = engine("chain_424");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 9);
    world.add_container(at(4, 0), 9);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 20));
    place(&mut engine, &mut world, at(1, 0), Facing::East, "copper");
    place(&mut engine, &mut world, at(2, 0), Facing::East, "thin");
    place(&mut engine, &mut world, at(3, 0), Facing::East, "copper");
    engine.start(&mut world);
    assert_eq!(engine.poll_interval(), 10);

    run_until(&mut engine, &mut world, 10);
    assert_eq!(world.total_items(at(4, 0)), 2);
    assert_eq!(world.total_items(at(0, 0)), 18);

    run_until(&mut engine, &mut world, 20);
    assert_eq!(world.total_items(at(4, 0)), 4);
    assert!(world.drops().is_empty());
}

#[test]
fn one_tick_relay_moves_two_items_every_tick_until_empty() {
    let mut engine = engine_with("relay_111", RELAY_VARIANTS);
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 9);
    world.add_container(at(4, 0), 9);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 10));
    place(&mut engine, &mut world, at(1, 0), Facing::East, "relay");
    place(&mut engine, &mut world, at(2, 0), Facing::East, "relay_narrow");
    place(&mut engine, &mut world, at(3, 0), Facing::East, "relay");
    engine.start(&mut world);
    assert_eq!(engine.poll_interval(), 1);

    for cycle in 1..=5u64 {
        run_until(&mut engine, &mut world, cycle);
        assert_eq!(world.total_items(at(4, 0)), 2 * cycle as u32, "cycle {cycle}");
        assert_eq!(world.total_items(at(0, 0)), 10 - 2 * cycle as u32, "cycle {cycle}");
    }

    run_until(&mut engine, &mut world, 8);
    assert_eq!(world.total_items(at(0, 0)), 0);
    assert_eq!(world.total_items(at(4, 0)), 10);
    assert!(world.drops().is_empty());
}

#[test]
fn full_destination_blocks_transfer_without_partial_insert() {
    let mut engine = engine("no_double_insert");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 1);
    world.add_container_with_limit(at(2, 0), 1, 3);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 5));
    place(&mut engine, &mut world, at(1, 0), Facing::East, "wide");
    engine.start(&mut world);

    run_until(&mut engine, &mut world, 100);
    assert_eq!(world.total_items(at(0, 0)), 5);
    assert_eq!(world.total_items(at(2, 0)), 0);
    assert!(world.drops().is_empty());
}

#[test]
fn corner_redirects_but_never_pulls() {
    let mut engine = engine("corner");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 9);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 8));
    // Container behind the corner, which must stay untouched.
    world.add_container(at(2, 1), 9);
    world.insert(at(2, 1), 0, ItemStack::new(iron(), 8));
    world.add_container(at(2, -1), 9);

    place(&mut engine, &mut world, at(1, 0), Facing::East, "copper");
    // Clicking the south face of a block places a corner pointing north.
    place(&mut engine, &mut world, at(2, 0), Facing::South, "copper_corner");
    assert_eq!(engine.lookup(at(2, 0)).unwrap().facing, Facing::North);
    engine.start(&mut world);

    run_until(&mut engine, &mut world, 20);
    assert_eq!(world.total_items(at(2, -1)), 8);
    assert_eq!(world.total_items(at(0, 0)), 0);
    assert_eq!(world.total_items(at(2, 1)), 8);
}

#[test]
fn head_to_head_pipes_drop_at_the_boundary() {
    let mut engine = engine("head_to_head");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 9);
    world.add_container(at(3, 0), 9);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 10));
    world.insert(at(3, 0), 0, ItemStack::new(iron(), 10));
    place(&mut engine, &mut world, at(1, 0), Facing::East, "copper");
    place(&mut engine, &mut world, at(2, 0), Facing::West, "copper");
    engine.start(&mut world);

    run_until(&mut engine, &mut world, 10);
    assert_eq!(world.total_items(at(0, 0)), 6);
    assert_eq!(world.total_items(at(3, 0)), 6);
    assert_eq!(world.dropped_items(), 8);

    let mut xs: Vec<f64> = world.drops().iter().map(|d| d.position.to_f64().0).collect();
    xs.sort_by(f64::total_cmp);
    assert!((xs[0] - 1.9).abs() < 1e-6);
    assert!((xs[1] - 2.1).abs() < 1e-6);
}

#[test]
fn open_end_throws_items_out() {
    let mut engine = engine("open_end");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, 0), 9);
    world.insert(at(0, 0), 0, ItemStack::new(iron(), 3));
    place(&mut engine, &mut world, at(1, 0), Facing::East, "copper");
    place(&mut engine, &mut world, at(2, 0), Facing::East, "copper");
    engine.start(&mut world);

    run_until(&mut engine, &mut world, 10);
    assert_eq!(world.dropped_items(), 3);
    let drop = &world.drops()[0];
    let (x, y, _) = drop.position.to_f64();
    assert!((x - 3.1).abs() < 1e-6);
    assert!((y - 64.25).abs() < 1e-6);
}

#[test]
fn ring_of_pipes_terminates_and_drops() {
    let mut engine = engine("ring");
    let mut world = MemoryWorld::new();
    world.add_container(at(0, -1), 9);
    world.insert(at(0, -1), 0, ItemStack::new(iron(), 4));
    // A 2x2 loop fed from the north: (0,0)->S (0,1)->E (1,1)->N (1,0)->W.
    place(&mut engine, &mut world, at(0, 0), Facing::South, "copper");
    place(&mut engine, &mut world, at(0, 1), Facing::East, "copper");
    place(&mut engine, &mut world, at(1, 1), Facing::North, "copper");
    place(&mut engine, &mut world, at(1, 0), Facing::West, "copper");
    engine.start(&mut world);

    run_until(&mut engine, &mut world, 10);
    assert_eq!(world.total_items(at(0, -1)), 0);
    assert_eq!(world.dropped_items(), 4);
}
