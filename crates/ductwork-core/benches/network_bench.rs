//! Criterion benchmarks for the pipe engine.
//!
//! Two benchmark groups:
//! - `long_chains`: 64 chains of 32 pipes between container pairs -- one
//!   polling pass over ~2000 nodes
//! - `region_restore`: evicting one full region and rebuilding it from
//!   its markers

use criterion::{Criterion, criterion_group, criterion_main};
use ductwork_core::engine::PipeEngine;
use ductwork_core::event::WorldEvent;
use ductwork_core::id::VariantId;
use ductwork_core::item::ItemStack;
use ductwork_core::sim::EngineConfig;
use ductwork_core::test_utils::*;
use ductwork_spatial::{BlockPos, Facing, WorldId};
use std::hint::black_box;
use std::sync::Arc;

const W: WorldId = WorldId(0);

// ===========================================================================
// Network builders
// ===========================================================================

/// `chains` parallel east-facing chains of `length` pipes, each fed by a
/// full container and ending in an empty one.
fn build_chains(chains: i32, length: i32) -> (PipeEngine, MemoryWorld) {
    let config = EngineConfig {
        start_delay_ticks: 0,
        ..EngineConfig::default()
    };
    let mut engine = PipeEngine::new(Arc::new(test_catalog()), config);
    let mut world = MemoryWorld::new();
    let copper = VariantId::new("copper").unwrap();

    for z in 0..chains {
        let source = BlockPos::new(W, 0, 64, z);
        world.add_container(source, 27);
        for slot in 0..27 {
            world.insert(source, slot, ItemStack::new(iron(), 64));
        }
        world.add_container(BlockPos::new(W, length + 1, 64, z), 27);
        for x in 1..=length {
            engine.handle_event(
                &mut world,
                WorldEvent::BlockPlaced {
                    pos: BlockPos::new(W, x, 64, z),
                    against: Some(Facing::East),
                    yaw: 0.0,
                    variant: Some(copper.clone()),
                },
            );
        }
    }
    engine.start(&mut world);
    (engine, world)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_long_chains(c: &mut Criterion) {
    let (mut engine, mut world) = build_chains(64, 32);
    let mut now = 0u64;
    c.bench_function("long_chains", |b| {
        b.iter(|| {
            // Ten ticks per iteration so every copper node is due once.
            for _ in 0..10 {
                now += 50;
                black_box(engine.step(&mut world, now));
            }
        })
    });
}

fn bench_region_restore(c: &mut Criterion) {
    let (mut engine, mut world) = build_chains(32, 32);
    let region = BlockPos::new(W, 0, 64, 0).region();
    c.bench_function("region_restore", |b| {
        b.iter(|| {
            engine.handle_event(&mut world, WorldEvent::RegionUnloaded(region));
            engine.handle_event(&mut world, WorldEvent::RegionLoaded(region));
            black_box(engine.step(&mut world, 0));
        })
    });
}

criterion_group!(benches, bench_long_chains, bench_region_restore);
criterion_main!(benches);
