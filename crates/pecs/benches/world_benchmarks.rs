//! World throughput benchmarks.
//!
//! - Spawning and activating a population.
//! - One `update` over a population with a one-system pipeline.
//! - Kill and respawn of a batch followed by a refresh.
//!
//! Run with: `cargo bench --bench world_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

const INFO: Mask = Mask::bit(0);
const TRANSFORM: Mask = Mask::bit(3);

struct Store {
    info: ComponentVec<u32>,
    transform: ComponentVec<[f32; 3]>,
}

impl Store {
    fn new() -> Self {
        Self {
            info: ComponentVec::new(INFO),
            transform: ComponentVec::new(TRANSFORM),
        }
    }
}

struct Accumulate;

impl System<Store> for Accumulate {
    fn mask(&self) -> Mask {
        INFO | TRANSFORM
    }

    fn update(&mut self, _dt: f64, ctx: &mut SystemContext<'_, Store>) {
        for entity in ctx.matching(INFO | TRANSFORM) {
            let t = &mut ctx.components_mut().transform[entity.id()];
            t[0] += t[1];
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spawn(world: &mut World<Store>, transform: bool) {
    let mut e = world.allocate_entity();
    let raw = e.id().to_raw();
    let store = world.components_mut();
    store.info.insert(&mut e, raw);
    if transform {
        store.transform.insert(&mut e, [5.0, 6.0, 7.0]);
    }
    world.register_entity(e);
}

/// A refreshed world where every other entity matches the system.
fn setup_world(entity_count: usize) -> World<Store> {
    let mut world = World::with_config(
        Store::new(),
        WorldConfig {
            entity_capacity: entity_count,
            ..WorldConfig::default()
        },
    );
    world.register_system(&SystemRef::new(Accumulate));
    for i in 0..entity_count {
        spawn(&mut world, i % 2 == 0);
    }
    world.refresh();
    world
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_and_refresh");
    for count in [1_000usize, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(setup_world(count)));
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for count in [1_000usize, 10_000, 100_000] {
        let mut world = setup_world(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| world.update(black_box(1.0)));
        });
    }
    group.finish();
}

fn bench_kill_respawn(c: &mut Criterion) {
    let mut world = setup_world(100_000);
    c.bench_function("kill_respawn_500_of_100k", |b| {
        b.iter(|| {
            for raw in 0..500u32 {
                world.kill_entity_by_id(EntityId::from_raw(raw));
            }
            for i in 0..500 {
                spawn(&mut world, i % 2 == 0);
            }
            black_box(world.refresh())
        });
    });
}

criterion_group!(benches, bench_spawn, bench_update, bench_kill_respawn);
criterion_main!(benches);
