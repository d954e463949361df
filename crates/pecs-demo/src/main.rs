//! Kill/respawn stress driver.
//!
//! Spawns a large population, runs a number of ticks and, midway through,
//! kills a batch of entities and spawns the same number in their place. The
//! entity sequence must not grow and every entity must end up alive.
//!
//! Usage: `pecs-demo [config.json]`. Set `RUST_LOG=debug` for per-refresh
//! detail.

mod components;
mod config;
mod systems;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use pecs::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use tracing::{info, warn};

use crate::components::{spawn, spawn_camera, Camera, DemoComponents, DemoWorld, Transform};
use crate::config::DemoConfig;
use crate::systems::{CameraSystem, TransformSystem};

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Ids to kill at the kill tick.
fn pick_victims(config: &DemoConfig, population: usize) -> Vec<EntityId> {
    match config.seed {
        Some(seed) => {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, population, config.kill_count)
                .into_iter()
                .map(|i| EntityId::from_raw(i as u32))
                .collect()
        }
        None => (0..config.kill_count as u32).map(EntityId::from_raw).collect(),
    }
}

fn kill_and_respawn(world: &mut DemoWorld, config: &DemoConfig) {
    let base_len = world.entity_count();
    let victims = pick_victims(config, base_len);

    info!(count = victims.len(), "killing entities");
    for id in &victims {
        world.kill_entity_by_id(*id);
    }

    info!(dead = world.dead_count(), "spawning new entities in their place");
    for _ in 0..victims.len() {
        spawn(world, "ayy lmao", Transform::at([1.0, 2.0, 3.0]));
    }
    world.refresh();

    let new_len = world.entity_count();
    info!(entities = new_len, dead = world.dead_count(), "respawn applied");
    if new_len > base_len {
        warn!(grew_by = new_len - base_len, "entity sequence grew");
        for e in world.entities().iter().filter(|e| !e.is_alive()) {
            warn!(entity = %e.id(), "entity unexpectedly dead");
        }
    }
}

fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let mut world = World::with_config(
        DemoComponents::default(),
        WorldConfig {
            entity_capacity: config.entity_count + 1,
            ..WorldConfig::default()
        },
    );
    let transforms = world.register_system(&SystemRef::new(TransformSystem::default()));
    let cameras = world.register_system(&SystemRef::new(CameraSystem::default()));

    info!(count = config.entity_count, "adding entities");
    let start = Instant::now();
    for _ in 0..config.entity_count {
        spawn(&mut world, "Hello", Transform::at([5.0, 6.0, 7.0]));
    }
    spawn_camera(
        &mut world,
        Camera {
            fov: 70.0,
            near: 0.1,
            far: 1000.0,
            exposure: 1.0,
        },
    );
    info!(elapsed_ms = elapsed_ms(start), "add");

    let start = Instant::now();
    let report = world.refresh();
    info!(
        elapsed_ms = elapsed_ms(start),
        activated = report.entities_added,
        "refresh"
    );

    for tick in 0..config.ticks {
        world.reset_skip_counters();
        let start = Instant::now();
        world.update(config.dt);

        if tick == config.kill_tick {
            kill_and_respawn(&mut world, config);
        }

        let metrics = world.metrics();
        info!(
            tick,
            elapsed_ms = elapsed_ms(start),
            skipped = metrics.entities_skipped,
            "update"
        );
    }
    world.refresh();

    let alive = world.alive_count();
    let metrics = world.metrics();
    info!(
        entities = world.entity_count(),
        alive,
        ticks = metrics.ticks,
        recycle_faults = metrics.recycle_faults,
        transforms_updated = transforms.borrow().updated,
        camera = ?cameras.borrow().camera(),
        "done"
    );

    let json = serde_json::to_string(&metrics).context("encoding metrics")?;
    info!(metrics = %json, "final metrics");

    if alive != world.entity_count() {
        anyhow::bail!(
            "{} of {} entities are dead after respawn",
            world.entity_count() - alive,
            world.entity_count()
        );
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DemoConfig::resolve(path.as_deref())?;
    info!(?config, "starting");
    run(&config)
}
