// Headless demo: two sectors joined by a seam, a swarm and a lone walker
// crossing from one to the other, and a hole dropped mid-run.
//
// Usage: overlay_nav [config.json]
// Logging goes through env_logger, e.g. RUST_LOG=overlay_nav=debug.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use overlay_nav::engine::motion::{MotionComponent, MotionSystem, Swarm, SwarmMembership};
use overlay_nav::engine::terrain::{DynamicHole, Sector, SectorId, TerrainService, TerrainStaticMetadata};
use overlay_nav::engine::geometry::polygon::rectangle;
use overlay_nav::MotionConfig;

const TICKS: u32 = 240;
const REPORT_EVERY: u32 = 40;
const HOLE_TICK: u32 = 60;
const SWARM_SIZE: usize = 24;

// ============================================================================
// WORLD SETUP
// ============================================================================

fn build_terrain() -> (TerrainService, SectorId, SectorId) {
    let mut terrain = TerrainService::default();

    // West sector: a 400x300 field with a pillar in the middle.
    let west = terrain.add_sector(Sector::new(
        glam::Affine2::IDENTITY,
        TerrainStaticMetadata {
            included_contours: vec![rectangle(IVec2::ZERO, IVec2::new(400, 300))],
            excluded_contours: vec![rectangle(IVec2::new(180, 110), IVec2::new(220, 190))],
        },
    ));
    // East sector: same size, placed right of it.
    let east = terrain.add_sector(Sector::rectangle(Vec2::new(400.0, 0.0), IVec2::new(400, 300)));

    if let Err(e) = terrain.connect_sectors(west, east, (Vec2::new(400.0, 0.0), Vec2::new(400.0, 300.0))) {
        error!("failed to connect sectors: {e}");
    }
    (terrain, west, east)
}

fn spawn_test_entities(world: &mut World, count: usize, destination: Vec2) -> Entity {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let swarm = world.spawn(Swarm::new(destination)).id();

    for _ in 0..count {
        let position = Vec2::new(rng.gen_range(30.0..130.0), rng.gen_range(40.0..260.0));
        let radius = if rng.gen_bool(0.25) { 8.0 } else { 5.0 };
        world.spawn((MotionComponent::new(position, radius, 40.0), SwarmMembership { swarm }));
    }
    info!("spawned {count} swarm agents heading to {destination:?}");
    swarm
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match MotionConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        None => MotionConfig::default(),
    };
    info!("motion config: {config:?}");

    let (terrain, west, _) = build_terrain();
    let mut world = World::new();
    world.insert_resource(terrain);

    spawn_test_entities(&mut world, SWARM_SIZE, Vec2::new(700.0, 150.0));
    let walker = world
        .spawn(MotionComponent::new(Vec2::new(40.0, 20.0), 5.0, 40.0).with_destination(Vec2::new(760.0, 280.0)))
        .id();

    let mut motion = MotionSystem::new(config);
    for tick in 1..=TICKS {
        if tick == HOLE_TICK {
            let hole = DynamicHole::rectangle(Vec2::new(300.0, 150.0), Vec2::new(20.0, 60.0));
            let added = world.resource_mut::<TerrainService>().add_dynamic_hole(west, hole);
            match added {
                Ok(id) => {
                    let moved = motion.handle_hole_added(&mut world, west);
                    info!("tick {tick}: hole {id:?} added, {moved} agents displaced");
                }
                Err(e) => error!("tick {tick}: {e}"),
            }
        }

        motion.execute(&mut world);

        if tick % REPORT_EVERY == 0 {
            let reached = world
                .query::<&MotionComponent>()
                .iter(&world)
                .filter(|m| m.steering.is_destination_reached)
                .count();
            let lone = world.get::<MotionComponent>(walker).map(|m| m.pose.position);
            let stats = motion.stats();
            info!(
                "tick {tick}: {reached} agents arrived | walker at {lone:?} | avg force {:.1} | networks cached {}",
                stats.average_force_magnitude,
                world.resource::<TerrainService>().overlay().cached_network_count()
            );
        }
    }
}
