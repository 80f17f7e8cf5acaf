// Shared setup for the end-to-end tests.

#![allow(dead_code)]

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};

use overlay_nav::engine::motion::MotionComponent;
use overlay_nav::engine::terrain::{Sector, SectorId, TerrainService};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// World with a single sector covering `origin .. origin + size`.
pub fn single_sector_world(origin: Vec2, size: IVec2) -> World {
    let mut terrain = TerrainService::default();
    terrain.add_sector(Sector::rectangle(origin, size));
    let mut world = World::new();
    world.insert_resource(terrain);
    world
}

/// Two 200x100 sectors side by side, joined along x = 200.
pub fn two_sector_world() -> (World, SectorId, SectorId) {
    let mut terrain = TerrainService::default();
    let a = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(200, 100)));
    let b = terrain.add_sector(Sector::rectangle(Vec2::new(200.0, 0.0), IVec2::new(200, 100)));
    terrain
        .connect_sectors(a, b, (Vec2::new(200.0, 0.0), Vec2::new(200.0, 100.0)))
        .expect("both sectors exist");
    let mut world = World::new();
    world.insert_resource(terrain);
    (world, a, b)
}

pub fn motion(world: &World, entity: Entity) -> &MotionComponent {
    world.get::<MotionComponent>(entity).expect("entity has a motion component")
}
