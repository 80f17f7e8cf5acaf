// Overlay network caching and invalidation through the TerrainService
// resource.

mod common;

use std::sync::Arc;

use glam::{IVec2, Vec2};

use overlay_nav::engine::terrain::{DynamicHole, Sector, TerrainService};

use common::init_logging;

#[test]
fn same_radius_same_instance_until_invalidated() {
    init_logging();
    let mut terrain = TerrainService::default();
    terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(300, 300)));

    let first = terrain.compile_terrain_overlay_network(7.5);
    let second = terrain.compile_terrain_overlay_network(7.5);
    assert!(Arc::ptr_eq(&first, &second));

    // Radii are never rounded: a nearby radius is a separate network.
    let other = terrain.compile_terrain_overlay_network(7.5001);
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(terrain.overlay().cached_network_count(), 2);

    terrain.invalidate_caches();
    assert_eq!(terrain.overlay().cached_network_count(), 0);
    let fresh = terrain.compile_terrain_overlay_network(7.5);
    assert!(!Arc::ptr_eq(&first, &fresh));
}

#[test]
fn radius_too_large_for_the_sector_gives_an_empty_network() {
    init_logging();
    let mut terrain = TerrainService::default();
    terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(20, 20)));
    let network = terrain.compile_terrain_overlay_network(15.0);
    assert!(network.nodes().is_empty());
    assert!(network.find_node_containing_world_point(Vec2::splat(10.0), None).is_none());
    assert!(network.find_nearest_land_point(Vec2::splat(10.0)).is_none());
}

#[test]
fn hole_splits_a_corridor_into_two_nodes() {
    init_logging();
    let mut terrain = TerrainService::default();
    let sector = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(300, 60)));
    assert_eq!(terrain.compile_terrain_overlay_network(5.0).nodes().len(), 1);

    terrain
        .add_dynamic_hole(sector, DynamicHole::rectangle(Vec2::new(150.0, 30.0), Vec2::new(10.0, 40.0)))
        .unwrap();
    let network = terrain.compile_terrain_overlay_network(5.0);
    assert_eq!(network.nodes().len(), 2);
    let boundaries = network.debug_boundaries();
    assert_eq!(boundaries.len(), 2);
    assert!(boundaries.iter().all(|b| !b.contours.is_empty()));
}

#[test]
fn preview_network_is_reused_until_its_replacement_is_evaluated() {
    init_logging();
    let mut terrain = TerrainService::default();
    let a = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(200, 100)));
    let b = terrain.add_sector(Sector::rectangle(Vec2::new(200.0, 0.0), IVec2::new(200, 100)));
    terrain
        .connect_sectors(a, b, (Vec2::new(200.0, 0.0), Vec2::new(200.0, 100.0)))
        .unwrap();
    terrain.set_allow_preview_views(true);
    let before = terrain.compile_terrain_overlay_network(5.0);
    assert!(!before.is_preview());

    terrain
        .add_dynamic_hole(a, DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::new(10.0, 10.0)))
        .unwrap();
    let first = terrain.compile_terrain_overlay_network(5.0);
    assert!(first.is_preview());
    assert_eq!(first.preview_sectors(), &[a]);
    // Sector b was never replaced, so its evaluated view must not count.
    let second = terrain.compile_terrain_overlay_network(5.0);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id(), second.id());

    assert!(terrain.evaluate_pending_views() >= 1);
    let fresh = terrain.compile_terrain_overlay_network(5.0);
    assert!(!fresh.is_preview());
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert!(Arc::ptr_eq(&fresh, &terrain.compile_terrain_overlay_network(5.0)));
}

#[test]
fn turning_previews_off_replaces_a_cached_preview() {
    init_logging();
    let mut terrain = TerrainService::default();
    let sector = terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(200, 100)));
    terrain.set_allow_preview_views(true);
    terrain.compile_terrain_overlay_network(5.0);
    terrain
        .add_dynamic_hole(sector, DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::new(10.0, 10.0)))
        .unwrap();
    let preview = terrain.compile_terrain_overlay_network(5.0);
    assert!(preview.is_preview());
    assert!(preview.find_node_containing_world_point(Vec2::new(100.0, 50.0), None).is_some());

    terrain.set_allow_preview_views(false);
    let fresh = terrain.compile_terrain_overlay_network(5.0);
    assert!(!fresh.is_preview());
    assert!(fresh.find_node_containing_world_point(Vec2::new(100.0, 50.0), None).is_none());
}
