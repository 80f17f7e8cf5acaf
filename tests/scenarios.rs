// End-to-end motion scenarios driven through a real bevy_ecs World.

mod common;

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};

use overlay_nav::engine::motion::{MotionComponent, MotionSystem, Swarm, SwarmMembership};
use overlay_nav::engine::terrain::{DynamicHole, Sector, SectorId, TerrainService};
use overlay_nav::MotionConfig;

use common::{init_logging, motion, single_sector_world, two_sector_world};

#[test]
fn lone_agent_reaches_its_destination() {
    init_logging();
    let mut world = single_sector_world(Vec2::new(-100.0, -100.0), IVec2::new(700, 200));
    let agent = world
        .spawn(MotionComponent::new(Vec2::ZERO, 10.0, 40.0).with_destination(Vec2::new(500.0, 0.0)))
        .id();
    let mut system = MotionSystem::default();
    let step = 40.0 * system.config().tick_seconds;

    for _ in 0..200 {
        system.execute(&mut world);
        if motion(&world, agent).steering.is_destination_reached {
            break;
        }
    }

    let m = motion(&world, agent);
    assert!(m.steering.is_destination_reached);
    assert!(m.pose.position.distance(Vec2::new(500.0, 0.0)) <= step, "ended at {:?}", m.pose.position);
    assert!(m.localization.is_some());
    assert!((m.pose.look_at - Vec2::X).length() < 1e-4);
}

#[test]
fn crossing_a_seam_switches_sector_without_a_jump() {
    init_logging();
    let (mut world, a, b) = two_sector_world();
    let agent = world
        .spawn(MotionComponent::new(Vec2::new(50.0, 50.0), 5.0, 40.0).with_destination(Vec2::new(350.0, 50.0)))
        .id();
    let mut system = MotionSystem::default();
    let step = 40.0 * system.config().tick_seconds;

    system.execute(&mut world);
    let mut previous = motion(&world, agent).clone();
    assert_eq!(previous.localization.map(|l| l.sector), Some(a));

    let mut switched = false;
    for _ in 0..200 {
        system.execute(&mut world);
        let current = motion(&world, agent).clone();
        assert!(current.pose.position.distance(previous.pose.position) <= step + 1e-3);

        let (before, after) = (previous.localization.unwrap(), current.localization.unwrap());
        if before.sector == a && after.sector == b {
            switched = true;
            let terrain = world.resource::<TerrainService>();
            let in_b = terrain.sector(b).unwrap().local_to_world(after.local_position);
            assert!(in_b.distance(current.pose.position) < 1e-3);
        }
        previous = current;
        if previous.steering.is_destination_reached {
            break;
        }
    }

    assert!(switched, "agent never changed sector");
    assert!(previous.steering.is_destination_reached);
    assert!(previous.pose.position.distance(Vec2::new(350.0, 50.0)) <= step);
}

#[test]
fn hole_under_a_standing_agent_pushes_it_out() {
    init_logging();
    let mut world = single_sector_world(Vec2::ZERO, IVec2::new(200, 100));
    let agent = world.spawn(MotionComponent::new(Vec2::new(100.0, 50.0), 5.0, 40.0)).id();
    let mut system = MotionSystem::default();
    system.execute(&mut world);
    assert!(motion(&world, agent).localization.is_some());

    world
        .resource_mut::<TerrainService>()
        .add_dynamic_hole(SectorId(0), DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::splat(10.0)))
        .unwrap();
    assert_eq!(system.handle_hole_added(&mut world, SectorId(0)), 1);

    let outside_dilated_hole = |p: Vec2| (p.x - 100.0).abs() >= 14.9 || (p.y - 50.0).abs() >= 14.9;
    let m = motion(&world, agent).clone();
    assert!(outside_dilated_hole(m.pose.position), "still in the hole at {:?}", m.pose.position);

    let loc = m.localization.expect("agent relocalized");
    let network = world.resource_mut::<TerrainService>().compile_terrain_overlay_network(5.0);
    assert_eq!(loc.network, network.id());
    let island = network.node(loc.node).island().unwrap();
    let triangle = &island.triangles[loc.triangle];
    assert!(triangle.contains(loc.local_position, 1e-3));
    assert!(outside_dilated_hole(triangle.centroid));

    // The next tick keeps it on the mesh.
    system.execute(&mut world);
    let m = motion(&world, agent);
    assert!(m.localization.is_some());
    assert!(outside_dilated_hole(m.pose.position));
}

#[test]
fn overlapping_agents_repel_symmetrically_until_apart() {
    init_logging();
    let mut world = single_sector_world(Vec2::ZERO, IVec2::new(300, 200));
    let first = world.spawn(MotionComponent::new(Vec2::new(150.0, 100.0), 5.0, 40.0)).id();
    let second = world.spawn(MotionComponent::new(Vec2::new(153.0, 100.0), 5.0, 40.0)).id();
    let mut system = MotionSystem::default();

    let mut ticks = 0;
    loop {
        let gap_before = motion(&world, first).pose.position.distance(motion(&world, second).pose.position);
        if gap_before >= 10.0 {
            break;
        }
        system.execute(&mut world);
        ticks += 1;
        assert!(ticks < 50, "agents never separated");

        let fa = motion(&world, first).steering.current.separation;
        let fb = motion(&world, second).steering.current.separation;
        assert!(fa.length() > 0.0);
        assert!((fa + fb).length() < 1e-3 * fa.length());
        assert!(fa.x < 0.0 && fb.x > 0.0);
    }

    let pa = motion(&world, first).pose.position;
    let pb = motion(&world, second).pose.position;
    assert!(pa.x < 150.0 && pb.x > 153.0);
}

#[test]
fn swarm_closes_in_on_its_destination() {
    init_logging();
    let mut world = single_sector_world(Vec2::ZERO, IVec2::new(600, 300));
    let destination = Vec2::new(500.0, 150.0);
    let swarm = world.spawn(Swarm::new(destination)).id();
    let members: Vec<Entity> = (0..6)
        .map(|i| {
            let position = Vec2::new(40.0 + 15.0 * (i % 3) as f32, 120.0 + 20.0 * (i / 3) as f32);
            world.spawn((MotionComponent::new(position, 5.0, 40.0), SwarmMembership { swarm })).id()
        })
        .collect();
    let mean_distance = |world: &World| {
        members.iter().map(|&e| motion(world, e).pose.position.distance(destination)).sum::<f32>() / members.len() as f32
    };
    let start = mean_distance(&world);

    let mut system = MotionSystem::new(MotionConfig::default());
    for _ in 0..150 {
        system.execute(&mut world);
    }

    let end = mean_distance(&world);
    assert!(end < start / 3.0, "mean distance {start} -> {end}");
    assert!(world.get::<Swarm>(swarm).unwrap().ticks_since_destination >= 150);
    assert!(members.iter().all(|&e| motion(&world, e).localization.is_some()));
    assert_eq!(system.stats().ticks, 150);
}

#[test]
fn hole_recovery_ignores_preview_views() {
    init_logging();
    let mut world = single_sector_world(Vec2::ZERO, IVec2::new(200, 100));
    let agent = world.spawn(MotionComponent::new(Vec2::new(100.0, 50.0), 5.0, 40.0)).id();
    let mut system = MotionSystem::new(MotionConfig { allow_preview_views: true, ..Default::default() });
    system.execute(&mut world);
    assert!(motion(&world, agent).localization.is_some());

    world
        .resource_mut::<TerrainService>()
        .add_dynamic_hole(SectorId(0), DynamicHole::rectangle(Vec2::new(100.0, 50.0), Vec2::splat(10.0)))
        .unwrap();
    assert_eq!(system.handle_hole_added(&mut world, SectorId(0)), 1);
    let position = motion(&world, agent).pose.position;
    assert!((position.x - 100.0).abs() >= 14.9 || (position.y - 50.0).abs() >= 14.9, "still at {position:?}");

    // The tick runs with previews allowed again and keeps the fresh network.
    let network = motion(&world, agent).localization.unwrap().network;
    system.execute(&mut world);
    assert_eq!(motion(&world, agent).localization.unwrap().network, network);
}

#[test]
fn walker_keeps_going_while_a_preview_stands_in() {
    init_logging();
    let (mut world, a, b) = two_sector_world();
    let destination = Vec2::new(350.0, 50.0);
    let agent = world
        .spawn(MotionComponent::new(Vec2::new(30.0, 50.0), 5.0, 40.0).with_destination(destination))
        .id();
    let mut system = MotionSystem::new(MotionConfig { allow_preview_views: true, ..Default::default() });
    let step = 40.0 * system.config().tick_seconds;
    for _ in 0..5 {
        system.execute(&mut world);
    }
    let before = motion(&world, agent).clone();
    let first_network = before.localization.unwrap().network;

    world
        .resource_mut::<TerrainService>()
        .add_dynamic_hole(a, DynamicHole::rectangle(Vec2::new(150.0, 90.0), Vec2::splat(6.0)))
        .unwrap();
    system.execute(&mut world);
    let preview = motion(&world, agent).clone();
    let preview_network = preview.localization.unwrap().network;
    assert_ne!(preview_network, first_network);
    assert!(preview.pose.position.distance(before.pose.position) <= step + 1e-3);

    // The replacement views were punched at the end of that tick.
    system.execute(&mut world);
    assert_ne!(motion(&world, agent).localization.unwrap().network, preview_network);

    let mut previous = motion(&world, agent).clone();
    for _ in 0..200 {
        if previous.steering.is_destination_reached {
            break;
        }
        system.execute(&mut world);
        let current = motion(&world, agent).clone();
        assert!(current.pose.position.distance(previous.pose.position) <= step + 1e-3);
        previous = current;
    }
    assert!(previous.steering.is_destination_reached);
    assert_eq!(previous.localization.map(|l| l.sector), Some(b));
}

#[test]
fn swarmer_hands_over_to_the_next_sector() {
    init_logging();
    let (mut world, a, b) = two_sector_world();
    let destination = Vec2::new(350.0, 50.0);
    let swarm = world.spawn(Swarm::new(destination)).id();
    let member = world
        .spawn((MotionComponent::new(Vec2::new(50.0, 50.0), 5.0, 40.0), SwarmMembership { swarm }))
        .id();
    let mut system = MotionSystem::default();
    let step = 40.0 * system.config().tick_seconds;

    system.execute(&mut world);
    let mut previous = motion(&world, member).clone();
    assert_eq!(previous.localization.map(|l| l.sector), Some(a));

    let mut switched = false;
    for _ in 0..150 {
        system.execute(&mut world);
        let current = motion(&world, member).clone();
        assert!(current.pose.position.distance(previous.pose.position) <= step + 1e-3);
        let (before, after) = (previous.localization.unwrap(), current.localization.unwrap());
        if before.sector == a && after.sector == b {
            switched = true;
            let terrain = world.resource::<TerrainService>();
            let in_b = terrain.sector(b).unwrap().local_to_world(after.local_position);
            assert!(in_b.distance(current.pose.position) < 1e-3);
        }
        previous = current;
    }

    assert!(switched, "swarmer never changed sector");
    assert_eq!(previous.localization.map(|l| l.sector), Some(b));
    assert!(previous.pose.position.distance(destination) < 15.0, "ended at {:?}", previous.pose.position);
}

#[test]
fn agents_far_apart_share_a_tick() {
    init_logging();
    let mut terrain = TerrainService::default();
    terrain.add_sector(Sector::rectangle(Vec2::ZERO, IVec2::new(100, 100)));
    let far = terrain.add_sector(Sector::rectangle(Vec2::splat(70000.0), IVec2::new(100, 100)));
    let mut world = World::new();
    world.insert_resource(terrain);
    let near_agent = world.spawn(MotionComponent::new(Vec2::new(50.0, 50.0), 0.1, 40.0)).id();
    let far_agent = world.spawn(MotionComponent::new(Vec2::splat(70050.0), 0.1, 40.0)).id();

    let mut system = MotionSystem::default();
    system.execute(&mut world);

    assert_eq!(motion(&world, near_agent).localization.map(|l| l.sector), Some(SectorId(0)));
    assert_eq!(motion(&world, far_agent).localization.map(|l| l.sector), Some(far));
    assert_eq!(motion(&world, near_agent).steering.current.separation, Vec2::ZERO);
    assert_eq!(motion(&world, far_agent).pose.position, Vec2::splat(70050.0));
}
