//! Performance benchmarks for the replication hot paths

use client::mirror::ShipMirror;
use server::ship_state::ShipStateManager;
use shared::{
    merge_indexed, Equivalent, GameData, Location, MissionData, Packet, ShipSnapshot, StateChange,
    TaskData, TrajectoryTargets,
};
use std::time::{Duration, Instant};

fn locations(count: usize, salt: i32) -> Vec<Location> {
    (0..count)
        .map(|i| {
            Location::new(
                &format!("loc{}", i),
                &format!("Location {}", i),
                TrajectoryTargets {
                    launch: (i as i32 * 7 + salt) % 360,
                    correction: (i as i32 * 11) % 360,
                    cube: (i as i32 * 13) % 360,
                },
            )
        })
        .collect()
}

fn missions(count: usize) -> Vec<MissionData> {
    (0..count)
        .map(|i| MissionData {
            mission_id: format!("m{}", i),
            title: format!("Mission {}", i),
            points: 10,
            tasks: (0..4)
                .map(|t| TaskData {
                    task_id: format!("m{}-t{}", i, t),
                    description: "Do the thing".to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .collect()
}

/// Benchmarks the positional merge when nothing changed
#[test]
fn benchmark_merge_unchanged() {
    let incoming = locations(200, 0);
    let mut existing = incoming.clone();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let ops = merge_indexed(&mut existing, &incoming, Location::is_equivalent);
        assert!(ops.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Unchanged merge (200 entries): {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration < Duration::from_secs(2));
}

/// Benchmarks the positional merge when every entry changes
#[test]
fn benchmark_merge_all_changed() {
    let iterations = 500;
    let mut existing = locations(200, 0);
    let start = Instant::now();

    for i in 0..iterations {
        let incoming = locations(200, i + 1);
        let ops = merge_indexed(&mut existing, &incoming, Location::is_equivalent);
        assert_eq!(ops.len(), 200);
    }

    let duration = start.elapsed();
    println!(
        "Full-rewrite merge (200 entries): {} iterations in {:?}",
        iterations, duration
    );

    assert!(duration < Duration::from_secs(5));
}

/// Benchmarks a whole poll merge on the ship state
#[test]
fn benchmark_ship_poll() {
    let mut ship = ShipStateManager::new(Duration::from_secs(3));
    let data = GameData {
        current_location_id: "loc0".to_string(),
        locations: locations(50, 0),
        missions: missions(20),
        cube_available: true,
        ..Default::default()
    };

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        ship.on_external_data(true, Some(&data), Instant::now())
            .unwrap();
        ship.outbox_mut().drain();
    }

    let duration = start.elapsed();
    println!("Ship poll merge: {} iterations in {:?}", iterations, duration);

    assert_eq!(ship.unlocked_locations().len(), 50);
    assert!(duration < Duration::from_secs(5));
}

/// Benchmarks snapshot serialization for a large ship
#[test]
fn benchmark_snapshot_serialization() {
    let snapshot = ShipSnapshot {
        unlocked_locations: locations(50, 0),
        missions: missions(20),
        ..Default::default()
    };
    let packet = Packet::Snapshot {
        snapshot: Box::new(snapshot),
    };

    let iterations = 5_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = bincode::serialize(&packet).unwrap();
        let _: Packet = bincode::deserialize(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot round trip: {} iterations in {:?}",
        iterations, duration
    );

    assert!(duration < Duration::from_secs(5));
}

/// Benchmarks replaying deltas on a terminal's mirror
#[test]
fn benchmark_mirror_replay() {
    let mut mirror = ShipMirror::new();
    mirror.apply_snapshot(ShipSnapshot::default());

    let changes: Vec<StateChange> = (0..10_000)
        .map(|i| StateChange::Thruster {
            index: i % 4,
            on: i % 8 < 4,
        })
        .collect();

    let start = Instant::now();
    for change in changes {
        mirror.apply_change(change);
    }
    let duration = start.elapsed();

    println!("Mirror replay: 10000 changes in {:?}", duration);
    assert!(mirror.is_synced());
    assert!(duration < Duration::from_secs(1));
}
