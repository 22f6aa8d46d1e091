//! Performance benchmarks for the per-frame and per-hit hot paths

use client::player::{LocalPlayer, PlayerControls};
use client::reconcile::GhostRoster;
use client::trails::DashTrails;
use server::combat::{apply_damage, respawn, DamageOutcome};
use server::config::ServerConfig;
use server::room::Room;
use server::trust::TrustedHitReport;
use shared::{
    AnimState, Character, ClientEvent, Facing, JoinRequest, MovementEcho, PublicState,
    ServerEvent, UpdatePayload, MAX_PLAYERS, REMOTE_SMOOTHING_RATE, SNAP_EPSILON,
};
use std::time::Instant;

fn ghost_state(id: u32) -> PublicState {
    PublicState {
        id,
        name: format!("Ghost{}", id),
        color: "#ff6b6b".to_string(),
        x: 100.0 * id as f32,
        y: 300.0,
        facing: Facing::Right,
        anim: AnimState::Idle,
        health: 20.0,
        max_health: 20.0,
        alive: true,
        kills: 0,
        deaths: 0,
        character: Some(Character::AliBaba),
    }
}

fn full_room() -> Room {
    let config = ServerConfig::default();
    let mut room = Room::new(&config);
    let now = tokio::time::Instant::now();
    for id in 1..=MAX_PLAYERS as u32 {
        let request = JoinRequest {
            ack: 1,
            name: Some(format!("Player{}", id)),
            ..JoinRequest::default()
        };
        room.join(id, &request, now).expect("Room should accept the player");
    }
    room
}

/// Benchmarks ghost smoothing for a full room
#[test]
fn benchmark_ghost_smoothing() {
    let mut roster = GhostRoster::new(REMOTE_SMOOTHING_RATE, SNAP_EPSILON);
    let mut trails = DashTrails::new();
    for id in 2..=MAX_PLAYERS as u32 {
        roster.register(&ghost_state(id), 0.0);
    }

    let dt = 1.0 / 60.0;
    let iterations = 100_000;
    let start = Instant::now();

    for frame in 0..iterations {
        // Keep the targets moving so smoothing never settles
        if frame % 4 == 0 {
            for id in 2..=MAX_PLAYERS as u32 {
                roster.apply_updated(
                    &MovementEcho {
                        id,
                        x: 100.0 * id as f32 + (frame % 400) as f32,
                        y: 300.0,
                        facing: Facing::Right,
                        anim: AnimState::Dash,
                    },
                    frame as f64 * dt as f64,
                );
            }
        }
        roster.update(dt, &mut trails);
        trails.update(dt);
    }

    let duration = start.elapsed();
    println!(
        "Ghost smoothing: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(trails.len() <= 60);
    // Should complete in under 2 seconds even in debug builds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the local integrator against the level geometry
#[test]
fn benchmark_local_integrator() {
    let mut player = LocalPlayer::new("Bench", Character::AliBaba);
    let mut controls = PlayerControls::default();
    let mut trails = DashTrails::new();

    let dt = 1.0 / 60.0;
    let iterations = 50_000;
    let start = Instant::now();

    for frame in 0..iterations {
        controls.right = (frame / 240) % 2 == 0;
        controls.left = !controls.right;
        if frame % 90 == 0 {
            controls.jump_queued = true;
        }
        player.update(dt, &mut controls, &mut trails);
    }

    let duration = start.elapsed();
    println!(
        "Local integrator: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(player.x.is_finite() && player.y.is_finite());
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks damage arbitration through repeated defeat and respawn cycles
#[test]
fn benchmark_damage_arbitration() {
    let mut room = full_room();
    let now = tokio::time::Instant::now();
    let report = TrustedHitReport {
        attacker_id: Some(1),
        target_id: 2,
        amount: 1.0,
    };

    let iterations = 100_000;
    let mut defeats = 0;
    let start = Instant::now();

    for _ in 0..iterations {
        if let DamageOutcome::Defeated { .. } = apply_damage(&mut room, &report, 5.0, now) {
            defeats += 1;
            respawn(&mut room, 2, now);
        }
    }

    let duration = start.elapsed();
    println!(
        "Damage arbitration: {} hits in {:?} ({:.2} ns/hit)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Twenty points of health per life
    assert_eq!(defeats, iterations / 20);
    assert_eq!(room.get(1).map(|s| s.kills), Some(defeats as u32));
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks JSON encoding of the hottest wire events
#[test]
fn benchmark_event_serialization() {
    let update = ClientEvent::Update(UpdatePayload {
        x: Some(512.5),
        y: Some(300.25),
        facing: Some(-1),
        anim: Some("run".to_string()),
    });
    let state = ServerEvent::State(ghost_state(3));

    let iterations = 20_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let text = serde_json::to_string(&update).expect("Failed to encode update");
        let _: ClientEvent = serde_json::from_str(&text).expect("Failed to decode update");
        let text = serde_json::to_string(&state).expect("Failed to encode state");
        let _: ServerEvent = serde_json::from_str(&text).expect("Failed to decode state");
    }

    let duration = start.elapsed();
    println!(
        "Event serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}
