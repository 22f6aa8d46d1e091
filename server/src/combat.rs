//! Damage and respawn arbitration
//!
//! The arbiter is the only code allowed to change health, kill/death tallies
//! and the alive flag. Client reports reach it as [`TrustedHitReport`]s that
//! have already passed the trust boundary; everything here works purely on
//! room state and returns an outcome describing what the network layer must
//! broadcast.

use crate::room::Room;
use crate::trust::TrustedHitReport;
use log::info;
use shared::{AnimState, DefeatNotice, PlayerId, PublicState, RespawnPayload};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Handle to a deferred respawn stored on the session it will revive
///
/// The generation identifies which scheduling produced the timer. A timer
/// that fires after its session was rescheduled or removed carries a stale
/// generation and is ignored.
#[derive(Debug)]
pub struct RespawnTimer {
    pub generation: u64,
    handle: JoinHandle<()>,
}

impl RespawnTimer {
    pub fn new(generation: u64, handle: JoinHandle<()>) -> Self {
        Self { generation, handle }
    }

    /// Aborts the pending task. Safe to call after the task has completed.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Result of applying one hit report
#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutcome {
    /// Nothing changed: unknown or dead target, or the amount clamped to zero
    Ignored,
    /// Target lost health but is still alive
    Wounded { target: PublicState },
    /// Target reached zero health
    ///
    /// `attacker` is only present when a distinct session was credited with
    /// the kill and its tally changed.
    Defeated {
        target: PublicState,
        attacker: Option<PublicState>,
        notice: DefeatNotice,
    },
}

/// Post-respawn state: the private payload for the revived connection and
/// the public snapshot for everyone else
#[derive(Debug, Clone, PartialEq)]
pub struct Revival {
    pub private: RespawnPayload,
    pub public: PublicState,
}

/// Caps a reported hit to `[0, max_hit]`; non-finite amounts count as zero
pub fn clamp_damage(amount: f32, max_hit: f32) -> f32 {
    if amount.is_nan() {
        return 0.0;
    }
    amount.clamp(0.0, max_hit)
}

/// Applies a validated hit report to the room
///
/// Dead targets are left untouched, which makes repeated reports against the
/// same corpse no-ops until the respawn completes.
pub fn apply_damage(
    room: &mut Room,
    report: &TrustedHitReport,
    max_hit: f32,
    now: Instant,
) -> DamageOutcome {
    let alive = match room.get(report.target_id) {
        Some(target) => target.alive,
        None => return DamageOutcome::Ignored,
    };
    if !alive {
        return DamageOutcome::Ignored;
    }

    let damage = clamp_damage(report.amount, max_hit);
    if damage <= 0.0 {
        return DamageOutcome::Ignored;
    }

    let attacker_id = report
        .attacker_id
        .filter(|id| room.contains(*id));
    if let Some(attacker) = attacker_id.and_then(|id| room.get_mut(id)) {
        attacker.touch(now);
    }

    let Some(target) = room.get_mut(report.target_id) else {
        return DamageOutcome::Ignored;
    };
    target.touch(now);
    target.health = (target.health - damage).max(0.0);

    if target.health > 0.0 {
        return DamageOutcome::Wounded {
            target: target.public_state(),
        };
    }

    target.alive = false;
    target.deaths += 1;
    target.anim = AnimState::Down;
    let target_state = target.public_state();

    let credited = attacker_id.filter(|id| *id != report.target_id);
    let attacker_state = credited.and_then(|id| {
        let attacker = room.get_mut(id)?;
        attacker.kills += 1;
        Some(attacker.public_state())
    });

    match &attacker_state {
        Some(attacker) => info!("Player {} defeated player {}", attacker.id, target_state.id),
        None => info!("Player {} went down", target_state.id),
    }

    DamageOutcome::Defeated {
        notice: DefeatNotice {
            target_id: target_state.id,
            attacker_id: credited,
        },
        target: target_state,
        attacker: attacker_state,
    }
}

/// Revives a dead session at the next spawn point
///
/// Returns `None` if the session no longer exists. Health is restored to
/// exactly `max_health` and liveness is refreshed.
pub fn respawn(room: &mut Room, id: PlayerId, now: Instant) -> Option<Revival> {
    if !room.contains(id) {
        return None;
    }
    let spawn = room.next_spawn();
    let session = room.get_mut(id)?;

    if let Some((x, y)) = spawn {
        session.x = x;
        session.y = y;
    }
    session.health = session.max_health;
    session.alive = true;
    session.anim = AnimState::Idle;
    session.respawn_timer = None;
    session.touch(now);

    info!(
        "Player {} respawned at ({}, {})",
        session.id, session.x, session.y
    );

    Some(Revival {
        private: RespawnPayload {
            x: session.x,
            y: session.y,
            health: session.health,
            max_health: session.max_health,
            kills: session.kills,
            deaths: session.deaths,
        },
        public: session.public_state(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use assert_approx_eq::assert_approx_eq;
    use shared::{JoinRequest, SPAWN_POINTS};

    fn room_with(ids: &[PlayerId]) -> Room {
        let mut room = Room::new(&ServerConfig::default());
        for id in ids {
            let request = JoinRequest {
                name: Some(format!("P{}", id)),
                ..JoinRequest::default()
            };
            room.join(*id, &request, Instant::now()).unwrap();
        }
        room
    }

    fn hit(attacker: Option<PlayerId>, target: PlayerId, amount: f32) -> TrustedHitReport {
        TrustedHitReport {
            attacker_id: attacker,
            target_id: target,
            amount,
        }
    }

    #[test]
    fn test_clamp_damage() {
        assert_eq!(clamp_damage(999.0, 5.0), 5.0);
        assert_eq!(clamp_damage(-3.0, 5.0), 0.0);
        assert_approx_eq!(clamp_damage(2.5, 5.0), 2.5);
        assert_eq!(clamp_damage(f32::NAN, 5.0), 0.0);
        assert_eq!(clamp_damage(f32::INFINITY, 5.0), 5.0);
    }

    #[test]
    fn test_single_hit_wounds_target() {
        let mut room = room_with(&[1, 2]);
        let outcome = apply_damage(&mut room, &hit(Some(1), 2, 1.0), 5.0, Instant::now());

        match outcome {
            DamageOutcome::Wounded { target } => {
                assert_eq!(target.id, 2);
                assert_approx_eq!(target.health, 19.0);
                assert!(target.alive);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_oversized_hit_is_capped() {
        let mut room = room_with(&[1, 2]);
        apply_damage(&mut room, &hit(Some(1), 2, 999.0), 5.0, Instant::now());
        assert_approx_eq!(room.get(2).unwrap().health, 15.0);
    }

    #[test]
    fn test_zero_and_negative_hits_are_ignored() {
        let mut room = room_with(&[1, 2]);
        let before = room.get(2).unwrap().last_active;

        assert_eq!(
            apply_damage(&mut room, &hit(Some(1), 2, 0.0), 5.0, Instant::now()),
            DamageOutcome::Ignored
        );
        assert_eq!(
            apply_damage(&mut room, &hit(Some(1), 2, -4.0), 5.0, Instant::now()),
            DamageOutcome::Ignored
        );
        assert_eq!(room.get(2).unwrap().health, 20.0);
        assert_eq!(room.get(2).unwrap().last_active, before);
    }

    #[test]
    fn test_defeat_credits_distinct_attacker() {
        let mut room = room_with(&[1, 2]);
        let mut outcome = DamageOutcome::Ignored;
        for _ in 0..4 {
            outcome = apply_damage(&mut room, &hit(Some(1), 2, 5.0), 5.0, Instant::now());
        }

        match outcome {
            DamageOutcome::Defeated {
                target,
                attacker,
                notice,
            } => {
                assert_eq!(target.health, 0.0);
                assert!(!target.alive);
                assert_eq!(target.deaths, 1);
                assert_eq!(target.anim, AnimState::Down);
                assert_eq!(attacker.map(|a| a.kills), Some(1));
                assert_eq!(notice.target_id, 2);
                assert_eq!(notice.attacker_id, Some(1));
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_dead_target_is_never_damaged_again() {
        let mut room = room_with(&[1, 2]);
        for _ in 0..4 {
            apply_damage(&mut room, &hit(Some(1), 2, 5.0), 5.0, Instant::now());
        }

        for _ in 0..10 {
            let outcome = apply_damage(&mut room, &hit(Some(1), 2, 5.0), 5.0, Instant::now());
            assert_eq!(outcome, DamageOutcome::Ignored);
        }
        let target = room.get(2).unwrap();
        assert_eq!(target.health, 0.0);
        assert_eq!(target.deaths, 1);
        assert_eq!(room.get(1).unwrap().kills, 1);
    }

    #[test]
    fn test_self_inflicted_defeat_names_no_attacker() {
        let mut room = room_with(&[1]);
        let mut outcome = DamageOutcome::Ignored;
        for _ in 0..4 {
            outcome = apply_damage(&mut room, &hit(Some(1), 1, 5.0), 5.0, Instant::now());
        }

        match outcome {
            DamageOutcome::Defeated {
                attacker, notice, ..
            } => {
                assert!(attacker.is_none());
                assert_eq!(notice.attacker_id, None);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(room.get(1).unwrap().kills, 0);
    }

    #[test]
    fn test_unknown_target_is_ignored() {
        let mut room = room_with(&[1]);
        assert_eq!(
            apply_damage(&mut room, &hit(Some(1), 7, 1.0), 5.0, Instant::now()),
            DamageOutcome::Ignored
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_damage_refreshes_both_combatants() {
        let mut room = room_with(&[1, 2]);
        tokio::time::advance(std::time::Duration::from_secs(10)).await;
        let now = Instant::now();

        apply_damage(&mut room, &hit(Some(1), 2, 1.0), 5.0, now);
        assert_eq!(room.get(1).unwrap().last_active, now);
        assert_eq!(room.get(2).unwrap().last_active, now);
    }

    #[test]
    fn test_respawn_restores_full_health_at_next_spawn() {
        let mut room = room_with(&[1, 2]);
        for _ in 0..4 {
            apply_damage(&mut room, &hit(Some(1), 2, 5.0), 5.0, Instant::now());
        }

        let revival = respawn(&mut room, 2, Instant::now()).unwrap();
        // Two joins consumed the first two spawn points
        assert_eq!((revival.private.x, revival.private.y), SPAWN_POINTS[2]);
        assert_eq!(revival.private.health, revival.private.max_health);
        assert_eq!(revival.private.deaths, 1);
        assert!(revival.public.alive);
        assert_eq!(revival.public.anim, AnimState::Idle);
    }

    #[test]
    fn test_respawn_of_removed_session() {
        let mut room = room_with(&[1]);
        room.leave(1);
        assert!(respawn(&mut room, 1, Instant::now()).is_none());
    }
}
