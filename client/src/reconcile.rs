//! Remote player reconciliation
//!
//! Every other member of the room is represented locally by a [`RemoteGhost`].
//! Ghosts never jump to a reported position: the server only gives us the
//! latest target, and the rendered position approaches it exponentially so
//! the motion stays smooth regardless of frame rate or packet cadence.
//!
//! Exceptions to smoothing:
//! - A dead ghost freezes at the point the server reported.
//! - A ghost within the snap epsilon of its target lands on it exactly.
//!
//! Health is never signalled as a hit. A ghost flashes when a new full state
//! reports less health than the previous one.

use crate::trails::{DashTrails, REMOTE_TRAIL_OPACITY};
use shared::{
    clamp_to_world, AnimState, Character, Facing, MovementEcho, PlayerId, PublicState,
    DASH_TRAIL_INTERVAL, DEFAULT_HEALTH, GROUND_Y, HIT_FLASH_DURATION, PLAYER_HEIGHT,
    PLAYER_WIDTH, REMOTE_SMOOTHING_RATE, SINBAD_ATTACK_DURATION, SNAP_EPSILON,
};
use std::collections::BTreeMap;

pub const FALLBACK_NAME: &str = "Ally";
pub const FALLBACK_COLOR: &str = "#66ffcc";
/// Ghost trails spawn a little slower than the local player's
pub const REMOTE_TRAIL_INTERVAL: f32 = DASH_TRAIL_INTERVAL * 1.1;
const FALLBACK_X: f32 = 140.0;
const FALLBACK_Y: f32 = GROUND_Y - 72.0;

/// Fraction of the remaining distance covered in one frame of `dt` seconds
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt.max(0.0)).exp()
}

/// Local proxy for a remote player
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteGhost {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub character: Character,
    /// Rendered position
    pub x: f32,
    pub y: f32,
    /// Latest authoritative position
    pub target_x: f32,
    pub target_y: f32,
    pub width: f32,
    pub height: f32,
    pub facing: Facing,
    pub anim: AnimState,
    /// Seconds spent in the current animation
    pub anim_time: f32,
    pub attack_timer: f32,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    pub hit_flash: f32,
    pub dash_trail_timer: f32,
    pub dash_trail_active: bool,
    /// Roster clock reading of the last update for this ghost
    pub last_update: f64,
}

impl RemoteGhost {
    fn placeholder(id: PlayerId, x: f32, y: f32, now: f64) -> Self {
        Self {
            id,
            name: FALLBACK_NAME.to_string(),
            color: FALLBACK_COLOR.to_string(),
            character: Character::default(),
            x,
            y,
            target_x: x,
            target_y: y,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            facing: Facing::Right,
            anim: AnimState::Idle,
            anim_time: 0.0,
            attack_timer: 0.0,
            health: DEFAULT_HEALTH,
            max_health: DEFAULT_HEALTH,
            alive: true,
            kills: 0,
            deaths: 0,
            hit_flash: 0.0,
            dash_trail_timer: REMOTE_TRAIL_INTERVAL,
            dash_trail_active: false,
            last_update: now,
        }
    }

    /// Switches animation and runs the transition side effects
    pub fn set_anim(&mut self, anim: AnimState) {
        if self.anim == anim {
            return;
        }
        self.anim = anim;
        self.anim_time = 0.0;
        self.dash_trail_active = false;
        self.dash_trail_timer = if anim == AnimState::Dash {
            0.0
        } else {
            REMOTE_TRAIL_INTERVAL
        };
        self.attack_timer = if anim == AnimState::Attack {
            SINBAD_ATTACK_DURATION
        } else {
            0.0
        };
    }

    pub fn is_dashing(&self) -> bool {
        self.alive && self.anim == AnimState::Dash
    }

    /// Distance still to cover before the ghost sits on its target
    pub fn offset(&self) -> (f32, f32) {
        (self.target_x - self.x, self.target_y - self.y)
    }
}

/// All remote ghosts, keyed by session id
#[derive(Debug)]
pub struct GhostRoster {
    ghosts: BTreeMap<PlayerId, RemoteGhost>,
    local_id: Option<PlayerId>,
    smoothing_rate: f32,
    snap_epsilon: f32,
}

impl Default for GhostRoster {
    fn default() -> Self {
        Self::new(REMOTE_SMOOTHING_RATE, SNAP_EPSILON)
    }
}

impl GhostRoster {
    pub fn new(smoothing_rate: f32, snap_epsilon: f32) -> Self {
        Self {
            ghosts: BTreeMap::new(),
            local_id: None,
            smoothing_rate,
            snap_epsilon,
        }
    }

    /// Id of the local session; events about it never create a ghost
    pub fn set_local_id(&mut self, id: Option<PlayerId>) {
        self.local_id = id;
        if let Some(id) = id {
            self.ghosts.remove(&id);
        }
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Creates or merges a ghost from a full public state
    ///
    /// An existing ghost keeps its rendered position and only retargets, so a
    /// re-registration never teleports it.
    pub fn register(&mut self, state: &PublicState, now: f64) -> Option<&mut RemoteGhost> {
        if Some(state.id) == self.local_id {
            return None;
        }

        let previous = self.ghosts.remove(&state.id);
        let (x, y) = match &previous {
            Some(prev) => (prev.x, prev.y),
            None => (state.x, state.y),
        };
        let mut ghost = previous.unwrap_or_else(|| RemoteGhost::placeholder(state.id, x, y, now));

        let name = state.name.trim();
        if !name.is_empty() {
            ghost.name = name.to_string();
        }
        if !state.color.trim().is_empty() {
            ghost.color = state.color.clone();
        }
        if let Some(character) = state.character {
            ghost.character = character;
        }
        ghost.target_x = state.x;
        ghost.target_y = state.y;
        ghost.facing = state.facing;
        ghost.set_anim(state.anim);
        ghost.health = state.health;
        ghost.max_health = state.max_health;
        ghost.alive = state.alive;
        ghost.kills = state.kills;
        ghost.deaths = state.deaths;
        ghost.last_update = now;

        Some(self.ghosts.entry(state.id).or_insert(ghost))
    }

    /// Retargets a ghost from a movement echo
    pub fn apply_updated(&mut self, echo: &MovementEcho, now: f64) {
        if Some(echo.id) == self.local_id {
            return;
        }
        let ghost = self
            .ghosts
            .entry(echo.id)
            .or_insert_with(|| RemoteGhost::placeholder(echo.id, echo.x, echo.y, now));

        ghost.target_x = echo.x;
        ghost.target_y = echo.y;
        ghost.facing = echo.facing;
        ghost.set_anim(echo.anim);
        ghost.last_update = now;
    }

    /// Merges a server-arbitrated full state into a remote ghost
    ///
    /// Returns true if the ghost lost health and started flashing.
    pub fn apply_state(&mut self, state: &PublicState, now: f64) -> bool {
        if Some(state.id) == self.local_id {
            return false;
        }
        let previous_health = self.ghosts.get(&state.id).map(|ghost| ghost.health);

        let Some(ghost) = self.register(state, now) else {
            return false;
        };
        if !ghost.alive {
            ghost.x = ghost.target_x;
            ghost.y = ghost.target_y;
        }

        match previous_health {
            Some(previous) if ghost.health < previous => {
                ghost.hit_flash = HIT_FLASH_DURATION;
                true
            }
            _ => false,
        }
    }

    pub fn apply_respawned(&mut self, state: &PublicState, now: f64) {
        if let Some(ghost) = self.register(state, now) {
            ghost.alive = true;
            ghost.hit_flash = 0.0;
        }
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<RemoteGhost> {
        self.ghosts.remove(&id)
    }

    pub fn clear(&mut self) {
        self.ghosts.clear();
    }

    pub fn get(&self, id: PlayerId) -> Option<&RemoteGhost> {
        self.ghosts.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut RemoteGhost> {
        self.ghosts.get_mut(&id)
    }

    pub fn name_of(&self, id: PlayerId) -> Option<&str> {
        self.ghosts.get(&id).map(|ghost| ghost.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteGhost> {
        self.ghosts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemoteGhost> {
        self.ghosts.values_mut()
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// Advances every ghost by one frame
    pub fn update(&mut self, dt: f32, trails: &mut DashTrails) {
        let smoothing = smoothing_factor(self.smoothing_rate, dt);

        for ghost in self.ghosts.values_mut() {
            ghost.anim_time += dt;
            ghost.hit_flash = (ghost.hit_flash - dt).max(0.0);
            ghost.attack_timer = (ghost.attack_timer - dt).max(0.0);

            // Dead ghosts stay where they fell until respawned
            if !ghost.alive {
                ghost.dash_trail_active = false;
                continue;
            }

            let (dx, dy) = ghost.offset();
            if dx.abs() < self.snap_epsilon && dy.abs() < self.snap_epsilon {
                ghost.x = ghost.target_x;
                ghost.y = ghost.target_y;
            } else {
                ghost.x += dx * smoothing;
                ghost.y += dy * smoothing;
            }
            let (x, y) = clamp_to_world(ghost.x, ghost.y);
            ghost.x = x;
            ghost.y = y;

            if !ghost.is_dashing() {
                ghost.dash_trail_active = false;
                ghost.dash_trail_timer = REMOTE_TRAIL_INTERVAL;
                continue;
            }

            ghost.dash_trail_timer -= dt;
            if !ghost.dash_trail_active || ghost.dash_trail_timer <= 0.0 {
                trails.spawn(
                    ghost.x,
                    ghost.y,
                    ghost.width,
                    ghost.height,
                    ghost.facing,
                    &ghost.color,
                    REMOTE_TRAIL_OPACITY,
                );
                ghost.dash_trail_timer = REMOTE_TRAIL_INTERVAL;
                ghost.dash_trail_active = true;
            }
        }
    }
}

/// Accumulator driving the fixed-cadence snapshot send
#[derive(Debug, Clone)]
pub struct SnapshotClock {
    interval: f32,
    accumulator: f32,
}

impl SnapshotClock {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    /// Adds elapsed time and reports whether a snapshot is due
    pub fn tick(&mut self, dt: f32) -> bool {
        self.accumulator += dt;
        if self.accumulator >= self.interval {
            self.accumulator = 0.0;
            return true;
        }
        false
    }

    /// Restarts the cadence after an out-of-band send
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn state(id: PlayerId, x: f32, y: f32) -> PublicState {
        PublicState {
            id,
            name: format!("P{}", id),
            color: "#ff6699".to_string(),
            x,
            y,
            facing: Facing::Right,
            anim: AnimState::Idle,
            health: 20.0,
            max_health: 20.0,
            alive: true,
            kills: 0,
            deaths: 0,
            character: Some(Character::Sinbad),
        }
    }

    fn echo(id: PlayerId, x: f32, y: f32, anim: AnimState) -> MovementEcho {
        MovementEcho {
            id,
            x,
            y,
            facing: Facing::Left,
            anim,
        }
    }

    #[test]
    fn test_smoothing_factor_is_frame_rate_independent() {
        let one_step = smoothing_factor(12.0, 1.0 / 30.0);
        let half = smoothing_factor(12.0, 1.0 / 60.0);
        let two_steps = 1.0 - (1.0 - half) * (1.0 - half);

        assert_approx_eq!(one_step, two_steps, 1e-5);
        assert_approx_eq!(smoothing_factor(12.0, 0.0), 0.0);
    }

    #[test]
    fn test_register_ignores_local_player() {
        let mut roster = GhostRoster::default();
        roster.set_local_id(Some(1));

        assert!(roster.register(&state(1, 0.0, 0.0), 0.0).is_none());
        assert!(roster.register(&state(2, 0.0, 0.0), 0.0).is_some());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_register_merge_keeps_rendered_position() {
        let mut roster = GhostRoster::default();
        roster.register(&state(2, 100.0, 200.0), 0.0);
        roster.register(&state(2, 900.0, 300.0), 1.0);

        let ghost = roster.get(2).unwrap();
        assert_approx_eq!(ghost.x, 100.0);
        assert_approx_eq!(ghost.y, 200.0);
        assert_approx_eq!(ghost.target_x, 900.0);
        assert_approx_eq!(ghost.target_y, 300.0);
        assert_eq!(ghost.character, Character::Sinbad);
    }

    #[test]
    fn test_register_falls_back_to_placeholder_name_and_color() {
        let mut roster = GhostRoster::default();
        let mut blank = state(3, 0.0, 0.0);
        blank.name = "   ".to_string();
        blank.color = String::new();
        roster.register(&blank, 0.0);

        let ghost = roster.get(3).unwrap();
        assert_eq!(ghost.name, FALLBACK_NAME);
        assert_eq!(ghost.color, FALLBACK_COLOR);
    }

    #[test]
    fn test_updated_for_unknown_ghost_registers_placeholder() {
        let mut roster = GhostRoster::default();
        roster.apply_updated(&echo(4, 300.0, 100.0, AnimState::Run), 2.0);

        let ghost = roster.get(4).unwrap();
        assert_eq!(ghost.name, FALLBACK_NAME);
        assert_approx_eq!(ghost.x, 300.0);
        assert_eq!(ghost.anim, AnimState::Run);
        assert_eq!(ghost.facing, Facing::Left);
    }

    #[test]
    fn test_updated_ignores_own_id() {
        let mut roster = GhostRoster::default();
        roster.set_local_id(Some(1));
        roster.apply_updated(&echo(1, 300.0, 100.0, AnimState::Run), 0.0);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_anim_transition_resets_trail_timer() {
        let mut roster = GhostRoster::default();
        roster.register(&state(2, 0.0, 0.0), 0.0);

        roster.apply_updated(&echo(2, 0.0, 0.0, AnimState::Dash), 0.1);
        let ghost = roster.get(2).unwrap();
        assert_approx_eq!(ghost.dash_trail_timer, 0.0);
        assert!(!ghost.dash_trail_active);

        roster.apply_updated(&echo(2, 0.0, 0.0, AnimState::Run), 0.2);
        assert_approx_eq!(roster.get(2).unwrap().dash_trail_timer, REMOTE_TRAIL_INTERVAL);

        roster.apply_updated(&echo(2, 0.0, 0.0, AnimState::Attack), 0.3);
        assert_approx_eq!(roster.get(2).unwrap().attack_timer, SINBAD_ATTACK_DURATION);
    }

    #[test]
    fn test_health_decrease_triggers_hit_flash() {
        let mut roster = GhostRoster::default();
        roster.register(&state(2, 0.0, 0.0), 0.0);

        let mut hurt = state(2, 0.0, 0.0);
        hurt.health = 19.0;
        assert!(roster.apply_state(&hurt, 0.1));
        assert_approx_eq!(roster.get(2).unwrap().hit_flash, HIT_FLASH_DURATION);

        // Same health again is not a hit
        roster.get_mut(2).unwrap().hit_flash = 0.0;
        assert!(!roster.apply_state(&hurt, 0.2));
        assert_approx_eq!(roster.get(2).unwrap().hit_flash, 0.0);
    }

    #[test]
    fn test_first_state_for_unknown_ghost_does_not_flash() {
        let mut roster = GhostRoster::default();
        let mut hurt = state(5, 0.0, 0.0);
        hurt.health = 3.0;
        assert!(!roster.apply_state(&hurt, 0.0));
        assert!(roster.get(5).is_some());
    }

    #[test]
    fn test_dead_ghost_freezes_at_reported_position() {
        let mut roster = GhostRoster::default();
        roster.register(&state(2, 100.0, 100.0), 0.0);

        let mut dead = state(2, 500.0, 300.0);
        dead.alive = false;
        dead.health = 0.0;
        dead.anim = AnimState::Down;
        roster.apply_state(&dead, 0.1);

        let ghost = roster.get(2).unwrap();
        assert_approx_eq!(ghost.x, 500.0);
        assert_approx_eq!(ghost.y, 300.0);
        assert!(!ghost.alive);
    }

    #[test]
    fn test_dead_ghost_does_not_drift_toward_new_target() {
        let mut roster = GhostRoster::default();
        let mut trails = DashTrails::new();
        roster.register(&state(2, 100.0, 300.0), 0.0);

        // A dead state arriving through a plain registration retargets only
        let mut dead = state(2, 900.0, 300.0);
        dead.alive = false;
        dead.anim = AnimState::Down;
        roster.register(&dead, 0.1);
        roster.apply_updated(&echo(2, 1200.0, 200.0, AnimState::Down), 0.2);

        for _ in 0..60 {
            roster.update(1.0 / 60.0, &mut trails);
        }

        let ghost = roster.get(2).unwrap();
        assert_approx_eq!(ghost.x, 100.0);
        assert_approx_eq!(ghost.y, 300.0);

        // Respawn lets smoothing resume
        roster.apply_respawned(&state(2, 760.0, 360.0), 1.0);
        roster.update(1.0 / 60.0, &mut trails);
        assert!(roster.get(2).unwrap().x > 100.0);
    }

    #[test]
    fn test_respawned_clears_flash_and_revives() {
        let mut roster = GhostRoster::default();
        roster.register(&state(2, 0.0, 0.0), 0.0);
        roster.get_mut(2).unwrap().hit_flash = 0.2;
        roster.get_mut(2).unwrap().alive = false;

        roster.apply_respawned(&state(2, 760.0, 360.0), 1.0);

        let ghost = roster.get(2).unwrap();
        assert!(ghost.alive);
        assert_approx_eq!(ghost.hit_flash, 0.0);
    }

    #[test]
    fn test_smoothing_is_monotonic_until_snap() {
        let mut roster = GhostRoster::default();
        let mut trails = DashTrails::new();
        roster.register(&state(2, 100.0, 200.0), 0.0);
        roster.apply_updated(&echo(2, 400.0, 250.0, AnimState::Run), 0.0);

        let distance = |roster: &GhostRoster| {
            let (dx, dy) = roster.get(2).unwrap().offset();
            (dx * dx + dy * dy).sqrt()
        };

        let mut previous = distance(&roster);
        let mut frames = 0;
        while previous > 0.0 {
            roster.update(1.0 / 60.0, &mut trails);
            let current = distance(&roster);
            assert!(current < previous, "frame {}: {} !< {}", frames, current, previous);

            let ghost = roster.get(2).unwrap();
            assert!(ghost.x <= 400.0 && ghost.y <= 250.0, "overshoot");

            previous = current;
            frames += 1;
            assert!(frames < 1000, "never snapped");
        }

        let ghost = roster.get(2).unwrap();
        assert_eq!(ghost.x, 400.0);
        assert_eq!(ghost.y, 250.0);
    }

    #[test]
    fn test_update_clamps_to_world() {
        let mut roster = GhostRoster::default();
        let mut trails = DashTrails::new();
        roster.register(&state(2, -50.0, 10_000.0), 0.0);
        roster.update(1.0 / 60.0, &mut trails);

        let ghost = roster.get(2).unwrap();
        assert!(ghost.x >= 0.0);
        assert!(ghost.y <= shared::WORLD_HEIGHT - PLAYER_HEIGHT);
    }

    #[test]
    fn test_dashing_ghost_spawns_trails() {
        let mut roster = GhostRoster::default();
        let mut trails = DashTrails::new();
        roster.register(&state(2, 0.0, 0.0), 0.0);
        roster.apply_updated(&echo(2, 0.0, 0.0, AnimState::Dash), 0.0);

        roster.update(0.01, &mut trails);
        assert_eq!(trails.len(), 1);
        assert!(roster.get(2).unwrap().dash_trail_active);

        roster.update(0.01, &mut trails);
        assert_eq!(trails.len(), 1);

        roster.update(REMOTE_TRAIL_INTERVAL, &mut trails);
        assert_eq!(trails.len(), 2);

        roster.apply_updated(&echo(2, 0.0, 0.0, AnimState::Idle), 0.5);
        roster.update(0.01, &mut trails);
        assert!(!roster.get(2).unwrap().dash_trail_active);
    }

    #[test]
    fn test_snapshot_clock_accumulates() {
        let mut clock = SnapshotClock::new(0.1);
        assert!(!clock.tick(0.04));
        assert!(!clock.tick(0.04));
        assert!(clock.tick(0.04));
        assert!(!clock.tick(0.04));

        clock.reset();
        assert!(!clock.tick(0.09));
    }
}
