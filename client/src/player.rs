//! Locally simulated player
//!
//! Movement is client-authoritative: the integrator runs every frame whether or
//! not we are connected, and the server only ever corrects combat facts
//! (health, tallies, alive) through [`LocalPlayer::apply_authoritative`].

use crate::trails::{DashTrails, LOCAL_TRAIL_OPACITY};
use shared::{
    clamp_to_world, AnimState, Character, Facing, JoinAccepted, PublicState, Rect, RespawnPayload,
    UpdatePayload, DASH_TRAIL_INTERVAL, DEFAULT_HEALTH, GROUND_Y, HIT_FLASH_DURATION, PLATFORMS,
    PLAYER_HEIGHT, PLAYER_WIDTH,
};

pub const ACCELERATION: f32 = 2000.0;
pub const MAX_SPEED: f32 = 280.0;
pub const MAX_JUMPS: u32 = 3;
pub const JUMP_STRENGTH: f32 = 600.0;
pub const GRAVITY: f32 = 1800.0;
pub const MAX_FALL_SPEED: f32 = 900.0;
pub const COYOTE_TIME: f32 = 0.12;
pub const DASH_SPEED: f32 = 680.0;
pub const DASH_DURATION: f32 = 0.26;
pub const DASH_COOLDOWN: f32 = 0.6;
/// Invulnerability granted on knock-down and respawn
pub const DOWN_INVULNERABILITY: f32 = 1.2;
/// Invulnerability granted after reporting a hit on ourselves
pub const HIT_INVULNERABILITY: f32 = 0.25;
const ANIM_SPEED_THRESHOLD: f32 = 40.0;
const DEFAULT_COLOR: &str = "#ffcc66";

/// Continuous controls for one frame, sampled by the input layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerControls {
    pub left: bool,
    pub right: bool,
    /// Set on the jump key's press edge, consumed by the integrator
    pub jump_queued: bool,
    pub fire: bool,
    /// Double-tap dash request, consumed by the integrator
    pub dash: Option<Facing>,
    /// Pointer position in world coordinates
    pub aim: Option<(f32, f32)>,
}

impl PlayerControls {
    /// Drops every held and queued input
    pub fn clear(&mut self) {
        let aim = self.aim;
        *self = Self::default();
        self.aim = aim;
    }
}

#[derive(Debug, Clone)]
pub struct LocalPlayer {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
    pub jumps_remaining: u32,
    pub coyote_timer: f32,
    pub facing: Facing,
    pub health: f32,
    pub max_health: f32,
    pub invuln: f32,
    pub fire_cooldown: f32,
    pub color: String,
    pub display_name: String,
    pub character: Character,
    pub kills: u32,
    pub deaths: u32,
    pub alive: bool,
    pub anim: AnimState,
    pub dash_timer: f32,
    pub dash_cooldown_timer: f32,
    pub dash_direction: Option<Facing>,
    pub dash_trail_timer: f32,
    pub hit_flash: f32,
    pub attack_timer: f32,
    pub attack_anim_time: f32,
}

impl LocalPlayer {
    pub fn new(display_name: &str, character: Character) -> Self {
        Self {
            x: 140.0,
            y: GROUND_Y - PLAYER_HEIGHT,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            vx: 0.0,
            vy: 0.0,
            on_ground: false,
            jumps_remaining: MAX_JUMPS,
            coyote_timer: 0.0,
            facing: Facing::Right,
            health: DEFAULT_HEALTH,
            max_health: DEFAULT_HEALTH,
            invuln: 0.0,
            fire_cooldown: 0.0,
            color: DEFAULT_COLOR.to_string(),
            display_name: display_name.to_string(),
            character,
            kills: 0,
            deaths: 0,
            alive: true,
            anim: AnimState::Idle,
            dash_timer: 0.0,
            dash_cooldown_timer: 0.0,
            dash_direction: None,
            dash_trail_timer: 0.0,
            hit_flash: 0.0,
            attack_timer: 0.0,
            attack_anim_time: 0.0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> (f32, f32) {
        self.rect().center()
    }

    /// Advances the simulation by one frame. Returns false while dead.
    pub fn update(&mut self, dt: f32, controls: &mut PlayerControls, trails: &mut DashTrails) -> bool {
        self.invuln = (self.invuln - dt).max(0.0);
        self.hit_flash = (self.hit_flash - dt).max(0.0);
        if self.attack_timer > 0.0 {
            self.attack_timer = (self.attack_timer - dt).max(0.0);
            self.attack_anim_time += dt;
        }

        if !self.alive {
            self.update_death_physics(dt);
            self.anim = self.determine_anim();
            return false;
        }

        if let Some(direction) = controls.dash.take() {
            self.attempt_dash(direction, trails);
        }

        self.dash_cooldown_timer = (self.dash_cooldown_timer - dt).max(0.0);

        let dash_active = self.dash_timer > 0.0;
        if dash_active {
            let direction = self.dash_direction.map_or(0.0, Facing::sign);
            self.vx = direction * DASH_SPEED;
            self.dash_timer = (self.dash_timer - dt).max(0.0);
            if self.dash_timer == 0.0 {
                self.dash_direction = None;
            }
        } else {
            self.steer(dt, controls);
        }

        self.update_dash_trail(dt, dash_active, trails);

        if controls.jump_queued {
            self.attempt_jump();
            controls.jump_queued = false;
        }

        self.vy = (self.vy + GRAVITY * dt).min(MAX_FALL_SPEED);
        self.move_and_collide(dt);

        if self.on_ground {
            self.jumps_remaining = MAX_JUMPS;
            self.coyote_timer = COYOTE_TIME;
        } else {
            self.coyote_timer = (self.coyote_timer - dt).max(0.0);
        }

        self.clamp_to_world();
        self.anim = self.determine_anim();
        true
    }

    fn steer(&mut self, dt: f32, controls: &PlayerControls) {
        let direction = controls.right as i32 - controls.left as i32;
        let target_speed = direction as f32 * MAX_SPEED;
        let accel = ACCELERATION * dt;

        if target_speed > self.vx {
            self.vx = (self.vx + accel).min(target_speed);
        } else if target_speed < self.vx {
            self.vx = (self.vx - accel).max(target_speed);
        }

        if direction != 0 {
            self.facing = Facing::from_sign(direction as f32);
        }
    }

    pub fn determine_anim(&self) -> AnimState {
        if !self.alive {
            return AnimState::Down;
        }
        if self.dash_timer > 0.0 {
            return AnimState::Dash;
        }
        if self.attack_timer > 0.0 && self.character == Character::Sinbad {
            return AnimState::Attack;
        }
        if !self.on_ground {
            return if self.vy < -ANIM_SPEED_THRESHOLD {
                AnimState::Jump
            } else {
                AnimState::Fall
            };
        }
        if self.vx.abs() > ANIM_SPEED_THRESHOLD {
            return AnimState::Run;
        }
        AnimState::Idle
    }

    /// Starts a dash unless dead, dashing or cooling down
    pub fn attempt_dash(&mut self, direction: Facing, trails: &mut DashTrails) -> bool {
        if !self.alive || self.dash_cooldown_timer > 0.0 || self.dash_timer > 0.0 {
            return false;
        }
        self.dash_timer = DASH_DURATION;
        self.dash_direction = Some(direction);
        self.dash_cooldown_timer = DASH_COOLDOWN;
        self.vx = direction.sign() * DASH_SPEED;
        self.facing = direction;
        self.dash_trail_timer = 0.0;
        self.spawn_trail(trails);
        true
    }

    fn update_dash_trail(&mut self, dt: f32, dash_active: bool, trails: &mut DashTrails) {
        if !dash_active || !self.alive {
            self.dash_trail_timer = 0.0;
            return;
        }
        self.dash_trail_timer -= dt;
        if self.dash_trail_timer <= 0.0 {
            self.spawn_trail(trails);
            self.dash_trail_timer = DASH_TRAIL_INTERVAL;
        }
    }

    fn spawn_trail(&self, trails: &mut DashTrails) {
        trails.spawn(
            self.x,
            self.y,
            self.width,
            self.height,
            self.facing,
            &self.color,
            LOCAL_TRAIL_OPACITY,
        );
    }

    fn attempt_jump(&mut self) {
        let can_jump_from_ground = self.coyote_timer > 0.0 || self.on_ground;
        let has_extra_jump = self.jumps_remaining > 0 && !self.on_ground;
        if can_jump_from_ground || has_extra_jump {
            self.vy = -JUMP_STRENGTH;
            self.on_ground = false;
            self.jumps_remaining = self.jumps_remaining.saturating_sub(1);
            self.coyote_timer = 0.0;
        }
    }

    fn update_death_physics(&mut self, dt: f32) {
        self.vx = 0.0;
        self.vy = (self.vy + GRAVITY * dt).min(MAX_FALL_SPEED);
        self.move_and_collide(dt);
        self.clamp_to_world();
    }

    /// Moves one axis at a time, pushing out of any platform overlapped
    fn move_and_collide(&mut self, dt: f32) {
        self.x += self.vx * dt;
        for platform in PLATFORMS.iter() {
            if !self.rect().intersects(platform) {
                continue;
            }
            if self.vx > 0.0 {
                self.x = platform.x - self.width;
            } else if self.vx < 0.0 {
                self.x = platform.x + platform.width;
            }
            self.vx = 0.0;
        }

        self.on_ground = false;
        self.y += self.vy * dt;
        for platform in PLATFORMS.iter() {
            if !self.rect().intersects(platform) {
                continue;
            }
            if self.vy > 0.0 {
                self.y = platform.y - self.height;
                self.vy = 0.0;
                self.on_ground = true;
            } else if self.vy < 0.0 {
                self.y = platform.y + platform.height;
                self.vy = 0.0;
            }
        }
    }

    fn clamp_to_world(&mut self) {
        let (x, y) = clamp_to_world(self.x, self.y);
        self.x = x;
        self.y = y;
    }

    pub fn reset_dash(&mut self) {
        self.dash_timer = 0.0;
        self.dash_direction = None;
        self.dash_cooldown_timer = 0.0;
        self.dash_trail_timer = 0.0;
    }

    /// Movement snapshot for `player:update`
    pub fn snapshot(&self) -> UpdatePayload {
        UpdatePayload {
            x: Some(self.x),
            y: Some(self.y),
            facing: Some(self.facing.into()),
            anim: Some(self.anim.as_str().to_string()),
        }
    }

    /// Hydrates the player from a successful join
    pub fn apply_join(&mut self, accepted: &JoinAccepted) {
        self.display_name = accepted.name.clone();
        self.color = accepted.color.clone();
        self.character = accepted.character;
        self.x = accepted.x;
        self.y = accepted.y;
        self.health = accepted.health;
        self.max_health = accepted.max_health;
        self.kills = accepted.kills;
        self.deaths = accepted.deaths;
        self.alive = true;
        self.vx = 0.0;
        self.vy = 0.0;
        self.invuln = 0.0;
        self.fire_cooldown = 0.0;
        self.hit_flash = 0.0;
        self.attack_timer = 0.0;
        self.reset_dash();
        self.anim = AnimState::Idle;
    }

    /// Applies a server-arbitrated state about ourselves
    ///
    /// No smoothing: these are combat outcomes, not routine movement. Returns
    /// true when the update knocked the player down.
    pub fn apply_authoritative(&mut self, state: &PublicState) -> bool {
        let was_alive = self.alive;
        let previous_health = self.health;

        self.x = state.x;
        self.y = state.y;
        self.facing = state.facing;
        self.anim = state.anim;
        if let Some(character) = state.character {
            self.character = character;
        }
        self.health = state.health;
        self.max_health = state.max_health;
        self.kills = state.kills;
        self.deaths = state.deaths;
        self.alive = state.alive;

        if self.health < previous_health {
            self.hit_flash = HIT_FLASH_DURATION;
        }

        if was_alive && !self.alive {
            self.vx = 0.0;
            self.vy = -JUMP_STRENGTH * 0.32;
            self.invuln = DOWN_INVULNERABILITY;
            self.reset_dash();
            return true;
        }
        false
    }

    /// Restores the player from the private respawn payload
    pub fn apply_respawn(&mut self, payload: &RespawnPayload) {
        if payload.x.is_finite() {
            self.x = payload.x;
        }
        if payload.y.is_finite() {
            self.y = payload.y;
        }
        self.health = payload.health;
        self.max_health = payload.max_health;
        self.kills = payload.kills;
        self.deaths = payload.deaths;
        self.alive = true;
        self.invuln = DOWN_INVULNERABILITY;
        self.vx = 0.0;
        self.vy = 0.0;
        self.jumps_remaining = MAX_JUMPS;
        self.coyote_timer = 0.0;
        self.reset_dash();
        self.anim = AnimState::Idle;
        self.hit_flash = 0.0;
    }

    /// Grants hit invulnerability after reporting a hit on ourselves
    pub fn register_hit(&mut self) {
        self.invuln = self.invuln.max(HIT_INVULNERABILITY);
        self.hit_flash = HIT_FLASH_DURATION;
    }

    /// Clears every transient combat and movement timer
    pub fn reset_for_lobby(&mut self) {
        self.alive = true;
        self.health = self.max_health;
        self.kills = 0;
        self.deaths = 0;
        self.invuln = 0.0;
        self.fire_cooldown = 0.0;
        self.hit_flash = 0.0;
        self.attack_timer = 0.0;
        self.attack_anim_time = 0.0;
        self.reset_dash();
        self.anim = AnimState::Idle;
    }
}
