//! Projectiles and client-side hit detection
//!
//! Whoever owns a projectile decides whether it hit: our own shots report
//! damage against ghosts, and foreign shots report damage against ourselves
//! (attributed to the shooter). The server only arbitrates the outcome.

use crate::player::LocalPlayer;
use crate::reconcile::{GhostRoster, RemoteGhost};
use shared::{
    Character, DamagePayload, Facing, PlayerId, ProjectileKind, Rect, ShootPayload, ShotRelay,
    FIREBALL_LIFETIME, HIT_FLASH_DURATION, PLATFORMS, SINBAD_ATTACK_DURATION, WORLD_HEIGHT,
    WORLD_WIDTH,
};

/// Below this pointer distance the shot goes straight ahead instead
const MIN_AIM_DISTANCE: f32 = 12.0;
const FALLBACK_AIM_DISTANCE: f32 = 160.0;

/// Launch parameters for one projectile kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    pub lifetime: f32,
    pub cooldown: f32,
    /// Spawn distance from the shooter's centre, in player widths
    pub origin_factor: f32,
}

impl Preset {
    pub fn for_kind(kind: ProjectileKind) -> Self {
        match kind {
            ProjectileKind::Fireball => Self {
                speed: 640.0,
                width: 26.0,
                height: 26.0,
                lifetime: FIREBALL_LIFETIME,
                cooldown: 0.45,
                origin_factor: 0.6,
            },
            ProjectileKind::SinbadWave => Self {
                speed: 520.0,
                width: 96.0,
                height: 64.0,
                lifetime: 0.5,
                cooldown: 0.56,
                origin_factor: 2.2,
            },
        }
    }
}

pub fn kind_for(character: Character) -> ProjectileKind {
    match character {
        Character::AliBaba => ProjectileKind::Fireball,
        Character::Sinbad => ProjectileKind::SinbadWave,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u64,
    pub owner_id: Option<PlayerId>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
    pub lifetime: f32,
    pub kind: ProjectileKind,
    pub rotation: f32,
    pub friendly: bool,
}

impl Projectile {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn out_of_bounds(&self) -> bool {
        self.x < -160.0
            || self.x > WORLD_WIDTH + 160.0
            || self.y < -120.0
            || self.y > WORLD_HEIGHT + 160.0
    }

    pub fn shoot_payload(&self) -> ShootPayload {
        ShootPayload {
            x: Some(self.x),
            y: Some(self.y),
            vx: Some(self.vx),
            vy: Some(self.vy),
            width: Some(self.width),
            height: Some(self.height),
            damage: Some(self.damage),
            lifetime: Some(self.lifetime),
            kind: Some(
                match self.kind {
                    ProjectileKind::Fireball => "fireball",
                    ProjectileKind::SinbadWave => "sinbadWave",
                }
                .to_string(),
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct Projectiles {
    items: Vec<Projectile>,
    next_id: u64,
}

impl Projectiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launches a projectile from the local player towards `aim`
    ///
    /// Sets the fire cooldown and, for Sinbad, the attack animation timer.
    pub fn fire(
        &mut self,
        owner_id: PlayerId,
        player: &mut LocalPlayer,
        aim: Option<(f32, f32)>,
    ) -> Projectile {
        let (center_x, center_y) = player.center();
        let (mut target_x, mut target_y) = aim.unwrap_or((center_x, center_y));

        if (target_x - center_x).hypot(target_y - center_y) < MIN_AIM_DISTANCE {
            target_x = center_x + player.facing.sign() * FALLBACK_AIM_DISTANCE;
            target_y = center_y;
        }
        player.facing = Facing::from_sign(target_x - center_x);

        let angle = (target_y - center_y).atan2(target_x - center_x);
        let kind = kind_for(player.character);
        let preset = Preset::for_kind(kind);
        let origin = player.width * preset.origin_factor;

        match kind {
            ProjectileKind::SinbadWave => {
                player.attack_timer = SINBAD_ATTACK_DURATION;
                player.attack_anim_time = 0.0;
            }
            ProjectileKind::Fireball => {
                player.attack_timer = 0.0;
                player.attack_anim_time = 0.0;
            }
        }
        player.fire_cooldown = preset.cooldown;

        let projectile = Projectile {
            id: self.allocate_id(),
            owner_id: Some(owner_id),
            x: center_x + angle.cos() * origin - preset.width / 2.0,
            y: center_y + angle.sin() * origin - preset.height / 2.0,
            width: preset.width,
            height: preset.height,
            vx: angle.cos() * preset.speed,
            vy: angle.sin() * preset.speed,
            damage: 1.0,
            lifetime: preset.lifetime,
            kind,
            rotation: angle,
            friendly: true,
        };
        self.items.push(projectile.clone());
        projectile
    }

    /// Adds a projectile relayed from another player
    pub fn add_remote(&mut self, shot: &ShotRelay) {
        let id = self.allocate_id();
        self.items.push(Projectile {
            id,
            owner_id: Some(shot.owner_id),
            x: shot.x,
            y: shot.y,
            width: shot.width,
            height: shot.height,
            vx: shot.vx,
            vy: shot.vy,
            damage: shot.damage,
            lifetime: shot.lifetime,
            kind: shot.kind,
            rotation: shot.vy.atan2(shot.vx),
            friendly: false,
        });
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Moves every projectile and resolves hits
    ///
    /// Returns the damage reports to send. Without a local id nothing can be
    /// attributed, so projectiles only fly and expire.
    pub fn update(
        &mut self,
        dt: f32,
        local_id: Option<PlayerId>,
        player: &mut LocalPlayer,
        ghosts: &mut GhostRoster,
    ) -> Vec<DamagePayload> {
        let mut reports = Vec::new();

        self.items.retain_mut(|projectile| {
            projectile.x += projectile.vx * dt;
            projectile.y += projectile.vy * dt;
            projectile.lifetime -= dt;

            if projectile.out_of_bounds() || projectile.lifetime <= 0.0 {
                return false;
            }
            let rect = projectile.rect();
            if PLATFORMS.iter().any(|platform| rect.intersects(platform)) {
                return false;
            }

            let Some(local_id) = local_id else {
                return true;
            };

            if projectile.owner_id == Some(local_id) {
                let hit = ghosts
                    .iter_mut()
                    .find(|ghost| ghost.alive && rect.intersects(&ghost_rect(ghost)));
                if let Some(ghost) = hit {
                    ghost.hit_flash = HIT_FLASH_DURATION;
                    reports.push(DamagePayload {
                        target_id: Some(ghost.id),
                        attacker_id: None,
                        amount: Some(projectile.damage),
                    });
                    return false;
                }
                return true;
            }

            if let Some(owner_id) = projectile.owner_id {
                if player.alive && player.invuln <= 0.0 && rect.intersects(&player.rect()) {
                    reports.push(DamagePayload {
                        target_id: Some(local_id),
                        attacker_id: Some(owner_id),
                        amount: Some(projectile.damage),
                    });
                    player.register_hit();
                    return false;
                }
            }
            true
        });

        reports
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn ghost_rect(ghost: &RemoteGhost) -> Rect {
    Rect::new(ghost.x, ghost.y, ghost.width, ghost.height)
}
