use serde::{Deserialize, Serialize};

pub mod level;
pub mod protocol;

pub use level::{Rect, PALETTE, PLATFORMS, SPAWN_POINTS};
pub use protocol::*;

pub const WORLD_WIDTH: f32 = 7200.0;
pub const WORLD_HEIGHT: f32 = 720.0;
pub const GROUND_Y: f32 = 560.0;
pub const PLAYER_WIDTH: f32 = 56.0;
pub const PLAYER_HEIGHT: f32 = 72.0;

pub const MAX_PLAYERS: usize = 4;
pub const DEFAULT_HEALTH: f32 = 20.0;
pub const MAX_HIT: f32 = 5.0;
pub const RESPAWN_DELAY_MS: u64 = 3200;
pub const IDLE_TIMEOUT_MS: u64 = 30_000;
pub const IDLE_CHECK_INTERVAL_MS: u64 = 5000;
pub const MAX_NAME_CHARS: usize = 20;
pub const DEFAULT_NAME: &str = "Adventurer";
pub const MAIN_ROOM: &str = "main";

/// Minimum positional change (world units) before a movement update is re-broadcast.
pub const MOVE_EPSILON: f32 = 0.05;
/// Remote ghosts closer than this to their target snap onto it.
pub const SNAP_EPSILON: f32 = 0.1;
pub const REMOTE_SMOOTHING_RATE: f32 = 12.0;
pub const NETWORK_SEND_INTERVAL: f32 = 1.0 / 15.0;
pub const JOIN_TIMEOUT_MS: u64 = 12_000;

pub const HIT_FLASH_DURATION: f32 = 0.28;
pub const DASH_TRAIL_INTERVAL: f32 = 0.045;
pub const DASH_TRAIL_LIFETIME: f32 = 0.22;
pub const FIREBALL_LIFETIME: f32 = 0.42;
pub const SINBAD_ATTACK_DURATION: f32 = 0.4;

/// Animation tag shared by the local simulation, the wire and ghost rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimState {
    #[default]
    Idle,
    Run,
    Jump,
    Fall,
    Dash,
    Down,
    Attack,
}

impl AnimState {
    /// Parses a wire tag, returning `None` for anything outside the closed set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "idle" => Some(Self::Idle),
            "run" => Some(Self::Run),
            "jump" => Some(Self::Jump),
            "fall" => Some(Self::Fall),
            "dash" => Some(Self::Dash),
            "down" => Some(Self::Down),
            "attack" => Some(Self::Attack),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Run => "run",
            Self::Jump => "jump",
            Self::Fall => "fall",
            Self::Dash => "dash",
            Self::Down => "down",
            Self::Attack => "attack",
        }
    }
}

/// Horizontal facing, encoded on the wire as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn from_wire(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::Right),
            -1 => Some(Self::Left),
            _ => None,
        }
    }

    pub fn from_sign(value: f32) -> Self {
        if value >= 0.0 {
            Self::Right
        } else {
            Self::Left
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Self::Right => 1.0,
            Self::Left => -1.0,
        }
    }
}

impl TryFrom<i8> for Facing {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::from_wire(value).ok_or_else(|| format!("invalid facing {}", value))
    }
}

impl From<Facing> for i8 {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Right => 1,
            Facing::Left => -1,
        }
    }
}

/// Character skin. Unknown ids normalise to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Character {
    #[default]
    #[serde(rename = "aliBaba")]
    AliBaba,
    #[serde(rename = "sinbad")]
    Sinbad,
}

impl Character {
    pub const ALL: [Character; 2] = [Character::AliBaba, Character::Sinbad];

    pub fn normalize(value: Option<&str>) -> Self {
        match value {
            Some("sinbad") => Self::Sinbad,
            _ => Self::AliBaba,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AliBaba => "aliBaba",
            Self::Sinbad => "sinbad",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::AliBaba => Self::Sinbad,
            Self::Sinbad => Self::AliBaba,
        }
    }
}

/// Projectile preset tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectileKind {
    #[default]
    #[serde(rename = "fireball")]
    Fireball,
    #[serde(rename = "sinbadWave")]
    SinbadWave,
}

impl ProjectileKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("sinbadWave") => Self::SinbadWave,
            _ => Self::Fireball,
        }
    }
}

/// Clamps a player's top-left corner into the world rectangle.
pub fn clamp_to_world(x: f32, y: f32) -> (f32, f32) {
    (
        x.clamp(0.0, WORLD_WIDTH - PLAYER_WIDTH),
        y.clamp(0.0, WORLD_HEIGHT - PLAYER_HEIGHT),
    )
}
