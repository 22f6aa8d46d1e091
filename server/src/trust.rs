//! Trust boundary between client reports and room state
//!
//! The server accepts two kinds of client-authoritative facts:
//! - Movement (position, facing, animation), taken verbatim once it is finite
//!   and clamped into the world rectangle
//! - Hit reports, taken from the reporting client's own hit detection with an
//!   attribution rule and a per-hit cap applied by the arbiter
//!
//! Nothing here hit-tests projectiles. A deployment that wants authoritative
//! re-validation plugs a [`HitValidator`] into the server instead of changing
//! the wire contract.

use crate::room::{PlayerSession, Room};
use log::debug;
use shared::{
    clamp_to_world, AnimState, DamagePayload, Facing, MovementEcho, PlayerId, ProjectileKind,
    ShootPayload, ShotRelay, UpdatePayload, FIREBALL_LIFETIME,
};
use tokio::time::Instant;

const DEFAULT_SHOT_SIZE: f32 = 24.0;
const DEFAULT_SHOT_DAMAGE: f32 = 1.0;
const DEFAULT_HIT_AMOUNT: f32 = 1.0;

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

/// A movement snapshot reduced to the fields the server is willing to trust
///
/// Absent, non-finite or unrecognised fields become `None` and leave the
/// session's previous value in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrustedMovement {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub facing: Option<Facing>,
    pub anim: Option<AnimState>,
}

impl TrustedMovement {
    pub fn from_payload(payload: &UpdatePayload) -> Self {
        Self {
            x: finite(payload.x),
            y: finite(payload.y),
            facing: payload.facing.and_then(Facing::from_wire),
            anim: payload.anim.as_deref().and_then(AnimState::from_tag),
        }
    }

    /// Applies the snapshot to a session
    ///
    /// Position is only taken while the session is alive. Returns the echo to
    /// relay when the session moved beyond `epsilon` or changed facing or
    /// animation; liveness is refreshed only in that case.
    pub fn apply(
        &self,
        session: &mut PlayerSession,
        epsilon: f32,
        now: Instant,
    ) -> Option<MovementEcho> {
        let (next_x, next_y) = clamp_to_world(
            self.x.unwrap_or(session.x),
            self.y.unwrap_or(session.y),
        );
        let next_facing = self.facing.unwrap_or(session.facing);
        let next_anim = self.anim.unwrap_or(session.anim);

        let moved = session.alive
            && ((next_x - session.x).abs() > epsilon || (next_y - session.y).abs() > epsilon);
        let facing_changed = next_facing != session.facing;
        let anim_changed = next_anim != session.anim;

        if session.alive {
            session.x = next_x;
            session.y = next_y;
        }
        session.facing = next_facing;
        session.anim = next_anim;

        if !(moved || facing_changed || anim_changed) {
            return None;
        }

        session.touch(now);
        Some(MovementEcho {
            id: session.id,
            x: session.x,
            y: session.y,
            facing: session.facing,
            anim: session.anim,
        })
    }
}

/// Validates a shot for relay, filling documented defaults
///
/// Position and velocity must all be present and finite. The damage field is
/// relayed for display only; damage is never applied from a shot.
pub fn validate_shot(owner_id: PlayerId, payload: &ShootPayload) -> Option<ShotRelay> {
    let (Some(x), Some(y), Some(vx), Some(vy)) = (
        finite(payload.x),
        finite(payload.y),
        finite(payload.vx),
        finite(payload.vy),
    ) else {
        debug!("Dropping malformed shot from {}", owner_id);
        return None;
    };

    Some(ShotRelay {
        owner_id,
        x,
        y,
        vx,
        vy,
        width: finite(payload.width).unwrap_or(DEFAULT_SHOT_SIZE),
        height: finite(payload.height).unwrap_or(DEFAULT_SHOT_SIZE),
        damage: finite(payload.damage).unwrap_or(DEFAULT_SHOT_DAMAGE),
        lifetime: finite(payload.lifetime).unwrap_or(FIREBALL_LIFETIME),
        kind: ProjectileKind::from_tag(payload.kind.as_deref()),
    })
}

/// A client hit claim after attribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustedHitReport {
    /// Session credited with the hit, if any
    pub attacker_id: Option<PlayerId>,
    pub target_id: PlayerId,
    /// Unclamped amount; the arbiter applies the per-hit cap
    pub amount: f32,
}

impl TrustedHitReport {
    /// Builds a report from `reporter`'s payload
    ///
    /// The reporter is the attacker by default. A different attacker may only
    /// be named when the reporter is reporting damage against itself, so no
    /// client can credit or blame a third party for hits on someone else.
    pub fn from_payload(reporter: PlayerId, payload: &DamagePayload, room: &Room) -> Option<Self> {
        if !room.contains(reporter) {
            debug!("Dropping damage report from unjoined connection {}", reporter);
            return None;
        }
        let target_id = payload.target_id.filter(|id| room.contains(*id))?;

        let attacker_id = match payload.attacker_id {
            Some(named) if target_id == reporter && room.contains(named) => named,
            _ => reporter,
        };

        Some(Self {
            attacker_id: Some(attacker_id),
            target_id,
            amount: payload.amount.unwrap_or(DEFAULT_HIT_AMOUNT),
        })
    }
}

/// Optional re-validation layer applied to every hit report before the arbiter sees it
pub trait HitValidator: Send {
    fn accept(&self, report: &TrustedHitReport, room: &Room) -> bool;
}

/// Accepts every well-formed report, keeping hit detection client-authoritative
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustReporter;

impl HitValidator for TrustReporter {
    fn accept(&self, _report: &TrustedHitReport, _room: &Room) -> bool {
        true
    }
}
