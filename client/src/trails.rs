//! Fading afterimages left behind by dashing players

use shared::{Facing, DASH_TRAIL_LIFETIME};
use std::collections::VecDeque;

/// Oldest trails are dropped once this many are alive
pub const MAX_TRAILS: usize = 60;
pub const LOCAL_TRAIL_OPACITY: f32 = 0.65;
pub const REMOTE_TRAIL_OPACITY: f32 = 0.55;

#[derive(Debug, Clone, PartialEq)]
pub struct DashTrail {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub facing: Facing,
    pub color: String,
    pub life: f32,
    pub max_life: f32,
    pub opacity: f32,
}

impl DashTrail {
    /// Remaining visibility in `0..=opacity`
    pub fn alpha(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0) * self.opacity
    }
}

#[derive(Debug, Default)]
pub struct DashTrails {
    trails: VecDeque<DashTrail>,
}

impl DashTrails {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        facing: Facing,
        color: &str,
        opacity: f32,
    ) {
        self.trails.push_back(DashTrail {
            x,
            y,
            width,
            height,
            facing,
            color: color.to_string(),
            life: DASH_TRAIL_LIFETIME,
            max_life: DASH_TRAIL_LIFETIME,
            opacity,
        });
        while self.trails.len() > MAX_TRAILS {
            self.trails.pop_front();
        }
    }

    pub fn update(&mut self, dt: f32) {
        for trail in self.trails.iter_mut() {
            trail.life -= dt;
        }
        self.trails.retain(|trail| trail.life > 0.0);
    }

    pub fn clear(&mut self) {
        self.trails.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DashTrail> {
        self.trails.iter()
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}
