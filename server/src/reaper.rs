//! Idle reaper: finds sessions that stopped showing signs of life
//!
//! The reaper only reads liveness timestamps. Removal and the kick notice are
//! left to the network layer so that a sweep shares the same leave path as a
//! disconnect.

use crate::room::Room;
use shared::PlayerId;
use std::time::Duration;
use tokio::time::Instant;

/// Kick reason sent to sessions removed for idleness
pub const INACTIVITY_REASON: &str = "Kicked for inactivity.";

#[derive(Debug, Clone, Copy)]
pub struct IdleReaper {
    timeout: Duration,
}

impl IdleReaper {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the ids of every session idle for strictly longer than the timeout
    pub fn sweep(&self, room: &Room, now: Instant) -> Vec<PlayerId> {
        let mut idle: Vec<PlayerId> = room
            .sessions()
            .filter(|session| now.saturating_duration_since(session.last_active) > self.timeout)
            .map(|session| session.id)
            .collect();
        idle.sort_unstable();
        idle
    }
}
