//! Server tuning. Every constant the room logic depends on flows through here
//! so that tests and deployments can shorten timers or widen the room.

use shared::{
    DEFAULT_HEALTH, IDLE_CHECK_INTERVAL_MS, IDLE_TIMEOUT_MS, MAX_HIT, MAX_PLAYERS, MOVE_EPSILON,
    PALETTE, RESPAWN_DELAY_MS, SPAWN_POINTS,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to
    pub bind_addr: String,
    /// Maximum concurrent sessions in the room
    pub capacity: usize,
    /// Health (and max health) of a freshly joined or respawned session
    pub default_health: f32,
    /// Upper bound applied to any single reported hit
    pub max_hit: f32,
    pub respawn_delay: Duration,
    pub idle_timeout: Duration,
    pub idle_check_interval: Duration,
    /// Positional change below which a movement update is not re-broadcast
    pub move_epsilon: f32,
    pub spawn_points: Vec<(f32, f32)>,
    pub palette: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            capacity: MAX_PLAYERS,
            default_health: DEFAULT_HEALTH,
            max_hit: MAX_HIT,
            respawn_delay: Duration::from_millis(RESPAWN_DELAY_MS),
            idle_timeout: Duration::from_millis(IDLE_TIMEOUT_MS),
            idle_check_interval: Duration::from_millis(IDLE_CHECK_INTERVAL_MS),
            move_epsilon: MOVE_EPSILON,
            spawn_points: SPAWN_POINTS.to_vec(),
            palette: PALETTE.iter().map(|color| color.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_room_rules() {
        let config = ServerConfig::default();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.default_health, 20.0);
        assert_eq!(config.max_hit, 5.0);
        assert_eq!(config.respawn_delay, Duration::from_millis(3200));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_check_interval, Duration::from_secs(5));
        assert_eq!(config.spawn_points.len(), 8);
        assert_eq!(config.palette.len(), 8);
    }
}
