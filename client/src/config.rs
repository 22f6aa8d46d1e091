//! Client tuning, built once from command-line flags

use shared::{
    Character, JOIN_TIMEOUT_MS, NETWORK_SEND_INTERVAL, REMOTE_SMOOTHING_RATE, SNAP_EPSILON,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the relay server
    pub server_url: String,
    /// Name pre-filled in the join form
    pub name: String,
    pub character: Character,
    pub window_width: u32,
    pub window_height: u32,
    /// Seconds between routine movement snapshots
    pub send_interval: f32,
    /// Exponential smoothing rate for remote ghosts, per second
    pub smoothing_rate: f32,
    /// Ghosts closer than this to their target snap onto it
    pub snap_epsilon: f32,
    pub join_timeout: Duration,
    /// Delay between transport reconnect attempts
    pub reconnect_delay: Duration,
    /// Seconds before a transient notice hides itself
    pub notice_duration: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000".to_string(),
            name: "Ali Baba".to_string(),
            character: Character::default(),
            window_width: 1280,
            window_height: 720,
            send_interval: NETWORK_SEND_INTERVAL,
            smoothing_rate: REMOTE_SMOOTHING_RATE,
            snap_epsilon: SNAP_EPSILON,
            join_timeout: Duration::from_millis(JOIN_TIMEOUT_MS),
            reconnect_delay: Duration::from_secs(1),
            notice_duration: 3.2,
        }
    }
}
