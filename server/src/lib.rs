//! # Room Relay Server Library
//!
//! This library provides the relay server for the side-scrolling brawler. The
//! server trusts clients for movement and hit detection but owns every
//! combat outcome: health, kills, deaths, defeat and respawn.
//!
//! ## Core Responsibilities
//!
//! ### Room Registry
//! A single room ("main") with a fixed capacity. Joining claims a
//! case-insensitive display name, a palette colour and the next spawn point
//! from a round-robin rotation. Leaving hands the name and colour back.
//!
//! ### Combat Arbitration
//! Hit reports pass an explicit trust boundary, are capped per hit and are
//! applied to the target. A defeat credits the attacker, notifies the room and
//! schedules a cancelable respawn.
//!
//! ### Liveness
//! An idle reaper sweeps the room on a fixed interval and kicks sessions that
//! stopped sending meaningful updates.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! Socket reader tasks, respawn timers and the idle ticker all send messages
//! to one loop that owns the room. Room state is never shared, so the
//! multi-step invariants (release-then-reassign of names, cancel-then-remove
//! of timers) hold without locks.
//!
//! ### WebSocket Transport
//! One JSON text frame per event, `{"event": ..., "data": ...}`. Malformed
//! frames are dropped at the edge; the join handshake always gets an ack.
//!
//! ## Module Organization
//!
//! - `config`: tuning knobs with defaults from the shared constants
//! - `room`: sessions, name registry, colour pool, spawn rotation
//! - `trust`: trusted movement, trusted hit reports, hit validators
//! - `combat`: damage arbitration and respawn
//! - `reaper`: idle sweep
//! - `client_manager`: open connections and outbound fan-out
//! - `network`: the event loop and per-socket tasks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     Server::bind(config).await?.run().await
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod network;
pub mod reaper;
pub mod room;
pub mod trust;
