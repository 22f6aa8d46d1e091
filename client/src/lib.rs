//! # Game Client Library
//!
//! Client side of the arena: a join lobby, a locally simulated player and
//! smoothed ghosts for everyone else, all fed by one persistent WebSocket.
//!
//! ## Architecture Overview
//!
//! ### Local Authority Over Movement
//! The local player is integrated entirely on the client. Position, facing
//! and animation go out as periodic snapshots; the server relays them without
//! simulating anything. Health, deaths and respawn positions are the one place
//! the server overrides the local copy.
//!
//! ### Remote Smoothing
//! Other players are drawn as ghosts that chase their last reported position
//! with frame-rate independent exponential smoothing and snap once close.
//!
//! ### Join Handshake
//! Joining is an acknowledged request with a client-side timeout. Late
//! replies to an abandoned attempt are ignored, and losing the socket always
//! drops the session back to the lobby.
//!
//! ## Module Organization
//!
//! - `config`: tuning values built from command-line flags
//! - `session`: lobby form, join state machine, notices
//! - `network`: background WebSocket transport
//! - `player`: local movement integrator and combat timers
//! - `reconcile`: remote ghost roster and snapshot cadence
//! - `projectiles`: shots, hit tests and damage reports
//! - `trails`: dash afterimages
//! - `game`: per-frame orchestration
//! - `input`: keyboard and pointer sampling
//! - `rendering`: camera and drawing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::game::ClientGame;
//! use client::network::WsTransport;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let config = ClientConfig::default();
//! let transport = WsTransport::new(
//!     runtime.handle().clone(),
//!     config.server_url.clone(),
//!     config.reconnect_delay,
//! );
//! let mut game = ClientGame::new(config, transport);
//!
//! // Typically driven by the macroquad frame loop
//! game.session.lobby.name = "Morgiana".to_string();
//! let _ = game.submit_join();
//! game.frame(1.0 / 60.0);
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod player;
pub mod projectiles;
pub mod reconcile;
pub mod rendering;
pub mod session;
pub mod trails;
