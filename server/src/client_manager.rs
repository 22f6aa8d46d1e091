//! Connection tracking and outbound fan-out
//!
//! This module keeps one entry per open WebSocket, independent of whether the
//! connection has joined the room:
//! - Connection lifecycle (accept, close, forced disconnect)
//! - Per-connection outbound queues drained by the socket writer tasks
//! - Unicast and broadcast delivery of server events
//!
//! Room membership lives in [`crate::room::Room`]; the client manager only
//! knows how to reach a connection.

use log::{debug, error, info};
use shared::{PlayerId, ServerEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Instructions for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Close the socket once everything queued before it has been written
    Close,
}

/// An open WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned on accept and reused as the session id after join
    pub id: PlayerId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// When the socket was accepted
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues an event for this connection
    ///
    /// Returns false if the writer task has already gone away, which means the
    /// socket is closed and a disconnect is on its way.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    pub fn close(&self) -> bool {
        self.sender.send(Outbound::Close).is_ok()
    }
}

/// Registry of open connections
///
/// Broadcasts go to an explicit recipient list so that room events only ever
/// reach joined sessions, never connections still sitting in the lobby.
#[derive(Debug, Default)]
pub struct ClientManager {
    connections: HashMap<PlayerId, Connection>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Connection) {
        info!("Connection {} opened from {}", connection.id, connection.addr);
        self.connections.insert(connection.id, connection);
    }

    /// Forgets a connection. Returns the entry if it was still tracked.
    pub fn remove(&mut self, id: PlayerId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        info!(
            "Connection {} from {} closed after {:?}",
            id,
            connection.addr,
            connection.connected_at.elapsed()
        );
        Some(connection)
    }

    pub fn send(&self, id: PlayerId, event: ServerEvent) {
        match self.connections.get(&id) {
            Some(connection) => {
                let name = event.name();
                if !connection.send(event) {
                    error!("Failed to queue {} for connection {}", name, id);
                }
            }
            None => debug!("Dropping {} for unknown connection {}", event.name(), id),
        }
    }

    /// Asks the writer task to close the socket after flushing queued events
    pub fn close(&self, id: PlayerId) {
        if let Some(connection) = self.connections.get(&id) {
            if !connection.close() {
                error!("Failed to queue close for connection {}", id);
            }
        }
    }

    /// Sends `event` to every recipient except `exclude`
    pub fn broadcast(&self, recipients: &[PlayerId], event: &ServerEvent, exclude: Option<PlayerId>) {
        for id in recipients {
            if Some(*id) == exclude {
                continue;
            }
            self.send(*id, event.clone());
        }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
