//! Server network layer: WebSocket connections feeding a single room loop
//!
//! Every socket gets a reader task and a writer task. Readers decode frames
//! into [`ClientEvent`]s and forward them to the main loop over one channel;
//! writers drain a per-connection [`Outbound`] queue. The main loop is the
//! only owner of the [`Room`], so joins, leaves, damage, respawns and idle
//! sweeps never interleave mid-mutation.

use crate::client_manager::{ClientManager, Connection, Outbound};
use crate::combat::{self, DamageOutcome, RespawnTimer};
use crate::config::ServerConfig;
use crate::reaper::{IdleReaper, INACTIVITY_REASON};
use crate::room::Room;
use crate::trust::{validate_shot, HitValidator, TrustReporter, TrustedHitReport, TrustedMovement};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    ClientEvent, DamagePayload, JoinAck, JoinError, JoinOutcome, JoinRejected, JoinRequest,
    KickNotice, LeftNotice, PlayerId, ServerEvent, ShootPayload, UpdatePayload,
};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Messages sent from connection and timer tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        id: PlayerId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outbound>,
    },
    Event {
        id: PlayerId,
        event: ClientEvent,
    },
    Disconnected {
        id: PlayerId,
    },
    RespawnDue {
        id: PlayerId,
        generation: u64,
    },
    Shutdown,
}

/// Main server owning the room and every open connection
pub struct Server {
    config: ServerConfig,
    listener: Option<TcpListener>,
    room: Room,
    clients: ClientManager,
    reaper: IdleReaper,
    validator: Box<dyn HitValidator>,
    next_timer_generation: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Creates a server without a listener; connections are fed in as messages
    pub fn new(config: ServerConfig) -> Self {
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Server {
            room: Room::new(&config),
            clients: ClientManager::new(),
            reaper: IdleReaper::new(config.idle_timeout),
            validator: Box::new(TrustReporter),
            next_timer_generation: 0,
            listener: None,
            config,
            server_tx,
            server_rx,
        }
    }

    /// Creates a server bound to `config.bind_addr`
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let mut server = Self::new(config);
        server.listener = Some(listener);
        Ok(server)
    }

    /// Replaces the hit validation layer
    pub fn with_validator(mut self, validator: impl HitValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    /// Handle for injecting messages, including [`ServerMessage::Shutdown`]
    pub fn sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Spawns task that accepts sockets and assigns connection ids
    fn spawn_acceptor(&mut self) -> Option<tokio::task::JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            let mut next_id: PlayerId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let id = next_id;
                        next_id = next_id.wrapping_add(1).max(1);
                        tokio::spawn(handle_connection(stream, addr, id, server_tx.clone()));
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
        }))
    }

    /// Main server loop: room events plus the periodic idle sweep
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let acceptor = self.spawn_acceptor();

        let mut idle_check = interval(self.config.idle_check_interval);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick since it fires immediately
        idle_check.tick().await;

        info!(
            "Server started: room {:?}, capacity {}, respawn after {:?}, idle timeout {:?}",
            self.room.name(),
            self.room.capacity(),
            self.config.respawn_delay,
            self.reaper.timeout()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                _ = idle_check.tick() => {
                    self.reap_idle(Instant::now());
                },
            }
        }

        info!("Server shutting down");
        if let Some(acceptor) = acceptor {
            acceptor.abort();
        }
        Ok(())
    }

    /// Waits for and handles exactly one message. Returns false on shutdown.
    pub async fn process_next(&mut self) -> bool {
        match self.server_rx.recv().await {
            Some(message) => self.handle_message(message),
            None => false,
        }
    }

    /// Handles every message already queued without waiting
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.server_rx.try_recv() {
            handled += 1;
            if !self.handle_message(message) {
                break;
            }
        }
        handled
    }

    /// Applies one message to the room. Returns false on shutdown.
    pub fn handle_message(&mut self, message: ServerMessage) -> bool {
        let now = Instant::now();

        match message {
            ServerMessage::Connected { id, addr, sender } => {
                self.clients.add(Connection::new(id, addr, sender));
            }
            ServerMessage::Event { id, event } => {
                self.handle_event(id, event, now);
            }
            ServerMessage::Disconnected { id } => {
                self.clients.remove(id);
                self.remove_player(id, None);
            }
            ServerMessage::RespawnDue { id, generation } => {
                self.complete_respawn(id, generation, now);
            }
            ServerMessage::Shutdown => return false,
        }

        true
    }

    fn handle_event(&mut self, id: PlayerId, event: ClientEvent, now: Instant) {
        match event {
            ClientEvent::Join(request) => self.handle_join(id, request, now),
            ClientEvent::Update(payload) => self.handle_update(id, payload, now),
            ClientEvent::Shoot(payload) => self.handle_shoot(id, payload, now),
            ClientEvent::Damage(payload) => self.handle_damage(id, payload, now),
        }
    }

    fn handle_join(&mut self, id: PlayerId, request: JoinRequest, now: Instant) {
        let ack = request.ack;

        match self.room.join(id, &request, now) {
            Ok(accepted) => {
                let public = self.room.public_state(id);
                self.clients.send(
                    id,
                    ServerEvent::JoinAck(JoinAck {
                        ack,
                        result: JoinOutcome::Accepted(accepted),
                    }),
                );

                if let Some(state) = public {
                    let recipients = self.room.ids();
                    self.clients
                        .broadcast(&recipients, &ServerEvent::Joined(state.clone()), Some(id));
                    self.clients
                        .broadcast(&recipients, &ServerEvent::State(state), None);
                }
            }
            Err(JoinError::RoomFull) => {
                let capacity = self.room.capacity();
                info!("Connection {} tried to join a full room", id);

                self.clients.send(
                    id,
                    ServerEvent::JoinAck(JoinAck {
                        ack,
                        result: JoinOutcome::Rejected(JoinRejected {
                            error: JoinError::RoomFull,
                            max_players: Some(capacity),
                        }),
                    }),
                );
                self.clients.send(
                    id,
                    ServerEvent::Kicked(KickNotice {
                        reason: format!("The room is full (max {} players).", capacity),
                    }),
                );
                self.disconnect(id);
            }
            Err(error) => {
                debug!("Join from {} rejected: {}", id, error);
                self.clients.send(
                    id,
                    ServerEvent::JoinAck(JoinAck {
                        ack,
                        result: JoinOutcome::Rejected(JoinRejected {
                            error,
                            max_players: None,
                        }),
                    }),
                );
            }
        }
    }

    fn handle_update(&mut self, id: PlayerId, payload: UpdatePayload, now: Instant) {
        let epsilon = self.config.move_epsilon;
        let Some(session) = self.room.get_mut(id) else {
            return;
        };

        match TrustedMovement::from_payload(&payload).apply(session, epsilon, now) {
            Some(echo) => {
                let recipients = self.room.ids();
                self.clients
                    .broadcast(&recipients, &ServerEvent::Updated(echo), Some(id));
            }
            None => debug!("Suppressed unchanged update from {}", id),
        }
    }

    fn handle_shoot(&mut self, id: PlayerId, payload: ShootPayload, now: Instant) {
        let Some(session) = self.room.get_mut(id) else {
            return;
        };
        if !session.alive {
            debug!("Dropping shot from defeated player {}", id);
            return;
        }
        let Some(relay) = validate_shot(id, &payload) else {
            return;
        };
        session.touch(now);

        let recipients = self.room.ids();
        self.clients
            .broadcast(&recipients, &ServerEvent::Shot(relay), Some(id));
    }

    fn handle_damage(&mut self, id: PlayerId, payload: DamagePayload, now: Instant) {
        let Some(report) = TrustedHitReport::from_payload(id, &payload, &self.room) else {
            return;
        };
        if !self.validator.accept(&report, &self.room) {
            debug!("Hit report from {} rejected by validator", id);
            return;
        }

        match combat::apply_damage(&mut self.room, &report, self.config.max_hit, now) {
            DamageOutcome::Ignored => {}
            DamageOutcome::Wounded { target } => {
                let recipients = self.room.ids();
                self.clients
                    .broadcast(&recipients, &ServerEvent::State(target), None);
            }
            DamageOutcome::Defeated {
                target,
                attacker,
                notice,
            } => {
                let recipients = self.room.ids();
                let target_id = target.id;

                if let Some(attacker) = attacker {
                    self.clients
                        .broadcast(&recipients, &ServerEvent::State(attacker), None);
                }
                self.clients
                    .broadcast(&recipients, &ServerEvent::State(target), None);
                self.clients
                    .broadcast(&recipients, &ServerEvent::Defeated(notice), None);

                self.schedule_respawn(target_id);
            }
        }
    }

    /// Starts (or restarts) the respawn countdown for a defeated session
    fn schedule_respawn(&mut self, id: PlayerId) {
        self.next_timer_generation += 1;
        let generation = self.next_timer_generation;
        let delay = self.config.respawn_delay;
        let server_tx = self.server_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = server_tx.send(ServerMessage::RespawnDue { id, generation }) {
                debug!("Respawn for {} fired after shutdown: {}", id, e);
            }
        });

        match self.room.get_mut(id) {
            Some(session) => {
                let timer = RespawnTimer::new(generation, handle);
                if let Some(previous) = session.respawn_timer.replace(timer) {
                    previous.cancel();
                }
            }
            None => handle.abort(),
        }
    }

    fn complete_respawn(&mut self, id: PlayerId, generation: u64, now: Instant) {
        let pending = self
            .room
            .get(id)
            .and_then(|session| session.respawn_timer.as_ref())
            .map(|timer| timer.generation);
        if pending != Some(generation) {
            debug!("Ignoring stale respawn timer for {}", id);
            return;
        }

        let Some(revival) = combat::respawn(&mut self.room, id, now) else {
            return;
        };

        let recipients = self.room.ids();
        self.clients.send(id, ServerEvent::Respawn(revival.private));
        self.clients.broadcast(
            &recipients,
            &ServerEvent::Respawned(revival.public.clone()),
            Some(id),
        );
        self.clients
            .broadcast(&recipients, &ServerEvent::State(revival.public), None);
    }

    /// Removes a session from the room and tells everyone else
    ///
    /// With a kick reason the connection is notified and closed first.
    pub fn remove_player(&mut self, id: PlayerId, kick_reason: Option<&str>) {
        if self.room.leave(id).is_none() {
            return;
        }

        if let Some(reason) = kick_reason {
            info!("Kicking player {}: {}", id, reason);
            self.clients.send(
                id,
                ServerEvent::Kicked(KickNotice {
                    reason: reason.to_string(),
                }),
            );
            self.disconnect(id);
        }

        let recipients = self.room.ids();
        self.clients
            .broadcast(&recipients, &ServerEvent::Left(LeftNotice { id }), None);
    }

    /// Kicks every session idle for longer than the configured timeout
    pub fn reap_idle(&mut self, now: Instant) {
        for id in self.reaper.sweep(&self.room, now) {
            self.remove_player(id, Some(INACTIVITY_REASON));
        }
    }

    /// Queues a close after anything already pending and forgets the connection
    fn disconnect(&mut self, id: PlayerId) {
        self.clients.close(id);
        self.clients.remove(id);
    }
}

/// Runs one WebSocket connection until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: PlayerId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    if server_tx
        .send(ServerMessage::Connected {
            id,
            addr,
            sender: out_tx,
        })
        .is_err()
    {
        error!("Server loop is gone, dropping connection from {}", addr);
        return;
    }

    // Writer: drains the outbound queue until closed or the queue is dropped
    tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            match outbound {
                Outbound::Event(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize {}: {}", event.name(), e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    if let Err(e) = ws_sender.close().await {
                        debug!("Error closing socket {}: {}", id, e);
                    }
                    break;
                }
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if server_tx.send(ServerMessage::Event { id, event }).is_err() {
                        break;
                    }
                }
                Err(e) => debug!("Dropping malformed frame from {}: {}", id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for {}: {}", addr, e);
                break;
            }
        }
    }

    if let Err(e) = server_tx.send(ServerMessage::Disconnected { id }) {
        debug!("Server loop gone before disconnect of {}: {}", id, e);
    }
}
