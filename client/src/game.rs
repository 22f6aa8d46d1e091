//! Client game state and per-frame orchestration
//!
//! [`ClientGame`] glues the session manager, the local integrator, the ghost
//! roster and the transport together. All of it runs on the frame loop:
//! transport events are drained at the start of each frame, and the outbound
//! movement snapshot piggybacks on the frame clock rather than a timer.

use crate::config::ClientConfig;
use crate::network::{Transport, TransportEvent};
use crate::player::{LocalPlayer, PlayerControls};
use crate::projectiles::Projectiles;
use crate::reconcile::{GhostRoster, SnapshotClock};
use crate::session::{
    JoinResult, Notice, NoticeBoard, SessionManager, SubmitError, CONNECTION_LOST_MESSAGE,
    KICKED_FALLBACK_MESSAGE,
};
use crate::trails::DashTrails;
use log::{debug, info, warn};
use shared::{ClientEvent, DefeatNotice, JoinAccepted, PlayerId, ServerEvent};

/// Longest frame step the simulation accepts
pub const MAX_FRAME_DELTA: f32 = 1.0 / 30.0;
const DEFEAT_NOTICE_SECONDS: f32 = 2.2;

/// One-shot audio triggers, drained by whoever plays sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Fire,
    Death,
}

pub struct ClientGame<T: Transport> {
    config: ClientConfig,
    transport: T,
    pub session: SessionManager,
    pub notices: NoticeBoard,
    pub player: LocalPlayer,
    pub ghosts: GhostRoster,
    pub projectiles: Projectiles,
    pub trails: DashTrails,
    /// Written by the input layer before each frame
    pub controls: PlayerControls,
    snapshot_clock: SnapshotClock,
    cues: Vec<SoundCue>,
    clock: f64,
}

impl<T: Transport> ClientGame<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let session = SessionManager::new(
            &config.name,
            config.character,
            config.join_timeout,
            config.notice_duration,
        );
        Self {
            player: LocalPlayer::new(&config.name, config.character),
            ghosts: GhostRoster::new(config.smoothing_rate, config.snap_epsilon),
            snapshot_clock: SnapshotClock::new(config.send_interval),
            session,
            notices: NoticeBoard::default(),
            projectiles: Projectiles::new(),
            trails: DashTrails::new(),
            controls: PlayerControls::default(),
            cues: Vec::new(),
            clock: 0.0,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.session.local_id()
    }

    pub fn take_cues(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.cues)
    }

    /// Submits the lobby form
    pub fn submit_join(&mut self) -> Result<u64, SubmitError> {
        self.player.character = self.session.lobby.character;
        let position = (self.player.x, self.player.y);
        let result = self.session.submit(position, &mut self.transport);
        match &result {
            Ok(attempt) => {
                info!("Joining as {:?} (attempt {})", self.session.lobby.name.trim(), attempt);
                self.notices.hide();
            }
            Err(e) => debug!("Join not submitted: {:?}", e),
        }
        result
    }

    /// Advances the whole client by one frame
    ///
    /// `frame_time` is wall-clock time. Timeouts and notices run on it as-is;
    /// only the simulation step is capped at [`MAX_FRAME_DELTA`].
    pub fn frame(&mut self, frame_time: f32) {
        let wall_dt = frame_time.max(0.0);
        let dt = wall_dt.min(MAX_FRAME_DELTA);
        self.clock += f64::from(dt);

        while let Some(event) = self.transport.poll() {
            self.handle_transport_event(event);
        }

        if let Some(notice) = self.session.tick(wall_dt) {
            self.return_to_lobby(Some(notice));
        }

        self.player.update(dt, &mut self.controls, &mut self.trails);
        self.handle_attack(dt);

        let reports = self.projectiles.update(
            dt,
            self.session.local_id(),
            &mut self.player,
            &mut self.ghosts,
        );
        for report in reports {
            self.transport.emit(ClientEvent::Damage(report));
        }

        self.ghosts.update(dt, &mut self.trails);
        self.trails.update(dt);
        self.notices.tick(wall_dt);

        if self.session.has_joined()
            && self.transport.is_connected()
            && self.snapshot_clock.tick(dt)
        {
            self.send_snapshot(false);
        }
    }

    fn handle_attack(&mut self, dt: f32) {
        self.player.fire_cooldown = (self.player.fire_cooldown - dt).max(0.0);

        let Some(local_id) = self.session.local_id() else {
            return;
        };
        if !self.player.alive || !self.controls.fire || self.player.fire_cooldown > 0.0 {
            return;
        }

        let shot = self
            .projectiles
            .fire(local_id, &mut self.player, self.controls.aim);
        self.transport.emit(ClientEvent::Shoot(shot.shoot_payload()));
        self.cues.push(SoundCue::Fire);
    }

    /// Ships the current movement snapshot
    ///
    /// A forced send restarts the cadence so the next routine snapshot is a
    /// full interval away.
    pub fn send_snapshot(&mut self, force: bool) -> bool {
        if !self.session.has_joined() || !self.transport.is_connected() {
            return false;
        }
        if force {
            self.snapshot_clock.reset();
        }
        self.player.anim = self.player.determine_anim();
        self.transport
            .emit(ClientEvent::Update(self.player.snapshot()))
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.session.on_connected(&mut self.transport) {
                    self.send_snapshot(true);
                }
            }
            TransportEvent::Disconnected => {
                if self.session.on_disconnected() {
                    warn!("Lost connection while in the room");
                    self.return_to_lobby(Some(Notice::transient(
                        CONNECTION_LOST_MESSAGE,
                        self.config.notice_duration,
                    )));
                }
            }
            TransportEvent::ConnectError(reason) => {
                warn!("Connection error: {}", reason);
                let notice = self.session.on_connect_error();
                self.notices.show(notice);
            }
            TransportEvent::Message(event) => self.handle_server_event(event),
        }
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        let now = self.clock;
        let local_id = self.session.local_id();

        match event {
            ServerEvent::JoinAck(ack) => match self.session.on_join_ack(ack) {
                Some(JoinResult::Accepted(accepted)) => self.complete_join(accepted),
                Some(JoinResult::Rejected(notice)) => self.return_to_lobby(Some(notice)),
                None => {}
            },
            ServerEvent::Joined(state) => {
                info!("{} joined", state.name);
                self.ghosts.register(&state, now);
            }
            ServerEvent::Updated(echo) => self.ghosts.apply_updated(&echo, now),
            ServerEvent::Left(notice) => {
                if let Some(ghost) = self.ghosts.remove(notice.id) {
                    info!("{} left", ghost.name);
                }
            }
            ServerEvent::Shot(shot) => {
                self.projectiles.add_remote(&shot);
                self.cues.push(SoundCue::Fire);
            }
            ServerEvent::State(state) => {
                if Some(state.id) == local_id {
                    if self.player.apply_authoritative(&state) {
                        info!("Knocked down");
                        self.controls.fire = false;
                    }
                } else {
                    self.ghosts.apply_state(&state, now);
                }
            }
            ServerEvent::Defeated(notice) => self.announce_defeat(&notice),
            ServerEvent::Respawn(payload) => {
                if !self.session.has_joined() {
                    return;
                }
                info!("Respawned at ({:.0}, {:.0})", payload.x, payload.y);
                self.player.apply_respawn(&payload);
                self.projectiles.clear();
                self.send_snapshot(true);
            }
            ServerEvent::Respawned(state) => {
                if Some(state.id) != local_id {
                    self.ghosts.apply_respawned(&state, now);
                }
            }
            ServerEvent::Kicked(notice) => {
                let reason = if notice.reason.trim().is_empty() {
                    KICKED_FALLBACK_MESSAGE.to_string()
                } else {
                    notice.reason
                };
                warn!("Kicked: {}", reason);
                self.return_to_lobby(Some(Notice::transient(
                    reason,
                    self.config.notice_duration,
                )));
            }
        }
    }

    fn complete_join(&mut self, accepted: JoinAccepted) {
        self.player.apply_join(&accepted);
        self.ghosts.clear();
        self.ghosts.set_local_id(Some(accepted.id));
        for state in &accepted.players {
            self.ghosts.register(state, self.clock);
        }
        self.projectiles.clear();
        self.notices.hide();
        self.send_snapshot(true);
    }

    /// The single recovery path for every way a session ends
    pub fn return_to_lobby(&mut self, notice: Option<Notice>) {
        self.session.return_to_lobby();
        self.ghosts.clear();
        self.ghosts.set_local_id(None);
        self.controls.fire = false;
        self.player.reset_for_lobby();
        self.trails.clear();
        self.projectiles.clear();

        if self.session.lobby.name.trim().is_empty() {
            self.session.lobby.name = self.player.display_name.clone();
        }
        self.session.lobby.character = self.player.character;

        match notice {
            Some(notice) => self.notices.show(notice),
            None => self.notices.hide(),
        }
    }

    fn display_name_of(&self, id: PlayerId) -> Option<String> {
        if Some(id) == self.session.local_id() {
            return Some(self.player.display_name.clone());
        }
        self.ghosts.name_of(id).map(str::to_string)
    }

    fn announce_defeat(&mut self, notice: &DefeatNotice) {
        let Some(target) = self.display_name_of(notice.target_id) else {
            debug!("Defeat of unknown player {}", notice.target_id);
            return;
        };
        let attacker = notice.attacker_id.and_then(|id| self.display_name_of(id));

        let text = match attacker {
            Some(attacker) if attacker != target => format!("{} defeated {}!", attacker, target),
            _ => format!("{} took themselves out!", target),
        };
        info!("{}", text);
        self.notices
            .show(Notice::transient(text, DEFEAT_NOTICE_SECONDS));
        self.cues.push(SoundCue::Death);
    }
}
