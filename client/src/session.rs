//! Join handshake and session lifecycle
//!
//! The session manager owns the lobby form and the state machine that takes a
//! player from the form into the room:
//!
//! ```text
//! Disconnected --submit--> Connecting --socket up--> JoinPending --ack ok--> Joined
//!      ^                        |                         |                     |
//!      +------------------------+-------------------------+---------------------+
//!            join failure, timeout, kick, disconnect: return to lobby
//! ```
//!
//! Each submit starts a new attempt with its own ack token. Acks and timeouts
//! carrying another attempt's token are ignored, so a late answer to an
//! abandoned join can never hijack a newer one.

use crate::network::Transport;
use log::{debug, info, warn};
use shared::{Character, ClientEvent, JoinAccepted, JoinAck, JoinError, JoinOutcome, JoinRequest, PlayerId};
use std::time::Duration;

pub const GENERIC_JOIN_FAILURE: &str = "Unable to join right now. Try again soon.";
pub const NAME_TAKEN_MESSAGE: &str = "That name is already taken. Try a different one.";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Rejoin to keep playing together.";
pub const KICKED_FALLBACK_MESSAGE: &str = "You were removed from the room.";
pub const RETRYING_MESSAGE: &str = "Unable to reach the caravan. Retrying...";
pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the caravan. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Join queued, waiting for the socket
    Connecting,
    /// Join sent, waiting for the ack
    JoinPending,
    Joined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// A join is already in flight or we are already in the room
    Busy,
    EmptyName,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingJoin {
    attempt: u64,
    request: JoinRequest,
}

/// Deadline for one join attempt, in session clock seconds
#[derive(Debug, Clone, Copy, PartialEq)]
struct JoinTimer {
    attempt: u64,
    deadline: f64,
}

/// The name entry overlay
#[derive(Debug, Clone, PartialEq)]
pub struct LobbyForm {
    pub name: String,
    pub character: Character,
    pub visible: bool,
    pub enabled: bool,
    /// The name should be selected so typing replaces it
    pub select_all: bool,
}

/// A user-facing message with an optional auto-hide delay
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub hide_after: Option<f32>,
}

impl Notice {
    pub fn sticky(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hide_after: None,
        }
    }

    pub fn transient(text: impl Into<String>, seconds: f32) -> Self {
        Self {
            text: text.into(),
            hide_after: Some(seconds),
        }
    }
}

/// The single message banner. A newer notice replaces the old one together
/// with its hide timer.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn show(&mut self, notice: Notice) {
        debug!("Notice: {}", notice.text);
        self.current = Some(notice);
    }

    pub fn hide(&mut self) {
        self.current = None;
    }

    pub fn tick(&mut self, dt: f32) {
        let expired = match self.current.as_mut().and_then(|n| n.hide_after.as_mut()) {
            Some(remaining) => {
                *remaining -= dt;
                *remaining <= 0.0
            }
            None => false,
        };
        if expired {
            self.current = None;
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.text.as_str())
    }
}

/// What the game should do after a join ack
#[derive(Debug, Clone, PartialEq)]
pub enum JoinResult {
    Accepted(JoinAccepted),
    /// Back to the lobby with this notice
    Rejected(Notice),
}

pub struct SessionManager {
    state: SessionState,
    pending: Option<PendingJoin>,
    timer: Option<JoinTimer>,
    next_attempt: u64,
    local_id: Option<PlayerId>,
    join_timeout: Duration,
    notice_duration: f32,
    clock: f64,
    pub lobby: LobbyForm,
}

impl SessionManager {
    pub fn new(name: &str, character: Character, join_timeout: Duration, notice_duration: f32) -> Self {
        Self {
            state: SessionState::Disconnected,
            pending: None,
            timer: None,
            next_attempt: 0,
            local_id: None,
            join_timeout,
            notice_duration,
            clock: 0.0,
            lobby: LobbyForm {
                name: name.to_string(),
                character,
                visible: true,
                enabled: true,
                select_all: false,
            },
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn has_joined(&self) -> bool {
        self.state == SessionState::Joined
    }

    pub fn join_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts a join attempt from the lobby form
    ///
    /// `position` is the local player's current position, offered to the
    /// server as a spawn fallback.
    pub fn submit(
        &mut self,
        position: (f32, f32),
        transport: &mut dyn Transport,
    ) -> Result<u64, SubmitError> {
        if self.join_in_flight() || self.has_joined() {
            return Err(SubmitError::Busy);
        }
        let name = self.lobby.name.trim().to_string();
        if name.is_empty() {
            self.lobby.select_all = true;
            return Err(SubmitError::EmptyName);
        }

        self.cancel_pending();
        self.next_attempt += 1;
        let attempt = self.next_attempt;

        self.pending = Some(PendingJoin {
            attempt,
            request: JoinRequest {
                ack: attempt,
                name: Some(name),
                x: Some(position.0),
                y: Some(position.1),
                character: Some(self.lobby.character.as_str().to_string()),
            },
        });
        self.timer = Some(JoinTimer {
            attempt,
            deadline: self.clock + self.join_timeout.as_secs_f64(),
        });
        self.lobby.enabled = false;
        self.state = SessionState::Connecting;

        if transport.is_connected() {
            self.emit_pending(transport);
        } else {
            transport.connect();
        }
        Ok(attempt)
    }

    fn emit_pending(&mut self, transport: &mut dyn Transport) {
        let Some(pending) = &self.pending else {
            return;
        };
        if transport.emit(ClientEvent::Join(pending.request.clone())) {
            debug!("Join attempt {} sent", pending.attempt);
            self.state = SessionState::JoinPending;
        }
    }

    fn cancel_pending(&mut self) {
        self.pending = None;
        self.timer = None;
    }

    /// Socket came up. Returns true if the caller should push a forced
    /// snapshot because we were already in the room.
    pub fn on_connected(&mut self, transport: &mut dyn Transport) -> bool {
        if self.pending.is_some() {
            self.emit_pending(transport);
            return false;
        }
        self.has_joined()
    }

    /// Socket dropped. Returns true if we were in the room, which ends the
    /// session; a join still waiting for its ack is resent on reconnect.
    pub fn on_disconnected(&mut self) -> bool {
        match self.state {
            SessionState::Joined => true,
            SessionState::JoinPending => {
                self.state = SessionState::Connecting;
                false
            }
            _ => false,
        }
    }

    pub fn on_connect_error(&mut self) -> Notice {
        if self.pending.is_some() {
            return Notice::sticky(RETRYING_MESSAGE);
        }
        Notice::transient(UNREACHABLE_MESSAGE, self.notice_duration)
    }

    /// Resolves the pending join. Returns `None` for an ack that belongs to
    /// no live attempt.
    pub fn on_join_ack(&mut self, ack: JoinAck) -> Option<JoinResult> {
        match &self.pending {
            Some(pending) if pending.attempt == ack.ack => {}
            _ => {
                debug!("Ignoring stale join ack {}", ack.ack);
                return None;
            }
        }
        self.cancel_pending();
        self.lobby.enabled = true;

        match ack.result {
            JoinOutcome::Accepted(accepted) => {
                info!("Joined as {} (id {})", accepted.name, accepted.id);
                self.local_id = Some(accepted.id);
                self.state = SessionState::Joined;
                self.lobby.visible = false;
                self.lobby.name = accepted.name.clone();
                Some(JoinResult::Accepted(accepted))
            }
            JoinOutcome::Rejected(rejected) => {
                warn!("Join rejected: {}", rejected.error);
                self.state = SessionState::Disconnected;
                let notice = match rejected.error {
                    JoinError::RoomFull => {
                        let capacity = rejected.max_players.unwrap_or(shared::MAX_PLAYERS);
                        Notice::transient(
                            format!("The room is full right now (max {} players).", capacity),
                            self.notice_duration,
                        )
                    }
                    JoinError::NameTaken => {
                        self.lobby.select_all = true;
                        Notice::sticky(NAME_TAKEN_MESSAGE)
                    }
                    JoinError::AlreadyJoined => {
                        Notice::transient(GENERIC_JOIN_FAILURE, self.notice_duration)
                    }
                };
                Some(JoinResult::Rejected(notice))
            }
        }
    }

    /// Advances the session clock. Returns a notice if the pending join just
    /// timed out.
    pub fn tick(&mut self, dt: f32) -> Option<Notice> {
        self.clock += f64::from(dt);

        let timer = self.timer?;
        if self.clock < timer.deadline {
            return None;
        }
        self.timer = None;

        match &self.pending {
            Some(pending) if pending.attempt == timer.attempt => {
                warn!("Join attempt {} timed out", timer.attempt);
                Some(Notice::transient(GENERIC_JOIN_FAILURE, self.notice_duration))
            }
            _ => None,
        }
    }

    /// Leaves the room locally and shows the form again
    pub fn return_to_lobby(&mut self) {
        self.cancel_pending();
        self.state = SessionState::Disconnected;
        self.local_id = None;
        self.lobby.visible = true;
        self.lobby.enabled = true;
    }
}
