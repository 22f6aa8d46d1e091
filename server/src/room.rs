//! Room registry: the roster of joined sessions and the pools they draw from
//!
//! The room owns every piece of shared mutable state a join or leave touches:
//! - The session map keyed by connection id
//! - The case-insensitive name registry
//! - The colour pool (fixed palette, random HSL once exhausted)
//! - The round-robin spawn rotation
//!
//! None of this is safe for concurrent mutation. The network layer funnels all
//! events through a single task, which is what keeps multi-step invariants such
//! as release-then-reassign of names intact.

use crate::combat::RespawnTimer;
use crate::config::ServerConfig;
use log::{debug, info};
use rand::Rng;
use shared::{
    clamp_to_world, AnimState, Character, Facing, JoinAccepted, JoinError, JoinRequest, PlayerId,
    PublicState, DEFAULT_NAME, MAIN_ROOM, MAX_NAME_CHARS,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::time::Instant;

/// Authoritative record of one joined player
#[derive(Debug)]
pub struct PlayerSession {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub character: Character,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub anim: AnimState,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    /// Last time this session did something that counts as activity
    pub last_active: Instant,
    /// Pending respawn, cancelled whenever the session leaves first
    pub respawn_timer: Option<RespawnTimer>,
}

impl PlayerSession {
    pub fn touch(&mut self, now: Instant) {
        self.last_active = now;
    }

    pub fn public_state(&self) -> PublicState {
        PublicState {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            x: self.x,
            y: self.y,
            facing: self.facing,
            anim: self.anim,
            health: self.health,
            max_health: self.max_health,
            alive: self.alive,
            kills: self.kills,
            deaths: self.deaths,
            character: Some(self.character),
        }
    }
}

/// Trims a requested display name and caps it, falling back to a placeholder
pub fn sanitize_name(input: Option<&str>) -> String {
    let trimmed = input.unwrap_or_default().trim();
    let capped: String = trimmed.chars().take(MAX_NAME_CHARS).collect();
    if capped.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        capped
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive set of claimed display names
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashSet<String>,
}

impl NameRegistry {
    /// Returns false if the name (ignoring case) is already claimed
    pub fn claim(&mut self, name: &str) -> bool {
        let key = name_key(name);
        if key.is_empty() {
            return false;
        }
        self.claimed.insert(key)
    }

    pub fn release(&mut self, name: &str) {
        self.claimed.remove(&name_key(name));
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(&name_key(name))
    }
}

/// Palette colours available for assignment
#[derive(Debug)]
pub struct ColorPool {
    palette: Vec<String>,
    available: VecDeque<String>,
}

impl ColorPool {
    pub fn new(palette: Vec<String>) -> Self {
        Self {
            available: palette.iter().cloned().collect(),
            palette,
        }
    }

    /// Hands out the next palette colour, or a random HSL colour once the palette is exhausted
    pub fn assign(&mut self) -> String {
        if let Some(color) = self.available.pop_front() {
            return color;
        }

        let hue = rand::thread_rng().gen_range(0..360);
        format!("hsl({}, 70%, 60%)", hue)
    }

    /// Returns a colour to the pool. Generated colours are simply dropped.
    pub fn release(&mut self, color: &str) {
        if self.palette.iter().any(|c| c == color) && !self.available.iter().any(|c| c == color) {
            self.available.push_back(color.to_string());
        }
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }
}

/// Round-robin index into a fixed list of spawn points
#[derive(Debug)]
pub struct SpawnRotation {
    points: Vec<(f32, f32)>,
    next_index: usize,
}

impl SpawnRotation {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self {
            points,
            next_index: 0,
        }
    }

    pub fn next(&mut self) -> Option<(f32, f32)> {
        if self.points.is_empty() {
            return None;
        }
        let point = self.points[self.next_index % self.points.len()];
        self.next_index = (self.next_index + 1) % self.points.len();
        Some(point)
    }
}

pub struct Room {
    sessions: HashMap<PlayerId, PlayerSession>,
    names: NameRegistry,
    colors: ColorPool,
    spawns: SpawnRotation,
    capacity: usize,
    default_health: f32,
}

impl Room {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            names: NameRegistry::default(),
            colors: ColorPool::new(config.palette.clone()),
            spawns: SpawnRotation::new(config.spawn_points.clone()),
            capacity: config.capacity,
            default_health: config.default_health,
        }
    }

    /// Admits a connection into the room
    ///
    /// Checks run in order: duplicate join from the same connection, capacity,
    /// then name uniqueness. A rejected join never mutates the roster or the
    /// pools. The requested position is only used when no spawn rotation is
    /// configured.
    pub fn join(
        &mut self,
        id: PlayerId,
        request: &JoinRequest,
        now: Instant,
    ) -> Result<JoinAccepted, JoinError> {
        if self.sessions.contains_key(&id) {
            return Err(JoinError::AlreadyJoined);
        }
        if self.sessions.len() >= self.capacity {
            return Err(JoinError::RoomFull);
        }

        let name = sanitize_name(request.name.as_deref());
        if !self.names.claim(&name) {
            debug!("Rejecting join from {}: name {:?} is taken", id, name);
            return Err(JoinError::NameTaken);
        }

        let color = self.colors.assign();
        let (x, y) = self.spawns.next().unwrap_or_else(|| {
            clamp_to_world(
                request.x.filter(|v| v.is_finite()).unwrap_or_default(),
                request.y.filter(|v| v.is_finite()).unwrap_or_default(),
            )
        });
        let character = Character::normalize(request.character.as_deref());

        let session = PlayerSession {
            id,
            name: name.clone(),
            color: color.clone(),
            character,
            x,
            y,
            facing: Facing::Right,
            anim: AnimState::Idle,
            health: self.default_health,
            max_health: self.default_health,
            alive: true,
            kills: 0,
            deaths: 0,
            last_active: now,
            respawn_timer: None,
        };

        info!("Player {} joined as {:?} ({}) at ({}, {})", id, name, color, x, y);
        self.sessions.insert(id, session);

        Ok(JoinAccepted {
            id,
            name,
            color,
            character,
            x,
            y,
            health: self.default_health,
            max_health: self.default_health,
            kills: 0,
            deaths: 0,
            players: self.roster_except(id),
        })
    }

    /// Removes a session and returns its name and palette colour to the pools
    ///
    /// Any pending respawn is cancelled so a removed session can never be
    /// revived by a late timer.
    pub fn leave(&mut self, id: PlayerId) -> Option<PlayerSession> {
        let mut session = self.sessions.remove(&id)?;

        if let Some(timer) = session.respawn_timer.take() {
            timer.cancel();
        }
        self.names.release(&session.name);
        self.colors.release(&session.color);

        info!("Player {} ({:?}) left the room", id, session.name);
        Some(session)
    }

    pub fn next_spawn(&mut self) -> Option<(f32, f32)> {
        self.spawns.next()
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.sessions.keys().copied().collect()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &PlayerSession> {
        self.sessions.values()
    }

    pub fn public_state(&self, id: PlayerId) -> Option<PublicState> {
        self.sessions.get(&id).map(PlayerSession::public_state)
    }

    pub fn roster_except(&self, id: PlayerId) -> Vec<PublicState> {
        self.sessions
            .values()
            .filter(|session| session.id != id)
            .map(PlayerSession::public_state)
            .collect()
    }

    /// Every connection shares the one room
    pub fn name(&self) -> &'static str {
        MAIN_ROOM
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_name_claimed(&self, name: &str) -> bool {
        self.names.is_claimed(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PALETTE;
    use tokio_test::{assert_err, assert_ok};

    fn join_request(name: &str) -> JoinRequest {
        JoinRequest {
            name: Some(name.to_string()),
            ..JoinRequest::default()
        }
    }

    fn test_room() -> Room {
        Room::new(&ServerConfig::default())
    }

    #[test]
    fn test_room_defaults() {
        let room = test_room();
        assert_eq!(room.name(), "main");
        assert_eq!(room.capacity(), 4);
        assert!(room.is_empty());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(Some("  Hero  ")), "Hero");
        assert_eq!(sanitize_name(Some("   ")), DEFAULT_NAME);
        assert_eq!(sanitize_name(None), DEFAULT_NAME);
        let long = "abcdefghijklmnopqrstuvwxyz";
        assert_eq!(sanitize_name(Some(long)).chars().count(), MAX_NAME_CHARS);
        // Multi-byte names are cut on characters, not bytes
        assert_eq!(sanitize_name(Some(&"é".repeat(30))), "é".repeat(20));
    }

    #[test]
    fn test_join_assigns_palette_color_and_first_spawn() {
        let mut room = test_room();
        let accepted = room.join(1, &join_request("Hero"), Instant::now()).unwrap();

        assert_eq!(accepted.id, 1);
        assert_eq!(accepted.name, "Hero");
        assert_eq!(accepted.color, PALETTE[0]);
        assert_eq!((accepted.x, accepted.y), shared::SPAWN_POINTS[0]);
        assert_eq!(accepted.health, 20.0);
        assert_eq!(accepted.max_health, 20.0);
        assert!(accepted.players.is_empty());
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_join_roster_excludes_joiner() {
        let mut room = test_room();
        room.join(1, &join_request("Hero"), Instant::now()).unwrap();
        room.join(2, &join_request("Sidekick"), Instant::now()).unwrap();
        let accepted = room.join(3, &join_request("Third"), Instant::now()).unwrap();

        let mut roster_ids: Vec<PlayerId> = accepted.players.iter().map(|p| p.id).collect();
        roster_ids.sort_unstable();
        assert_eq!(roster_ids, vec![1, 2]);
    }

    #[test]
    fn test_name_uniqueness_is_case_insensitive() {
        let mut room = test_room();
        room.join(1, &join_request("Hero"), Instant::now()).unwrap();

        let result = room.join(2, &join_request("hero"), Instant::now());
        assert_eq!(result, Err(JoinError::NameTaken));
        let result = room.join(2, &join_request("  HERO "), Instant::now());
        assert_eq!(result, Err(JoinError::NameTaken));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_released_name_is_immediately_available() {
        let mut room = test_room();
        assert_ok!(room.join(1, &join_request("Hero"), Instant::now()));
        assert!(room.leave(1).is_some());

        assert!(!room.is_name_claimed("HERO"));
        let accepted = assert_ok!(room.join(2, &join_request("hero"), Instant::now()));
        assert_eq!(accepted.name, "hero");
    }

    #[test]
    fn test_fifth_join_is_rejected_without_mutation() {
        let mut room = test_room();
        for id in 1..=4 {
            assert_ok!(room.join(id, &join_request(&format!("P{}", id)), Instant::now()));
        }

        let error = assert_err!(room.join(5, &join_request("Late"), Instant::now()));
        assert_eq!(error, JoinError::RoomFull);
        assert_eq!(room.len(), 4);
        assert!(!room.contains(5));
        assert!(!room.is_name_claimed("Late"));
    }

    #[test]
    fn test_duplicate_join_from_same_connection() {
        let mut room = test_room();
        room.join(1, &join_request("Hero"), Instant::now()).unwrap();
        let result = room.join(1, &join_request("Other"), Instant::now());
        assert_eq!(result, Err(JoinError::AlreadyJoined));
        assert!(!room.is_name_claimed("Other"));
    }

    #[test]
    fn test_empty_names_share_the_placeholder() {
        let mut room = test_room();
        let first = room.join(1, &join_request(""), Instant::now()).unwrap();
        assert_eq!(first.name, DEFAULT_NAME);
        // The placeholder is a real claimed name
        assert_eq!(
            room.join(2, &JoinRequest::default(), Instant::now()),
            Err(JoinError::NameTaken)
        );
    }

    #[test]
    fn test_spawn_rotation_wraps() {
        let mut rotation = SpawnRotation::new(vec![(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(rotation.next(), Some((1.0, 1.0)));
        assert_eq!(rotation.next(), Some((2.0, 2.0)));
        assert_eq!(rotation.next(), Some((1.0, 1.0)));

        let mut empty = SpawnRotation::new(Vec::new());
        assert_eq!(empty.next(), None);
    }

    #[test]
    fn test_join_without_spawn_rotation_uses_clamped_request() {
        let config = ServerConfig {
            spawn_points: Vec::new(),
            ..ServerConfig::default()
        };
        let mut room = Room::new(&config);
        let request = JoinRequest {
            name: Some("Hero".to_string()),
            x: Some(-50.0),
            y: Some(300.0),
            ..JoinRequest::default()
        };

        let accepted = room.join(1, &request, Instant::now()).unwrap();
        assert_eq!((accepted.x, accepted.y), (0.0, 300.0));
    }

    #[test]
    fn test_color_pool_falls_back_to_hsl_and_recycles_palette() {
        let mut pool = ColorPool::new(vec!["#111111".to_string(), "#222222".to_string()]);
        assert_eq!(pool.assign(), "#111111");
        assert_eq!(pool.assign(), "#222222");

        let generated = pool.assign();
        assert!(generated.starts_with("hsl("));
        assert!(generated.ends_with(", 70%, 60%)"));

        pool.release(&generated);
        assert_eq!(pool.available(), 0);

        pool.release("#222222");
        pool.release("#222222");
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.assign(), "#222222");
    }

    #[test]
    fn test_leave_releases_color() {
        let mut room = test_room();
        let accepted = room.join(1, &join_request("Hero"), Instant::now()).unwrap();
        room.leave(1);

        let again = room.join(2, &join_request("Other"), Instant::now()).unwrap();
        // Released colour goes to the back of the queue
        assert_ne!(again.color, accepted.color);
        assert_eq!(room.colors.available(), PALETTE.len() - 1);
    }

    #[test]
    fn test_leave_unknown_session() {
        let mut room = test_room();
        assert!(room.leave(42).is_none());
    }

    #[test]
    fn test_join_normalizes_character() {
        let mut room = test_room();
        let request = JoinRequest {
            name: Some("Sailor".to_string()),
            character: Some("sinbad".to_string()),
            ..JoinRequest::default()
        };
        let accepted = room.join(1, &request, Instant::now()).unwrap();
        assert_eq!(accepted.character, Character::Sinbad);

        let request = JoinRequest {
            name: Some("Thief".to_string()),
            character: Some("genie".to_string()),
            ..JoinRequest::default()
        };
        let accepted = room.join(2, &request, Instant::now()).unwrap();
        assert_eq!(accepted.character, Character::AliBaba);
    }
}
