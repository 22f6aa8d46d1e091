//! Wire protocol for the room relay.
//!
//! Every WebSocket text frame is one JSON object `{"event": "<name>", "data": {...}}`.
//! Client payloads are deliberately lenient (all fields optional) so that a
//! partially malformed update degrades to "keep the previous value" instead of
//! tearing the connection down. Server payloads are strongly typed.

use crate::{AnimState, Character, Facing, ProjectileKind};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Connection-scoped identifier; a session reuses its connection's id.
pub type PlayerId = u32;

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

/// Reads an optional client field, mapping a value of the wrong type to `None`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Valid(value) => Some(value),
        Lenient::Invalid(_) => None,
    })
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    lenient(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "player:join")]
    Join(JoinRequest),
    #[serde(rename = "player:update")]
    Update(UpdatePayload),
    #[serde(rename = "player:shoot")]
    Shoot(ShootPayload),
    #[serde(rename = "player:damage")]
    Damage(DamagePayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "player:join",
            Self::Update(_) => "player:update",
            Self::Shoot(_) => "player:shoot",
            Self::Damage(_) => "player:damage",
        }
    }
}

/// Join handshake. `ack` is echoed back in the matching `player:join:ack`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    #[serde(deserialize_with = "lenient_or_default")]
    pub ack: u64,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub x: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub y: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub character: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePayload {
    #[serde(deserialize_with = "lenient")]
    pub x: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub y: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub facing: Option<i8>,
    #[serde(deserialize_with = "lenient")]
    pub anim: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShootPayload {
    #[serde(deserialize_with = "lenient")]
    pub x: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub y: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub vx: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub vy: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub width: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub height: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub damage: Option<f32>,
    #[serde(deserialize_with = "lenient")]
    pub lifetime: Option<f32>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DamagePayload {
    #[serde(deserialize_with = "lenient")]
    pub target_id: Option<PlayerId>,
    #[serde(deserialize_with = "lenient")]
    pub attacker_id: Option<PlayerId>,
    #[serde(deserialize_with = "lenient")]
    pub amount: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "player:join:ack")]
    JoinAck(JoinAck),
    #[serde(rename = "player:joined")]
    Joined(PublicState),
    #[serde(rename = "player:updated")]
    Updated(MovementEcho),
    #[serde(rename = "player:left")]
    Left(LeftNotice),
    #[serde(rename = "player:shot")]
    Shot(ShotRelay),
    #[serde(rename = "player:state")]
    State(PublicState),
    #[serde(rename = "player:defeated")]
    Defeated(DefeatNotice),
    #[serde(rename = "player:respawn")]
    Respawn(RespawnPayload),
    #[serde(rename = "player:respawned")]
    Respawned(PublicState),
    #[serde(rename = "player:kicked")]
    Kicked(KickNotice),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinAck(_) => "player:join:ack",
            Self::Joined(_) => "player:joined",
            Self::Updated(_) => "player:updated",
            Self::Left(_) => "player:left",
            Self::Shot(_) => "player:shot",
            Self::State(_) => "player:state",
            Self::Defeated(_) => "player:defeated",
            Self::Respawn(_) => "player:respawn",
            Self::Respawned(_) => "player:respawned",
            Self::Kicked(_) => "player:kicked",
        }
    }
}

/// Everything other room members may know about a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicState {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub anim: AnimState,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEcho {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub anim: AnimState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftNotice {
    pub id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotRelay {
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub damage: f32,
    pub lifetime: f32,
    #[serde(rename = "type")]
    pub kind: ProjectileKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefeatNotice {
    pub target_id: PlayerId,
    pub attacker_id: Option<PlayerId>,
}

/// Private payload sent only to the revived connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespawnPayload {
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub deaths: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickNotice {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinAck {
    pub ack: u64,
    pub result: JoinOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinOutcome {
    Accepted(JoinAccepted),
    Rejected(JoinRejected),
}

/// Session bootstrap returned to a successful joiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAccepted {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub character: Character,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub kills: u32,
    pub deaths: u32,
    /// Current roster, excluding the joiner.
    pub players: Vec<PublicState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRejected {
    pub error: JoinError,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum JoinError {
    #[error("the room is full")]
    RoomFull,
    #[error("that name is already taken")]
    NameTaken,
    #[error("this connection has already joined")]
    AlreadyJoined,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_browser_style_join_frame() {
        let raw = r#"{"event":"player:join","data":{"ack":7,"name":"Hero","x":140,"y":488,"character":"sinbad"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();

        match event {
            ClientEvent::Join(request) => {
                assert_eq!(request.ack, 7);
                assert_eq!(request.name.as_deref(), Some("Hero"));
                assert_eq!(request.character.as_deref(), Some("sinbad"));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_update_payload_tolerates_missing_and_unknown_fields() {
        let raw = r#"{"event":"player:update","data":{"x":12.5,"anim":"moonwalk","extra":true}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();

        match event {
            ClientEvent::Update(update) => {
                assert_eq!(update.x, Some(12.5));
                assert_eq!(update.y, None);
                assert_eq!(update.facing, None);
                assert_eq!(update.anim.as_deref(), Some("moonwalk"));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_ill_typed_fields_fall_back_to_none() {
        let raw = r#"{"event":"player:update","data":{"x":40,"y":300.5,"facing":"left","anim":5}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::Update(update) => {
                assert_eq!(update.x, Some(40.0));
                assert_eq!(update.y, Some(300.5));
                assert_eq!(update.facing, None);
                assert_eq!(update.anim, None);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        let raw = r#"{"event":"player:shoot","data":{"x":"left","vx":640,"type":[1]}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::Shoot(shot) => {
                assert_eq!(shot.x, None);
                assert_eq!(shot.vx, Some(640.0));
                assert_eq!(shot.kind, None);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        let raw = r#"{"event":"player:damage","data":{"targetId":"2","amount":null}}"#;
        assert_eq!(
            serde_json::from_str::<ClientEvent>(raw).unwrap(),
            ClientEvent::Damage(DamagePayload::default())
        );
    }

    #[test]
    fn test_ill_typed_join_keeps_ack_and_position() {
        let raw = r#"{"event":"player:join","data":{"ack":4,"name":42,"x":140,"y":488,"character":{}}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::Join(request) => {
                assert_eq!(request.ack, 4);
                assert_eq!(request.name, None);
                assert_eq!(request.x, Some(140.0));
                assert_eq!(request.y, Some(488.0));
                assert_eq!(request.character, None);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        let raw = r#"{"event":"player:join","data":{"ack":"seven","name":"Hero"}}"#;
        match serde_json::from_str::<ClientEvent>(raw).unwrap() {
            ClientEvent::Join(request) => {
                assert_eq!(request.ack, 0);
                assert_eq!(request.name.as_deref(), Some("Hero"));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let unknown = r#"{"event":"player:dance","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(unknown).is_err());
    }

    #[test]
    fn test_damage_payload_uses_camel_case() {
        let raw = r#"{"event":"player:damage","data":{"targetId":2,"attackerId":3,"amount":1}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Damage(DamagePayload {
                target_id: Some(2),
                attacker_id: Some(3),
                amount: Some(1.0),
            })
        );
    }

    #[test]
    fn test_rejected_ack_wire_shape() {
        let event = ServerEvent::JoinAck(JoinAck {
            ack: 3,
            result: JoinOutcome::Rejected(JoinRejected {
                error: JoinError::RoomFull,
                max_players: Some(4),
            }),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "player:join:ack",
                "data": { "ack": 3, "result": { "error": "room_full", "maxPlayers": 4 } }
            })
        );
    }

    #[test]
    fn test_accepted_ack_is_distinguished_from_rejection() {
        let raw = json!({
            "event": "player:join:ack",
            "data": {
                "ack": 1,
                "result": {
                    "id": 5, "name": "Hero", "color": "#ffcc66", "character": "aliBaba",
                    "x": 140.0, "y": 488.0, "health": 20.0, "maxHealth": 20.0,
                    "kills": 0, "deaths": 0, "players": []
                }
            }
        });

        let event: ServerEvent = serde_json::from_value(raw).unwrap();
        match event {
            ServerEvent::JoinAck(JoinAck {
                result: JoinOutcome::Accepted(accepted),
                ..
            }) => {
                assert_eq!(accepted.id, 5);
                assert_eq!(accepted.character, Character::AliBaba);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        let rejected: JoinOutcome =
            serde_json::from_value(json!({ "error": "name_taken" })).unwrap();
        assert_eq!(
            rejected,
            JoinOutcome::Rejected(JoinRejected {
                error: JoinError::NameTaken,
                max_players: None,
            })
        );
    }

    #[test]
    fn test_defeat_notice_serializes_null_attacker() {
        let value = serde_json::to_value(ServerEvent::Defeated(DefeatNotice {
            target_id: 2,
            attacker_id: None,
        }))
        .unwrap();
        assert_eq!(value["data"]["attackerId"], serde_json::Value::Null);
        assert_eq!(value["data"]["targetId"], 2);
    }

    #[test]
    fn test_join_error_display() {
        assert_eq!(JoinError::NameTaken.to_string(), "that name is already taken");
    }
}
