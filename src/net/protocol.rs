use serde::{Deserialize, Serialize};

use crate::config::{MapShape, TrustMode};
use crate::game::state::{AccountId, Cosmetic, DeathCause, EntityId, FoodId, Trust};
use crate::util::vec2::Vec2;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Steering input
    Input(PlayerInput),
    /// Client-detected collision (honored only when trust allows it)
    ReportCollision { alleged_killer: Option<EntityId> },
    /// Leave the arena
    Leave,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    JoinAccepted(JoinAccepted),
    Death(DeathNotification),
    Snapshot(AoiSnapshot),
    Leaderboard(Leaderboard),
    /// Transient system-wide text
    SystemMessage {
        text: String,
        started_at_ms: u64,
        duration_ms: u64,
    },
}

/// Player input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Desired heading in radians
    pub heading: f32,
    pub boost: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    Player,
    /// Spectator
    Ghost,
}

/// Join request, already authenticated by the session collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub account: Option<AccountId>,
    pub cosmetic: Cosmetic,
    pub mode: JoinMode,
    pub trust: Trust,
}

impl JoinRequest {
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            account: None,
            cosmetic: Cosmetic {
                name: name.into(),
                ..Cosmetic::default()
            },
            mode: JoinMode::Player,
            trust: Trust::default(),
        }
    }

    pub fn ghost(name: impl Into<String>) -> Self {
        Self {
            mode: JoinMode::Ghost,
            ..Self::player(name)
        }
    }

    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }
}

/// World parameters sent on join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    pub width: f32,
    pub height: f32,
    pub shape: MapShape,
    pub collision_radius: f32,
    pub trust_mode: TrustMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAccepted {
    pub entity_id: EntityId,
    pub position: Vec2,
    pub ghost: bool,
    pub world: WorldInfo,
}

/// Sent to the dying human only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathNotification {
    pub cause: DeathCause,
    pub is_kill: bool,
    pub killer_id: Option<EntityId>,
    pub final_size: f32,
}

/// One entity as seen by a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub id: EntityId,
    pub position: Vec2,
    pub heading: f32,
    pub trail: Vec<Vec2>,
    pub capacity: f32,
    pub boosting: bool,
    pub god_mode: bool,
    pub frozen: bool,
    pub is_bot: bool,
    /// Only present on first sight or when it changed
    pub cosmetic: Option<Cosmetic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodView {
    pub id: FoodId,
    pub position: Vec2,
    pub size: f32,
    pub color: u8,
    pub opacity: f32,
    pub exhaust: bool,
}

/// Per-viewer area-of-interest snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AoiSnapshot {
    pub tick: u64,
    pub server_time_ms: u64,
    pub viewer_id: EntityId,
    pub entities: Vec<EntityView>,
    pub food: Vec<FoodView>,
}

impl AoiSnapshot {
    pub fn entity(&self, id: EntityId) -> Option<&EntityView> {
        self.entities.iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub entity_id: EntityId,
    pub name: String,
    pub size: f32,
    pub kills: u32,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

/// Encode a message using bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy()).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_death_notification_json_shape() {
        let death = DeathNotification {
            cause: DeathCause::SelfCollision,
            is_kill: false,
            killer_id: None,
            final_size: 42.0,
        };
        let json = serde_json::to_value(&death).unwrap();
        assert_eq!(json["cause"], "self-collision");
        assert_eq!(json["isKill"], false);
        assert!(json["killerId"].is_null());
        assert_eq!(json["finalSize"], 42.0);
    }

    #[test]
    fn test_snapshot_bincode() {
        let snapshot = ServerMessage::Snapshot(AoiSnapshot {
            tick: 7,
            server_time_ms: 1_000,
            viewer_id: 1,
            entities: vec![EntityView {
                id: 1,
                position: Vec2::new(1.0, 2.0),
                heading: 0.5,
                trail: vec![Vec2::new(0.0, 2.0)],
                capacity: 40.0,
                boosting: false,
                god_mode: true,
                frozen: false,
                is_bot: false,
                cosmetic: Some(Cosmetic {
                    name: "viper".into(),
                    colors: vec!["#ff0000".into()],
                    skin: None,
                }),
            }],
            food: vec![],
        });

        let bytes = encode(&snapshot).unwrap();
        let decoded: ServerMessage = decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_decode_garbage() {
        let result: Result<ClientMessage, _> = decode(&[0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(result.is_err());
    }

    #[test]
    fn test_join_request_builders() {
        let request = JoinRequest::ghost("watcher");
        assert_eq!(request.mode, JoinMode::Ghost);
        assert_eq!(request.cosmetic.name, "watcher");
        assert!(request.account.is_none());
    }
}
