//! Text wire protocol between players and the session server.
//!
//! Every frame is one JSON object tagged by a `type` field. Inbound frames
//! are [`ClientMessage`], outbound frames are [`ServerMessage`].

use crate::{AlertLevel, Direction, Position, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Move,
    StartPick,
    StopPick,
    Sprint,
    Noise,
    Smoke,
    Hack,
    Emp,
    Decoy,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Host,
    HostLocal,
    Join {
        code: String,
    },
    Reconnect {
        code: String,
        role: Role,
    },
    Input {
        action: Action,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        dx: i32,
        #[serde(default)]
        dy: i32,
    },
    Chat {
        text: String,
    },
    Upgrade {
        upgrade_id: String,
        upgrade_role: Role,
    },
    NextLevel,
    Retry,
}

impl ClientMessage {
    /// Decodes one inbound text frame. Malformed frames yield `None`.
    pub fn decode(text: &str) -> Option<ClientMessage> {
        serde_json::from_str(text).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RoomNotFound,
    RoomFull,
    InvalidReconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Hosted {
        code: String,
        role: Role,
        local: bool,
    },
    Joined {
        code: String,
        role: Role,
    },
    Reconnected {
        code: String,
        role: Role,
    },
    Error {
        error: ErrorKind,
    },
    PartnerJoined {
        role: Role,
    },
    PartnerReconnected {
        role: Role,
    },
    PartnerDisconnected {
        role: Role,
    },
    Chat {
        from: Role,
        text: String,
    },
    UpgradeCatalog {
        entries: Vec<UpgradeView>,
        banked_score: u64,
        level_score: u64,
    },
    State(Box<Snapshot>),
    GameComplete {
        total_score: u64,
    },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeView {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub cost: u64,
    pub purchased: bool,
    pub affordable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionLabel {
    Idle,
    Moving,
    Picking,
    Sprinting,
    Throwing,
    Hurt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SoundCue {
    Hurt,
    Alarm,
    Siren,
    Pickup,
    Unlock,
    Door,
    Hack,
    Emp,
    Decoy,
    Noise,
    Smoke,
    Spotted,
    Safe,
    Ping,
    Win,
    Lose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shake {
    pub intensity: f32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThiefView {
    pub position: Position,
    pub hp: u32,
    pub max_hp: u32,
    pub primary_loot: u32,
    pub bonus_loot: u32,
    pub action: ActionLabel,
    pub invulnerable_ms: u64,
    pub picking: bool,
    pub pick_progress_ms: u64,
    pub pick_speed_ms: u64,
    pub sprinting_ms: u64,
    pub sprint_cooldown_ms: u64,
    pub noise_charges: u32,
    pub smoke_charges: u32,
    pub vision_radius: u32,
    pub locks_picked: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneView {
    pub position: Position,
    pub battery: f32,
    pub max_battery: f32,
    pub charging: bool,
    pub hack_cost: f32,
    pub emp_charges: u32,
    pub decoy_charges: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardView {
    pub position: Position,
    pub facing: Direction,
    pub alert_level: AlertLevel,
    pub frozen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub position: Position,
    pub facing: Direction,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorView {
    pub position: Position,
    pub electronic: bool,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootView {
    pub position: Position,
    pub primary: bool,
    pub collected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaserView {
    pub position: Position,
    pub horizontal: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripwireView {
    pub position: Position,
    pub triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeView {
    pub position: Position,
    pub open: bool,
    pub value: u64,
}

/// A short-lived point effect (noise-maker, smoke, decoy, ping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerView {
    pub position: Position,
    pub remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmView {
    pub active: bool,
    pub remaining_ms: u64,
    pub ever_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveView {
    pub id: String,
    pub description: String,
    pub completed: bool,
}

/// Full per-tick state broadcast to every connected slot of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tick: u64,
    pub level: u32,
    pub paused: bool,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
    pub level_score: u64,
    pub banked_score: u64,
    pub grid: Vec<String>,
    pub exit: Position,
    pub exit_unlocked: bool,
    pub primary_loot_total: u32,
    pub thief: ThiefView,
    pub drone: DroneView,
    pub guards: Vec<GuardView>,
    pub cameras: Vec<CameraView>,
    pub doors: Vec<DoorView>,
    pub loot: Vec<LootView>,
    pub lasers: Vec<LaserView>,
    pub tripwires: Vec<TripwireView>,
    pub safes: Vec<SafeView>,
    pub noise_makers: Vec<MarkerView>,
    pub smoke_clouds: Vec<MarkerView>,
    pub decoys: Vec<MarkerView>,
    pub ping: Option<MarkerView>,
    pub alarm: AlarmView,
    pub objectives: Vec<ObjectiveView>,
    pub sounds: Vec<SoundCue>,
    pub shakes: Vec<Shake>,
}
