//! Room lifecycle and the per-room task that owns it.
//!
//! A `Room` is plain state: two role slots, the current `WorldState` and the
//! progression carried across levels. Each room runs in its own task
//! (`run_room`) that owns the `Room` exclusively and serializes every
//! mutation through one `select!` loop: commands from gateways on one side,
//! the fixed tick on the other. A tick therefore never races an intent.

use crate::config::ServerConfig;
use crate::registry::SharedRegistry;
use crate::upgrades::{Loadout, UpgradeLedger};
use crate::utils::truncate_chars;
use crate::world::WorldState;
use log::{debug, info};
use shared::{Action, ClientMessage, ErrorKind, Outcome, Role, ServerMessage, CHAT_MAX_LEN};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};

pub type ConnectionId = u64;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("no room with that code")]
    RoomNotFound,
    #[error("room already has two players")]
    RoomFull,
    #[error("no such slot to reconnect to")]
    InvalidReconnect,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::RoomNotFound => ErrorKind::RoomNotFound,
            SessionError::RoomFull => ErrorKind::RoomFull,
            SessionError::InvalidReconnect => ErrorKind::InvalidReconnect,
        }
    }
}

/// Outbound half of one player connection. Sends never block and a closed
/// socket only costs a debug line.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, tx }
    }

    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropped message for closed connection {}", self.id);
                false
            }
        }
    }
}

#[derive(Debug)]
struct Slot {
    connection: Connection,
    connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Waiting for the second player. No world yet.
    Created,
    Active,
    /// A slot dropped. Ticks still broadcast but the world is frozen.
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Abandoned,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Running,
    TearDown(TeardownReason),
}

#[derive(Debug)]
pub struct Room {
    code: String,
    local: bool,
    slots: [Option<Slot>; 2],
    world: Option<WorldState>,
    level: u32,
    banked_score: u64,
    loadout: Loadout,
    ledger: UpgradeLedger,
    max_level: u32,
    grace_ms: u64,
    abandoned_ms: Option<u64>,
    tick: u64,
}

impl Room {
    /// Creates a room with the host in the thief slot. A local room puts the
    /// same connection in both slots and starts playing right away.
    pub fn host(code: String, host: Connection, local: bool, config: &ServerConfig) -> Self {
        host.send(ServerMessage::Hosted {
            code: code.clone(),
            role: Role::Thief,
            local,
        });
        let drone = local.then(|| Slot {
            connection: host.clone(),
            connected: true,
        });
        let loadout = Loadout::default();
        let world = local.then(|| WorldState::from_level(1, &loadout));
        info!("Room {} created (local: {})", code, local);

        Self {
            code,
            local,
            slots: [
                Some(Slot {
                    connection: host,
                    connected: true,
                }),
                drone,
            ],
            world,
            level: 1,
            banked_score: 0,
            loadout,
            ledger: UpgradeLedger::new(),
            max_level: config.max_level.max(1),
            grace_ms: config.grace_ms(),
            abandoned_ms: None,
            tick: 0,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn banked_score(&self) -> u64 {
        self.banked_score
    }

    pub fn world(&self) -> Option<&WorldState> {
        self.world.as_ref()
    }

    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    pub fn phase(&self) -> RoomPhase {
        if self.world.is_none() {
            RoomPhase::Created
        } else if self.slots.iter().flatten().any(|s| !s.connected) {
            RoomPhase::Paused
        } else {
            RoomPhase::Active
        }
    }

    pub fn is_paused(&self) -> bool {
        self.phase() == RoomPhase::Paused
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.connected).count()
    }

    /// The remote player always takes the drone slot.
    pub fn join(&mut self, connection: Connection) -> Result<Role, SessionError> {
        if self.local || self.slots[Role::Drone.slot_index()].is_some() {
            return Err(SessionError::RoomFull);
        }
        connection.send(ServerMessage::Joined {
            code: self.code.clone(),
            role: Role::Drone,
        });
        self.slots[Role::Drone.slot_index()] = Some(Slot {
            connection,
            connected: true,
        });
        self.abandoned_ms = None;
        self.notify(Role::Thief, ServerMessage::PartnerJoined { role: Role::Drone });
        self.world = Some(WorldState::from_level(self.level, &self.loadout));
        info!("Room {}: drone joined, level {} started", self.code, self.level);
        Ok(Role::Drone)
    }

    /// Rebinds an existing slot to a new connection. Never touches the world.
    pub fn reconnect(&mut self, connection: Connection, role: Role) -> Result<(), SessionError> {
        if self.slots[role.slot_index()].is_none() {
            return Err(SessionError::InvalidReconnect);
        }
        let rebind: Vec<usize> = if self.local {
            vec![0, 1]
        } else {
            vec![role.slot_index()]
        };
        for index in rebind {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.connection = connection.clone();
                slot.connected = true;
            }
        }
        self.abandoned_ms = None;

        connection.send(ServerMessage::Reconnected {
            code: self.code.clone(),
            role,
        });
        if !self.local {
            self.notify(role.partner(), ServerMessage::PartnerReconnected { role });
        }
        info!("Room {}: {:?} reconnected", self.code, role);
        Ok(())
    }

    /// Marks every slot held by `connection_id` as disconnected.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Role> {
        let mut dropped = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(slot) = slot {
                if slot.connected && slot.connection.id() == connection_id {
                    slot.connected = false;
                    dropped.push(if index == 0 { Role::Thief } else { Role::Drone });
                }
            }
        }
        for role in &dropped {
            info!("Room {}: {:?} disconnected", self.code, role);
            self.notify(role.partner(), ServerMessage::PartnerDisconnected { role: *role });
        }
        if self.connected_count() == 0 && self.abandoned_ms.is_none() {
            info!("Room {} is empty, tearing down in {}ms", self.code, self.grace_ms);
            self.abandoned_ms = Some(0);
        }
        dropped
    }

    fn roles_of(&self, connection_id: ConnectionId) -> Vec<Role> {
        [Role::Thief, Role::Drone]
            .into_iter()
            .filter(|role| {
                self.slots[role.slot_index()]
                    .as_ref()
                    .map_or(false, |s| s.connected && s.connection.id() == connection_id)
            })
            .collect()
    }

    pub fn handle_message(&mut self, connection_id: ConnectionId, message: ClientMessage) -> RoomStatus {
        let roles = self.roles_of(connection_id);
        let Some(&sender) = roles.first() else {
            debug!("Room {}: message from unbound connection {}", self.code, connection_id);
            return RoomStatus::Running;
        };

        match message {
            ClientMessage::Input {
                action,
                role,
                dx,
                dy,
            } => {
                let role = if self.local { role } else { Some(sender) };
                if let Some(role) = role {
                    self.apply_input(role, action, dx, dy);
                }
            }
            ClientMessage::Chat { text } => {
                let text = truncate_chars(&text, CHAT_MAX_LEN);
                self.broadcast(ServerMessage::Chat { from: sender, text });
            }
            ClientMessage::Upgrade {
                upgrade_id,
                upgrade_role,
            } => self.purchase(&upgrade_id, upgrade_role),
            ClientMessage::NextLevel => return self.next_level(),
            ClientMessage::Retry => self.retry(),
            ClientMessage::Host
            | ClientMessage::HostLocal
            | ClientMessage::Join { .. }
            | ClientMessage::Reconnect { .. } => {}
        }
        RoomStatus::Running
    }

    fn apply_input(&mut self, role: Role, action: Action, dx: i32, dy: i32) {
        if self.is_paused() {
            return;
        }
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let was_playing = !world.is_over();
        let applied = match role {
            Role::Thief => world.apply_thief(action, dx, dy),
            Role::Drone => world.apply_drone(action, dx, dy),
        };
        if !applied {
            debug!("Room {}: {:?} {:?} rejected", self.code, role, action);
        }
        if was_playing && world.outcome == Outcome::Won {
            self.broadcast_catalog();
        }
    }

    fn available_score(&self) -> u64 {
        self.banked_score + self.world.as_ref().map_or(0, |w| w.level_score)
    }

    fn won(&self) -> bool {
        self.world
            .as_ref()
            .map_or(false, |w| w.outcome == Outcome::Won)
    }

    fn purchase(&mut self, id: &str, role: Role) {
        if !self.won() {
            return;
        }
        let available = self.available_score();
        let Some(entry) = self.ledger.purchase(id, role, available) else {
            return;
        };
        if let Some(world) = self.world.as_mut() {
            let from_level = entry.cost.min(world.level_score);
            world.level_score -= from_level;
            self.banked_score -= entry.cost - from_level;
        }
        self.loadout.apply(entry.effect);
        info!("Room {}: bought {} for {}", self.code, entry.id, entry.cost);
        self.broadcast_catalog();
    }

    fn next_level(&mut self) -> RoomStatus {
        if self.is_paused() || !self.won() {
            return RoomStatus::Running;
        }
        self.banked_score += self.world.as_ref().map_or(0, |w| w.level_score);
        self.level += 1;

        if self.level > self.max_level {
            info!("Room {} finished the run with {}", self.code, self.banked_score);
            self.broadcast(ServerMessage::GameComplete {
                total_score: self.banked_score,
            });
            return RoomStatus::TearDown(TeardownReason::Completed);
        }

        self.world = Some(WorldState::from_level(self.level, &self.loadout));
        info!("Room {}: level {} started", self.code, self.level);
        RoomStatus::Running
    }

    fn retry(&mut self) {
        let lost = self
            .world
            .as_ref()
            .map_or(false, |w| w.outcome == Outcome::Lost);
        if self.is_paused() || !lost {
            return;
        }
        self.level = 1;
        self.banked_score = 0;
        self.loadout = Loadout::default();
        self.ledger.clear();
        self.world = Some(WorldState::from_level(1, &self.loadout));
        info!("Room {}: run restarted", self.code);
    }

    /// One fixed step: advance unless paused, then broadcast the snapshot.
    pub fn tick(&mut self, dt_ms: u64) -> RoomStatus {
        if let Some(idle) = self.abandoned_ms.as_mut() {
            *idle += dt_ms;
            if *idle >= self.grace_ms {
                return RoomStatus::TearDown(TeardownReason::Abandoned);
            }
            return RoomStatus::Running;
        }

        self.tick += 1;
        let paused = self.is_paused();
        let banked = self.banked_score;
        let tick = self.tick;
        let Some(world) = self.world.as_mut() else {
            return RoomStatus::Running;
        };
        if !paused {
            world.advance(dt_ms);
        }
        let snapshot = world.snapshot(tick, paused, banked);
        self.broadcast(ServerMessage::State(Box::new(snapshot)));

        if self.tick % 200 == 0 {
            debug!(
                "Room {} tick {}: level {}, {} connected",
                self.code,
                self.tick,
                self.level,
                self.connected_count()
            );
        }
        RoomStatus::Running
    }

    fn notify(&self, role: Role, message: ServerMessage) {
        if let Some(slot) = &self.slots[role.slot_index()] {
            if slot.connected {
                slot.connection.send(message);
            }
        }
    }

    /// Sends once per connected connection; a local room shares one.
    fn broadcast(&self, message: ServerMessage) {
        let mut sent: Vec<ConnectionId> = Vec::with_capacity(2);
        for slot in self.slots.iter().flatten() {
            if slot.connected && !sent.contains(&slot.connection.id()) {
                sent.push(slot.connection.id());
                slot.connection.send(message.clone());
            }
        }
    }

    fn broadcast_catalog(&self) {
        let available = self.available_score();
        self.broadcast(ServerMessage::UpgradeCatalog {
            entries: self.ledger.catalog_view(available),
            banked_score: self.banked_score,
            level_score: self.world.as_ref().map_or(0, |w| w.level_score),
        });
    }

    fn handle_command(&mut self, command: RoomCommand) -> RoomStatus {
        match command {
            RoomCommand::Join { connection, reply } => {
                let _ = reply.send(self.join(connection));
            }
            RoomCommand::Reconnect {
                connection,
                role,
                reply,
            } => {
                let _ = reply.send(self.reconnect(connection, role));
            }
            RoomCommand::Message {
                connection_id,
                message,
            } => return self.handle_message(connection_id, message),
            RoomCommand::Disconnect { connection_id } => {
                self.disconnect(connection_id);
            }
        }
        RoomStatus::Running
    }
}

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        connection: Connection,
        reply: oneshot::Sender<Result<Role, SessionError>>,
    },
    Reconnect {
        connection: Connection,
        role: Role,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Message {
        connection_id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
}

/// Cloneable address of a running room. Once the room task exits every call
/// fails as if the room never existed.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: String,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn new(code: String, tx: mpsc::UnboundedSender<RoomCommand>) -> Self {
        Self { code, tx }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(&self, connection: Connection) -> Result<Role, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RoomCommand::Join { connection, reply })
            .map_err(|_| SessionError::RoomNotFound)?;
        response.await.map_err(|_| SessionError::RoomNotFound)?
    }

    pub async fn reconnect(&self, connection: Connection, role: Role) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RoomCommand::Reconnect {
                connection,
                role,
                reply,
            })
            .map_err(|_| SessionError::RoomNotFound)?;
        response.await.map_err(|_| SessionError::RoomNotFound)?
    }

    pub fn send(&self, connection_id: ConnectionId, message: ClientMessage) -> bool {
        self.tx
            .send(RoomCommand::Message {
                connection_id,
                message,
            })
            .is_ok()
    }

    pub fn disconnect(&self, connection_id: ConnectionId) {
        let _ = self.tx.send(RoomCommand::Disconnect { connection_id });
    }
}

/// Registers a new room, announces it to the host and starts its task.
pub async fn spawn_room(
    registry: &SharedRegistry,
    config: &ServerConfig,
    host: Connection,
    local: bool,
) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = {
        let mut rooms = registry.write().await;
        let handle = RoomHandle::new(rooms.generate_code(), tx);
        rooms.insert(handle.clone());
        handle
    };
    let room = Room::host(handle.code().to_string(), host, local, config);
    tokio::spawn(run_room(
        room,
        rx,
        Arc::clone(registry),
        config.tick_interval,
    ));
    handle
}

/// Owns one room until it tears down, then removes it from the registry.
pub async fn run_room(
    mut room: Room,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    registry: SharedRegistry,
    tick_interval: Duration,
) {
    let dt_ms = (tick_interval.as_millis() as u64).max(1);
    let mut ticker = interval(Duration::from_millis(dt_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    ticker.tick().await;

    let reason = loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break TeardownReason::Abandoned;
                };
                if let RoomStatus::TearDown(reason) = room.handle_command(command) {
                    break reason;
                }
            },
            _ = ticker.tick() => {
                if let RoomStatus::TearDown(reason) = room.tick(dt_ms) {
                    break reason;
                }
            },
        }
    };

    registry.write().await.remove(room.code());
    info!("Room {} torn down ({:?})", room.code(), reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoomRegistry;
    use shared::{Position, Snapshot, SoundCue, THIEF_MAX_HP};

    fn config() -> ServerConfig {
        ServerConfig {
            grace_period: Duration::from_secs(2),
            max_level: 2,
            ..ServerConfig::default()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    fn last_state(messages: &[ServerMessage]) -> Option<&Snapshot> {
        messages.iter().rev().find_map(|m| match m {
            ServerMessage::State(snapshot) => Some(snapshot.as_ref()),
            _ => None,
        })
    }

    fn pair() -> (
        Room,
        mpsc::UnboundedReceiver<ServerMessage>,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let (host, host_rx) = Connection::channel(1);
        let (guest, guest_rx) = Connection::channel(2);
        let mut room = Room::host("ROOM".to_string(), host, false, &config());
        assert_eq!(room.join(guest), Ok(Role::Drone));
        (room, host_rx, guest_rx)
    }

    /// Moves the thief one step in whichever direction is open.
    fn nudge_thief(room: &mut Room) -> Option<Position> {
        let start = room.world()?.thief.position;
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            room.handle_message(
                1,
                ClientMessage::Input {
                    action: Action::Move,
                    role: None,
                    dx,
                    dy,
                },
            );
            let now = room.world()?.thief.position;
            if now != start {
                return Some(now);
            }
        }
        None
    }

    fn force_win(room: &mut Room, score: u64) {
        if let Some(world) = room.world.as_mut() {
            world.outcome = Outcome::Won;
            world.level_score = score;
        }
    }

    #[test]
    fn test_host_then_join() {
        let (host, mut host_rx) = Connection::channel(1);
        let mut room = Room::host("ABCD".to_string(), host, false, &config());
        assert_eq!(room.phase(), RoomPhase::Created);
        assert!(matches!(
            drain(&mut host_rx).as_slice(),
            [ServerMessage::Hosted { local: false, role: Role::Thief, .. }]
        ));

        let (guest, mut guest_rx) = Connection::channel(2);
        assert_eq!(room.join(guest), Ok(Role::Drone));
        assert_eq!(room.phase(), RoomPhase::Active);
        assert!(matches!(
            drain(&mut guest_rx).as_slice(),
            [ServerMessage::Joined { role: Role::Drone, .. }]
        ));
        assert_eq!(
            drain(&mut host_rx),
            vec![ServerMessage::PartnerJoined { role: Role::Drone }]
        );

        let (third, _) = Connection::channel(3);
        assert_eq!(room.join(third), Err(SessionError::RoomFull));
    }

    #[test]
    fn test_local_room_starts_immediately_and_is_full() {
        let (host, mut rx) = Connection::channel(1);
        let mut room = Room::host("LOCL".to_string(), host, true, &config());
        assert_eq!(room.phase(), RoomPhase::Active);
        let (guest, _) = Connection::channel(2);
        assert_eq!(room.join(guest), Err(SessionError::RoomFull));

        drain(&mut rx);
        room.tick(50);
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1, "one snapshot per connection");
    }

    #[test]
    fn test_local_input_needs_explicit_role() {
        let (host, _rx) = Connection::channel(1);
        let mut room = Room::host("LOCL".to_string(), host, true, &config());
        let start = room.world().map(|w| w.drone.position);
        let input = |role| ClientMessage::Input {
            action: Action::Ping,
            role,
            dx: 0,
            dy: 0,
        };
        room.handle_message(1, input(None));
        assert!(room.world().and_then(|w| w.ping.as_ref()).is_none());
        room.handle_message(1, input(Some(Role::Drone)));
        assert!(room.world().and_then(|w| w.ping.as_ref()).is_some());
        assert_eq!(room.world().map(|w| w.drone.position), start);
    }

    #[test]
    fn test_remote_role_comes_from_slot() {
        let (mut room, _host_rx, _guest_rx) = pair();
        room.handle_message(
            2,
            ClientMessage::Input {
                action: Action::Ping,
                role: Some(Role::Thief),
                dx: 0,
                dy: 0,
            },
        );
        assert!(room.world().and_then(|w| w.ping.as_ref()).is_some());
    }

    #[test]
    fn test_disconnect_pauses_and_reconnect_resumes() {
        let (mut room, mut host_rx, _guest_rx) = pair();
        for _ in 0..5 {
            room.tick(50);
        }
        let before = nudge_thief(&mut room);
        assert!(before.is_some());
        let elapsed = room.world().map(|w| w.elapsed_ms);

        assert_eq!(room.disconnect(2), vec![Role::Drone]);
        assert_eq!(room.phase(), RoomPhase::Paused);
        assert!(drain(&mut host_rx).contains(&ServerMessage::PartnerDisconnected { role: Role::Drone }));

        for _ in 0..10 {
            room.tick(50);
        }
        let messages = drain(&mut host_rx);
        let snapshot = last_state(&messages).expect("paused rooms still broadcast");
        assert!(snapshot.paused);
        assert_eq!(room.world().map(|w| w.elapsed_ms), elapsed);
        assert_eq!(nudge_thief(&mut room), None);

        let (back, mut back_rx) = Connection::channel(7);
        assert_eq!(room.reconnect(back, Role::Drone), Ok(()));
        assert_eq!(room.phase(), RoomPhase::Active);
        assert!(matches!(
            drain(&mut back_rx).as_slice(),
            [ServerMessage::Reconnected { role: Role::Drone, .. }]
        ));
        assert!(drain(&mut host_rx).contains(&ServerMessage::PartnerReconnected { role: Role::Drone }));
        assert_eq!(room.world().map(|w| w.thief.position), before);
        assert_eq!(room.world().map(|w| w.thief.hp), Some(THIEF_MAX_HP));

        room.tick(50);
        assert_eq!(room.world().map(|w| w.elapsed_ms), elapsed.map(|e| e + 50));
        assert!(last_state(&drain(&mut back_rx)).is_some());
    }

    #[test]
    fn test_reconnect_to_missing_slot() {
        let (host, _rx) = Connection::channel(1);
        let mut room = Room::host("ABCD".to_string(), host, false, &config());
        let (guest, _) = Connection::channel(2);
        assert_eq!(
            room.reconnect(guest, Role::Drone),
            Err(SessionError::InvalidReconnect)
        );
    }

    #[test]
    fn test_grace_period_teardown() {
        let (mut room, _host_rx, _guest_rx) = pair();
        room.disconnect(1);
        assert_eq!(room.tick(1_000), RoomStatus::Running);
        room.disconnect(2);
        assert_eq!(room.connected_count(), 0);
        assert_eq!(room.tick(1_000), RoomStatus::Running);
        assert_eq!(
            room.tick(1_000),
            RoomStatus::TearDown(TeardownReason::Abandoned)
        );
    }

    #[test]
    fn test_reconnect_cancels_teardown() {
        let (mut room, _host_rx, _guest_rx) = pair();
        room.disconnect(1);
        room.disconnect(2);
        room.tick(1_500);
        let (back, _back_rx) = Connection::channel(9);
        room.reconnect(back, Role::Thief).unwrap();
        for _ in 0..100 {
            assert_eq!(room.tick(50), RoomStatus::Running);
        }
    }

    #[test]
    fn test_join_after_host_left_cancels_teardown() {
        let (host, _host_rx) = Connection::channel(1);
        let mut room = Room::host("ABCD".to_string(), host, false, &config());
        room.disconnect(1);
        assert_eq!(room.connected_count(), 0);

        let (guest, mut guest_rx) = Connection::channel(2);
        assert_eq!(room.join(guest), Ok(Role::Drone));
        for _ in 0..60 {
            assert_eq!(room.tick(50), RoomStatus::Running);
        }
        let states = drain(&mut guest_rx)
            .iter()
            .filter(|m| matches!(m, ServerMessage::State(_)))
            .count();
        assert_eq!(states, 60);
    }

    #[test]
    fn test_paused_room_ignores_next_level_and_retry() {
        let (mut room, _host_rx, _guest_rx) = pair();
        force_win(&mut room, 2_000);
        room.disconnect(2);
        assert!(room.is_paused());
        assert_eq!(room.handle_message(1, ClientMessage::NextLevel), RoomStatus::Running);
        assert_eq!(room.level(), 1);
        assert_eq!(room.banked_score(), 0);
        assert_eq!(room.world().map(|w| w.outcome), Some(Outcome::Won));

        if let Some(world) = room.world.as_mut() {
            world.outcome = Outcome::Lost;
        }
        room.handle_message(1, ClientMessage::Retry);
        assert_eq!(room.world().map(|w| w.outcome), Some(Outcome::Lost));

        let (back, _back_rx) = Connection::channel(3);
        room.reconnect(back, Role::Drone).unwrap();
        room.handle_message(1, ClientMessage::Retry);
        assert_eq!(room.world().map(|w| w.outcome), Some(Outcome::Playing));
    }

    #[test]
    fn test_chat_is_capped_and_tagged() {
        let (mut room, mut host_rx, mut guest_rx) = pair();
        drain(&mut host_rx);
        room.handle_message(2, ClientMessage::Chat { text: "x".repeat(500) });
        let expected = ServerMessage::Chat {
            from: Role::Drone,
            text: "x".repeat(CHAT_MAX_LEN),
        };
        assert_eq!(drain(&mut host_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut guest_rx).last(), Some(&expected));
    }

    #[test]
    fn test_out_of_turn_requests_are_ignored() {
        let (mut room, _host_rx, _guest_rx) = pair();
        assert_eq!(room.handle_message(1, ClientMessage::NextLevel), RoomStatus::Running);
        assert_eq!(room.level(), 1);
        room.handle_message(
            1,
            ClientMessage::Upgrade {
                upgrade_id: "thief_health".to_string(),
                upgrade_role: Role::Thief,
            },
        );
        assert_eq!(room.loadout(), &Loadout::default());
        room.handle_message(1, ClientMessage::Retry);
        assert_eq!(room.world().map(|w| w.outcome), Some(Outcome::Playing));
    }

    #[test]
    fn test_upgrade_spends_level_score_first() {
        let (mut room, mut host_rx, _guest_rx) = pair();
        room.banked_score = 1_000;
        force_win(&mut room, 1_500);
        room.handle_message(
            1,
            ClientMessage::Upgrade {
                upgrade_id: "thief_health".to_string(),
                upgrade_role: Role::Thief,
            },
        );
        assert_eq!(room.loadout().max_hp, THIEF_MAX_HP + 1);
        assert_eq!(room.world().map(|w| w.level_score), Some(0));
        assert_eq!(room.banked_score(), 500);
        let catalog = drain(&mut host_rx)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::UpgradeCatalog { entries, .. } => Some(entries),
                _ => None,
            })
            .expect("catalog broadcast after purchase");
        assert!(catalog.iter().any(|e| e.id == "thief_health" && e.purchased));

        room.handle_message(
            1,
            ClientMessage::Upgrade {
                upgrade_id: "thief_health".to_string(),
                upgrade_role: Role::Thief,
            },
        );
        assert_eq!(room.loadout().max_hp, THIEF_MAX_HP + 1);
        assert_eq!(room.banked_score(), 500);
    }

    #[test]
    fn test_next_level_carries_progression() {
        let (mut room, _host_rx, _guest_rx) = pair();
        room.loadout.apply(crate::upgrades::UpgradeEffect::MaxHp(1));
        force_win(&mut room, 4_000);
        assert_eq!(room.handle_message(2, ClientMessage::NextLevel), RoomStatus::Running);
        assert_eq!(room.level(), 2);
        assert_eq!(room.banked_score(), 4_000);
        let world = room.world().unwrap();
        assert_eq!(world.level, 2);
        assert_eq!(world.thief.max_hp, THIEF_MAX_HP + 1);
        assert_eq!(world.level_score, 0);
    }

    #[test]
    fn test_final_level_completes_game() {
        let (mut room, mut host_rx, mut guest_rx) = pair();
        force_win(&mut room, 1_000);
        room.handle_message(1, ClientMessage::NextLevel);
        force_win(&mut room, 2_000);
        drain(&mut host_rx);
        drain(&mut guest_rx);
        assert_eq!(
            room.handle_message(1, ClientMessage::NextLevel),
            RoomStatus::TearDown(TeardownReason::Completed)
        );
        let done = ServerMessage::GameComplete { total_score: 3_000 };
        assert_eq!(drain(&mut host_rx), vec![done.clone()]);
        assert_eq!(drain(&mut guest_rx), vec![done]);
    }

    #[test]
    fn test_retry_resets_run() {
        let (mut room, _host_rx, _guest_rx) = pair();
        force_win(&mut room, 3_000);
        room.handle_message(1, ClientMessage::NextLevel);
        room.handle_message(1, ClientMessage::Retry);
        assert_eq!(room.level(), 2);
        if let Some(world) = room.world.as_mut() {
            world.outcome = Outcome::Lost;
        }
        room.handle_message(1, ClientMessage::Retry);
        assert_eq!(room.level(), 1);
        assert_eq!(room.banked_score(), 0);
        assert_eq!(room.world().map(|w| w.outcome), Some(Outcome::Playing));
    }

    #[test]
    fn test_snapshot_events_delivered_once() {
        let (mut room, mut host_rx, _guest_rx) = pair();
        room.handle_message(
            2,
            ClientMessage::Input {
                action: Action::Ping,
                role: None,
                dx: 0,
                dy: 0,
            },
        );
        room.tick(50);
        room.tick(50);
        let messages = drain(&mut host_rx);
        let states: Vec<&Snapshot> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::State(s) => Some(s.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(states.len(), 2);
        assert!(states[0].sounds.contains(&SoundCue::Ping));
        assert!(!states[1].sounds.contains(&SoundCue::Ping));
        assert_eq!(states[1].tick, states[0].tick + 1);
    }

    #[test]
    fn test_session_error_kinds() {
        assert_eq!(SessionError::RoomFull.kind(), ErrorKind::RoomFull);
        assert_eq!(SessionError::RoomNotFound.to_string(), "no room with that code");
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_task_ticks_and_removes_itself() {
        let registry = RoomRegistry::shared();
        let (host, mut host_rx) = Connection::channel(1);
        let handle = spawn_room(&registry, &config(), host, false).await;
        assert!(registry.read().await.contains(handle.code()));

        let (guest, mut guest_rx) = Connection::channel(2);
        assert_eq!(handle.join(guest).await, Ok(Role::Drone));
        let (late, _) = Connection::channel(3);
        assert_eq!(handle.join(late).await, Err(SessionError::RoomFull));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let states = drain(&mut guest_rx)
            .iter()
            .filter(|m| matches!(m, ServerMessage::State(_)))
            .count();
        assert!(states >= 8, "got {} snapshots", states);
        drain(&mut host_rx);

        handle.disconnect(1);
        handle.disconnect(2);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(registry.read().await.is_empty());
        assert!(handle.is_closed());
        let (again, _) = Connection::channel(4);
        assert_eq!(handle.join(again).await, Err(SessionError::RoomNotFound));
    }
}
