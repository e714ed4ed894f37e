//! Lookup table from room code to the handle of that room's task.
//!
//! The registry is the only state shared between rooms. It is owned by the
//! gateway and passed explicitly to every room so a room can remove itself
//! when it tears down.

use crate::session::RoomHandle;
use crate::utils::{generate_room_code, normalize_room_code};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedRegistry = Arc<RwLock<RoomRegistry>>;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Fresh code not used by any live room.
    pub fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn insert(&mut self, handle: RoomHandle) {
        debug!("Registering room {}", handle.code());
        self.rooms.insert(handle.code().to_string(), handle);
    }

    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.get(&normalize_room_code(code)).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(&normalize_room_code(code))
    }

    pub fn remove(&mut self, code: &str) -> Option<RoomHandle> {
        self.rooms.remove(&normalize_room_code(code))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
