//! # Heist Server Library
//!
//! Authoritative server for a two-player cooperative stealth game. One
//! player is the Thief moving through a guarded building, the other is the
//! Drone supporting from above. The server owns every rule; clients only
//! send intents and render the snapshots they receive.
//!
//! ## Architecture
//!
//! ### One task per room
//! Each room runs in its own task that exclusively owns the room's state.
//! Player intents and the fixed simulation tick are serialized through a
//! single `select!` loop, so a room never needs a lock around its world.
//! The only shared structure is the room registry mapping codes to rooms.
//!
//! ### Text protocol over WebSocket
//! Every frame is a JSON object tagged by `type` (see `shared::protocol`).
//! Each connection has a reader loop and a writer task, so a slow socket
//! never stalls a room.
//!
//! ## Module Organization
//!
//! - `level`: procedural floor plans and spawn lists
//! - `world`: the entities of one level and the snapshot view of them
//! - `game`: player actions and the per-tick simulation step
//! - `guard_ai`: guard perception, alert escalation and movement, cameras
//! - `objectives`: optional per-level challenges
//! - `upgrades`: the upgrade catalog and the loadout it produces
//! - `session`: rooms, slots, progression and the room task
//! - `registry`: code to room lookup
//! - `network`: the WebSocket gateway
//! - `config`, `utils`: settings and small helpers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::network::BoxError> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod game;
pub mod guard_ai;
pub mod level;
pub mod network;
pub mod objectives;
pub mod registry;
pub mod session;
pub mod upgrades;
pub mod utils;
pub mod world;
