//! WebSocket gateway: accepts player connections, decodes their frames and
//! routes them to the room they belong to.
//!
//! Every connection gets a reader loop (this task) and a writer task fed by
//! an unbounded channel, so a room never waits on a slow socket.

use crate::config::ServerConfig;
use crate::registry::{RoomRegistry, SharedRegistry};
use crate::session::{spawn_room, Connection, ConnectionId, RoomHandle, SessionError};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Listening socket plus the room registry it feeds.
pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry: RoomRegistry::shared(),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Accept loop. Each connection is served on its own task.
    pub async fn run(self) -> Result<(), BoxError> {
        let mut next_id: ConnectionId = 1;
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let id = next_id;
            next_id += 1;

            let registry = Arc::clone(&self.registry);
            let config = self.config.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, id, registry, config).await {
                    warn!("Connection {} from {} failed: {}", id, peer, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    registry: SharedRegistry,
    config: ServerConfig,
) -> Result<(), BoxError> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    info!("Connection {} opened from {}", id, peer);

    let (mut sink, mut frames) = socket.split();
    let (connection, mut outbound) = Connection::channel(id);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!("Send to connection {} failed: {}", id, e);
                break;
            }
        }
    });

    let mut gateway = Gateway::new(connection, registry, config);
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => gateway.handle_text(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} read error: {}", id, e);
                break;
            }
        }
    }

    gateway.disconnect();
    writer.abort();
    info!("Connection {} closed", id);
    Ok(())
}

/// Per-connection protocol state: which room, if any, this socket is bound to.
pub struct Gateway {
    connection: Connection,
    registry: SharedRegistry,
    config: ServerConfig,
    room: Option<RoomHandle>,
}

impl Gateway {
    pub fn new(connection: Connection, registry: SharedRegistry, config: ServerConfig) -> Self {
        Self {
            connection,
            registry,
            config,
            room: None,
        }
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room.as_ref().map(|r| r.code())
    }

    /// Malformed frames are dropped without a reply.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientMessage::decode(text) {
            Some(message) => self.handle_message(message).await,
            None => debug!(
                "Connection {}: discarded malformed frame",
                self.connection.id()
            ),
        }
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Host => self.host(false).await,
            ClientMessage::HostLocal => self.host(true).await,
            ClientMessage::Join { code } => {
                let Some(handle) = self.lookup(&code).await else {
                    return;
                };
                match handle.join(self.connection.clone()).await {
                    Ok(_) => self.bind(handle),
                    Err(e) => self.reject(e),
                }
            }
            ClientMessage::Reconnect { code, role } => {
                let Some(handle) = self.lookup(&code).await else {
                    return;
                };
                match handle.reconnect(self.connection.clone(), role).await {
                    Ok(()) => self.bind(handle),
                    Err(e) => self.reject(e),
                }
            }
            other => match &self.room {
                Some(room) => {
                    if !room.send(self.connection.id(), other) {
                        debug!("Room {} is gone", room.code());
                        self.room = None;
                    }
                }
                None => debug!(
                    "Connection {}: gameplay message outside a room",
                    self.connection.id()
                ),
            },
        }
    }

    /// Leaves the current room. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(room) = self.room.take() {
            room.disconnect(self.connection.id());
        }
    }

    async fn host(&mut self, local: bool) {
        self.disconnect();
        let handle = spawn_room(
            &self.registry,
            &self.config,
            self.connection.clone(),
            local,
        )
        .await;
        self.room = Some(handle);
    }

    async fn lookup(&self, code: &str) -> Option<RoomHandle> {
        let handle = self.registry.read().await.get(code);
        if handle.is_none() {
            self.reject(SessionError::RoomNotFound);
        }
        handle
    }

    fn bind(&mut self, handle: RoomHandle) {
        let same_room = self.room_code() == Some(handle.code());
        if !same_room {
            self.disconnect();
        }
        self.room = Some(handle);
    }

    fn reject(&self, error: SessionError) {
        info!(
            "Connection {}: request rejected ({})",
            self.connection.id(),
            error
        );
        self.connection
            .send(ServerMessage::Error { error: error.kind() });
    }
}
