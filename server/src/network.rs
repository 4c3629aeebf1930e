//! Server network layer handling TCP connections and the world mutation loop

use crate::client_manager::{ClientManager, OUTBOUND_QUEUE_CAPACITY};
use crate::game::GameState;
use crate::store::WorldStore;
use log::{debug, error, info, warn};
use shared::codec::{encode, read_packet, write_packet, CodecError};
use shared::{Packet, PlacePolicy, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

/// How often the server logs a status line.
const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// How long a turned-away connection is kept open for the peer to read why.
const REJECT_LINGER: Duration = Duration::from_secs(1);

/// Deployment settings for a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerConfig {
    pub map_size: usize,
    pub max_clients: usize,
    pub place_policy: PlacePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            map_size: shared::MAP_SIZE,
            max_clients: 32,
            place_policy: PlacePolicy::default(),
        }
    }
}

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        client_id: u32,
        packet: Packet,
    },
    ConnectionClosed {
        client_id: u32,
    },
}

/// Authoritative world server.
///
/// All state lives in the task running [`Server::run`]. Network tasks only
/// move bytes and talk to it over a channel, so edits, pose updates and the
/// broadcasts they trigger happen one at a time in arrival order.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    game_state: GameState,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener and restores the world from `store`.
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
        store: Box<dyn WorldStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let game_state = GameState::load(config.map_size, config.place_policy, store)?;

        // Every client gets the full world on join, so it must fit in a frame
        encode(&Packet::WorldSnapshot {
            blocks: game_state.snapshot(),
        })?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} ({}x{} map, {:?} placement)",
            local_addr,
            config.map_size,
            config.map_size,
            game_state.policy()
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            config,
            clients: ClientManager::new(config.max_clients),
            game_state,
            server_tx,
            server_rx,
        })
    }

    /// Builds a server without a listener, for driving the loop by hand.
    #[cfg(test)]
    fn detached(
        config: ServerConfig,
        store: Box<dyn WorldStore>,
    ) -> Result<Self, crate::store::StoreError> {
        let game_state = GameState::load(config.map_size, config.place_policy, store)?;
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        Ok(Server {
            listener: None,
            local_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            config,
            clients: ClientManager::new(config.max_clients),
            game_state,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that forwards every frame from one connection
    fn spawn_reader(&self, client_id: u32, mut reader: OwnedReadHalf) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(packet) => {
                        let goodbye = packet == Packet::Disconnect;
                        if server_tx
                            .send(ServerMessage::PacketReceived { client_id, packet })
                            .is_err()
                        {
                            return;
                        }
                        if goodbye {
                            break;
                        }
                    }
                    Err(e) if e.is_closed() => {
                        debug!("Client {} closed the connection", client_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Dropping client {}: {}", client_id, e);
                        break;
                    }
                }
            }
            let _ = server_tx.send(ServerMessage::ConnectionClosed { client_id });
        });
    }

    /// Spawns task that drains one connection's outbound queue. The task
    /// ends once the queue is dropped and empty, or the peer stops reading.
    fn spawn_writer(
        client_id: u32,
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::Receiver<Arc<Packet>>,
    ) {
        tokio::spawn(async move {
            while let Some(packet) = outbound.recv().await {
                match write_packet(&mut writer, &packet).await {
                    Ok(()) => {}
                    Err(e @ CodecError::FrameTooLarge(_)) => {
                        warn!("Cannot send {} to client {}: {}", packet.kind(), client_id, e);
                        break;
                    }
                    Err(e) => {
                        debug!("Failed to send {} to client {}: {}", packet.kind(), client_id, e);
                        break;
                    }
                }
            }
            let _ = writer.shutdown().await;
        });
    }

    /// Registers a new connection, or turns it away when the server is full.
    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        match self.clients.add_client(addr, outbound_tx) {
            Some(client_id) => {
                let (reader, writer) = stream.into_split();
                self.spawn_reader(client_id, reader);
                Self::spawn_writer(client_id, writer, outbound_rx);
            }
            None => {
                warn!("Rejecting {}: server full", addr);
                tokio::spawn(async move {
                    let mut stream = stream;
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    if let Err(e) = write_packet(&mut stream, &response).await {
                        debug!("Failed to notify {}: {}", addr, e);
                    }
                    let _ = stream.shutdown().await;

                    // Closing with unread input would reset the connection
                    // before the peer reads the reason
                    let mut sink = [0u8; 512];
                    let _ = timeout(REJECT_LINGER, async {
                        while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
                    })
                    .await;
                });
            }
        }
    }

    /// Processes one packet from a registered connection
    fn handle_packet(&mut self, client_id: u32, packet: Packet) {
        if self.clients.get(client_id).is_none() {
            debug!("Dropping {} from departed client {}", packet.kind(), client_id);
            return;
        }

        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_id, client_version);
                return;
            }
            Packet::Disconnect => {
                self.handle_disconnect(client_id);
                return;
            }
            _ => {}
        }

        if !self.clients.is_joined(client_id) {
            warn!(
                "Ignoring {} from client {} before handshake",
                packet.kind(),
                client_id
            );
            return;
        }

        match packet {
            Packet::PlaceBlock { r, c, z, block } => {
                match self.game_state.place_block(r, c, z, &block) {
                    Ok(()) => self.broadcast_snapshot(),
                    Err(e) => debug!("Rejected placement from client {}: {}", client_id, e),
                }
            }

            Packet::RemoveBlock { r, c } => match self.game_state.remove_block(r, c) {
                Ok(()) => self.broadcast_snapshot(),
                Err(e) => debug!("Rejected removal from client {}: {}", client_id, e),
            },

            Packet::Move { pose } => {
                if !pose.is_finite() {
                    warn!("Ignoring non-finite pose from client {}", client_id);
                    return;
                }
                self.clients.update_pose(client_id, pose);
                let registry = Packet::PlayerRegistry {
                    players: self.clients.player_registry(),
                };
                self.clients.broadcast(Arc::new(registry), Some(client_id));
            }

            other => {
                warn!(
                    "Unexpected {} packet from client {}",
                    other.kind(),
                    client_id
                );
            }
        }
    }

    fn handle_connect(&mut self, client_id: u32, client_version: u32) {
        if self.clients.is_joined(client_id) {
            warn!("Client {} sent a second handshake", client_id);
            return;
        }

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Client {} speaks protocol {}, expected {}",
                client_id, client_version, PROTOCOL_VERSION
            );
            let response = Packet::Disconnected {
                reason: format!(
                    "Protocol version mismatch: server {}, client {}",
                    PROTOCOL_VERSION, client_version
                ),
            };
            self.clients.send_to(client_id, Arc::new(response));
            self.clients.remove_client(&client_id);
            return;
        }

        self.clients.mark_joined(client_id);
        info!("Client {} joined", client_id);

        let connected = Packet::Connected {
            client_id,
            map_size: self.config.map_size,
        };
        let snapshot = Packet::WorldSnapshot {
            blocks: self.game_state.snapshot(),
        };
        let registry = Packet::PlayerRegistry {
            players: self.clients.player_registry(),
        };
        for packet in [connected, snapshot, registry] {
            self.clients.send_to(client_id, Arc::new(packet));
        }
    }

    fn handle_disconnect(&mut self, client_id: u32) {
        let was_joined = self.clients.is_joined(client_id);
        if self.clients.remove_client(&client_id) && was_joined {
            let registry = Packet::PlayerRegistry {
                players: self.clients.player_registry(),
            };
            self.clients.broadcast(Arc::new(registry), None);
        }
    }

    /// Sends the full world to every joined client
    fn broadcast_snapshot(&mut self) {
        let snapshot = Arc::new(Packet::WorldSnapshot {
            blocks: self.game_state.snapshot(),
        });
        let delivered = self.clients.broadcast(snapshot, None);
        debug!(
            "Edit {} broadcast to {} clients",
            self.game_state.edits(),
            delivered
        );
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Accepted { stream, addr } => self.handle_accept(stream, addr),
            ServerMessage::PacketReceived { client_id, packet } => {
                self.handle_packet(client_id, packet)
            }
            ServerMessage::ConnectionClosed { client_id } => self.handle_disconnect(client_id),
        }
    }

    /// Main server loop. The server keeps a sender of its own channel for
    /// new reader tasks, so the loop never ends by itself: stop it by
    /// dropping the future (as the binary does on Ctrl-C) or aborting the
    /// task it runs on.
    pub async fn run(mut self) -> std::io::Result<()> {
        self.spawn_acceptor();

        let mut stats_interval = interval(STATS_INTERVAL);
        // The first tick fires immediately
        stats_interval.tick().await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = stats_interval.tick() => {
                    if !self.clients.is_empty() {
                        info!(
                            "{} clients connected, {} edits since startup",
                            self.clients.len(),
                            self.game_state.edits()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
