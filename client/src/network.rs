//! Connection to the world server with offline fallback

use crate::game::ClientGameState;
use log::{debug, info, warn};
use shared::codec::{read_packet, write_packet, CodecError};
use shared::{Heading, Packet, TileTable, PROTOCOL_VERSION};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::timeout;

/// How long connecting plus the handshake may take before going offline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),
    #[error("server did not answer within {0:?}")]
    Timeout(Duration),
    #[error("server refused the connection: {0}")]
    Rejected(String),
    #[error("unexpected {0} packet during handshake")]
    Unexpected(&'static str),
}

/// An established, handshaken connection.
///
/// Reading and writing happen on background tasks; the owner only pushes to
/// and polls from channels, so neither call ever waits on the socket.
pub struct Connection {
    client_id: u32,
    map_size: usize,
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: mpsc::UnboundedReceiver<Packet>,
}

impl Connection {
    /// Connects and performs the `Connect`/`Connected` handshake.
    pub async fn connect(addr: &str) -> Result<Self, LinkError> {
        match timeout(CONNECT_TIMEOUT, Self::handshake(addr)).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::Timeout(CONNECT_TIMEOUT)),
        }
    }

    async fn handshake(addr: &str) -> Result<Self, LinkError> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        write_packet(
            &mut stream,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
        )
        .await?;

        let (client_id, map_size) = match read_packet(&mut stream).await? {
            Packet::Connected {
                client_id,
                map_size,
            } => (client_id, map_size),
            Packet::Disconnected { reason } => return Err(LinkError::Rejected(reason)),
            other => return Err(LinkError::Unexpected(other.kind())),
        };

        let (mut reader, mut writer) = stream.into_split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();

        tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(packet) => {
                        if inbound_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.is_closed() => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading from server: {}", e);
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(packet) = outbound_rx.recv().await {
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    warn!("Error sending {} to server: {}", packet.kind(), e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        info!("Connected! Client ID: {}", client_id);

        Ok(Connection {
            client_id,
            map_size,
            outbound,
            inbound,
        })
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn map_size(&self) -> usize {
        self.map_size
    }

    /// Queues a packet for the server. Returns false once the link is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }

    /// Next packet from the server if one is waiting. `Err` means the
    /// connection is closed and no packets remain.
    pub fn try_recv(&mut self) -> Result<Option<Packet>, LinkError> {
        match self.inbound.try_recv() {
            Ok(packet) => Ok(Some(packet)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "connection closed",
            ))),
        }
    }

    /// Waits for the next packet from the server.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.inbound.recv().await
    }
}

/// Where edits go.
pub enum ServerLink {
    Online(Connection),
    Offline,
}

impl ServerLink {
    pub fn is_online(&self) -> bool {
        matches!(self, ServerLink::Online(_))
    }
}

/// Client session: the local replica plus its link to the server.
///
/// Online, edits and vehicle moves are sent as intents and the replica only
/// follows what the server broadcasts. Offline, the same calls edit the
/// local world directly. Losing the server mid-session keeps the last world
/// and carries on offline.
pub struct Client {
    state: ClientGameState,
    link: ServerLink,
}

impl Client {
    /// A client that never talks to a server.
    pub fn offline(map_size: usize, tiles: TileTable) -> Self {
        info!("Playing offline on a {0}x{0} map", map_size);
        Self {
            state: ClientGameState::new(map_size, tiles),
            link: ServerLink::Offline,
        }
    }

    /// Connects to `addr`, falling back to an offline all-grass world of
    /// `map_size` if the server cannot be reached.
    pub async fn connect_or_offline(addr: &str, map_size: usize, tiles: TileTable) -> Self {
        info!("Connecting to server at {}...", addr);
        match Connection::connect(addr).await {
            Ok(connection) => {
                let mut state = ClientGameState::new(map_size, tiles);
                state.join(connection.client_id(), connection.map_size());
                Self {
                    state,
                    link: ServerLink::Online(connection),
                }
            }
            Err(e) => {
                warn!("Could not join {}: {}", addr, e);
                Self::offline(map_size, tiles)
            }
        }
    }

    pub fn state(&self) -> &ClientGameState {
        &self.state
    }

    pub fn is_online(&self) -> bool {
        self.link.is_online()
    }

    /// Applies every packet that arrived since the last call. Returns how
    /// many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let ServerLink::Online(connection) = &mut self.link else {
                return handled;
            };
            match connection.try_recv() {
                Ok(Some(packet)) => {
                    handled += 1;
                    self.handle_packet(packet);
                }
                Ok(None) => return handled,
                Err(e) => {
                    warn!("Lost connection to server ({}), continuing offline", e);
                    self.go_offline();
                    return handled;
                }
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::WorldSnapshot { blocks } => self.state.apply_snapshot(&blocks),
            Packet::PlayerRegistry { players } => self.state.apply_registry(players),
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.go_offline();
            }
            other => warn!("Unexpected {} packet from server", other.kind()),
        }
    }

    fn go_offline(&mut self) {
        self.link = ServerLink::Offline;
        self.state.leave();
    }

    /// Sends a packet if online. A closed link switches to offline mode.
    fn send(&mut self, packet: Packet) -> bool {
        let ServerLink::Online(connection) = &self.link else {
            return false;
        };
        if connection.send(packet) {
            true
        } else {
            warn!("Lost connection to server, continuing offline");
            self.go_offline();
            false
        }
    }

    /// Builds `block` on top of cell `(r, c)`.
    pub fn place_block(&mut self, r: usize, c: usize, block: &str) {
        let Some(z) = self.state.placement_height(r, c) else {
            return;
        };
        if self.link.is_online() {
            self.send(Packet::PlaceBlock {
                r: r as i32,
                c: c as i32,
                z: z as i32,
                block: block.to_string(),
            });
        } else {
            self.state.place_local(r, c, z, block);
        }
    }

    /// Takes the top block off cell `(r, c)`.
    pub fn remove_block(&mut self, r: usize, c: usize) {
        if self.link.is_online() {
            self.send(Packet::RemoveBlock {
                r: r as i32,
                c: c as i32,
            });
        } else {
            self.state.remove_local(r, c);
        }
    }

    /// Places the local vehicle on cell `(r, c)` and announces it.
    pub fn spawn_vehicle(&mut self, r: usize, c: usize) {
        let pose = self.state.spawn_vehicle(r, c);
        self.send(Packet::Move { pose });
    }

    /// Drives the local vehicle one tick, reporting the pose if it changed.
    pub fn tick(&mut self, input: Option<Heading>) {
        if let Some(pose) = self.state.drive(input) {
            self.send(Packet::Move { pose });
        }
    }

    /// Says goodbye to the server, if connected.
    pub fn shutdown(&mut self) {
        if self.send(Packet::Disconnect) {
            info!("Disconnected from server");
        }
        self.link = ServerLink::Offline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::World;

    #[test]
    fn test_offline_client_edits_locally() {
        let mut client = Client::offline(4, TileTable::standard());
        assert!(!client.is_online());

        client.place_block(1, 1, "block3");
        client.place_block(1, 1, "block4");
        assert_eq!(client.state().world().height(1, 1), Some(3));

        client.remove_block(1, 1);
        assert_eq!(client.state().world().height(1, 1), Some(2));

        client.place_block(9, 9, "block3");
        assert_eq!(client.pump(), 0);
    }

    #[test]
    fn test_offline_vehicle_drives() {
        let mut client = Client::offline(4, TileTable::standard());
        client.spawn_vehicle(2, 2);
        client.tick(Some(Heading::UpLeft));

        let pose = client.state().vehicle().unwrap().pose;
        assert!(pose.r < 2.0);
        assert_eq!(pose.heading, Heading::UpLeft);
    }

    #[tokio::test]
    async fn test_unreachable_server_falls_back_to_grass() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = Client::connect_or_offline(&addr, 6, TileTable::standard()).await;
        assert!(!client.is_online());
        assert_eq!(client.state().world(), &World::new(6));
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_packet(&mut stream).await.unwrap();
            write_packet(
                &mut stream,
                &Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
            )
            .await
            .unwrap();
        });

        match Connection::connect(&addr).await {
            Err(LinkError::Rejected(reason)) => assert_eq!(reason, "Server full"),
            other => panic!("Unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_handshake_then_packets_flow() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let hello = read_packet(&mut stream).await.unwrap();
            assert_eq!(
                hello,
                Packet::Connect {
                    client_version: PROTOCOL_VERSION
                }
            );
            write_packet(
                &mut stream,
                &Packet::Connected {
                    client_id: 9,
                    map_size: 5,
                },
            )
            .await
            .unwrap();
            write_packet(
                &mut stream,
                &Packet::WorldSnapshot {
                    blocks: World::new(5).to_blocks(),
                },
            )
            .await
            .unwrap();
            read_packet(&mut stream).await.unwrap()
        });

        let mut connection = Connection::connect(&addr).await.unwrap();
        assert_eq!(connection.client_id(), 9);
        assert_eq!(connection.map_size(), 5);

        let snapshot = connection.recv().await.unwrap();
        assert!(matches!(snapshot, Packet::WorldSnapshot { blocks } if blocks.len() == 25));

        assert!(connection.send(Packet::RemoveBlock { r: 1, c: 2 }));
        assert_eq!(
            server.await.unwrap(),
            Packet::RemoveBlock { r: 1, c: 2 }
        );

        // The server task is gone, so the link reports closed once drained
        assert!(connection.recv().await.is_none());
        assert!(connection.try_recv().is_err());
    }
}
