//! Connection registry for the world server
//!
//! This module tracks every open connection and what the server knows about it:
//! - Connection lifecycle (accept, handshake, disconnect)
//! - The outbound queue feeding the connection's writer task
//! - The last vehicle pose the connection reported
//!
//! The registry is owned by the server's mutation loop and never shared, so
//! registry updates serialize with world edits. Sends never block: a full
//! outbound queue drops the message for that connection only.

use log::{debug, info, warn};
use shared::{Packet, VehiclePose};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// One open connection.
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: u32,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Whether the client completed the `Connect` handshake
    pub joined: bool,
    /// Last reported vehicle pose, if any
    pub pose: Option<VehiclePose>,
    /// Messages discarded because the outbound queue was full
    pub dropped: u64,
    outbound: mpsc::Sender<Arc<Packet>>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, outbound: mpsc::Sender<Arc<Packet>>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            joined: false,
            pose: None,
            dropped: 0,
            outbound,
        }
    }

    /// Queues a packet without waiting. Returns false if it was dropped.
    pub fn send(&mut self, packet: Arc<Packet>) -> bool {
        match self.outbound.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(packet)) => {
                self.dropped += 1;
                debug!(
                    "Outbound queue full for client {}, dropped {}",
                    self.id,
                    packet.kind()
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Manages all open connections and the player registry.
pub struct ClientManager {
    /// Open connections indexed by their ID
    clients: HashMap<u32, Client>,
    /// Next ID handed out on accept
    next_client_id: u32,
    /// Maximum number of concurrent connections
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry. IDs start from 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a freshly accepted connection.
    ///
    /// Returns `None` when the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::Sender<Arc<Packet>>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbound));

        Some(client_id)
    }

    /// Forgets a connection and its pose. Dropping the client closes its
    /// outbound queue, which stops its writer task. Returns false if the
    /// client was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            if client.dropped > 0 {
                warn!(
                    "Client {} missed {} messages on a full queue",
                    client.id, client.dropped
                );
            }
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Marks the handshake of a client as complete.
    pub fn mark_joined(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.joined = true;
                true
            }
            None => false,
        }
    }

    pub fn is_joined(&self, client_id: u32) -> bool {
        self.clients.get(&client_id).is_some_and(|c| c.joined)
    }

    /// Stores the latest pose reported by a client, replacing the old one.
    pub fn update_pose(&mut self, client_id: u32, pose: VehiclePose) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.pose = Some(pose);
                true
            }
            None => false,
        }
    }

    /// Every known vehicle pose keyed by connection.
    pub fn player_registry(&self) -> BTreeMap<u32, VehiclePose> {
        self.clients
            .values()
            .filter_map(|client| client.pose.map(|pose| (client.id, pose)))
            .collect()
    }

    /// Queues a packet for one client.
    pub fn send_to(&mut self, client_id: u32, packet: Arc<Packet>) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.send(packet),
            None => false,
        }
    }

    /// Queues a packet for every joined client except `exclude`. Returns how
    /// many queues accepted it.
    pub fn broadcast(&mut self, packet: Arc<Packet>, exclude: Option<u32>) -> usize {
        let mut delivered = 0;
        for client in self.clients.values_mut() {
            if !client.joined || Some(client.id) == exclude {
                continue;
            }
            if client.send(Arc::clone(&packet)) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no connection is open
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Heading;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn pose(r: f32) -> VehiclePose {
        VehiclePose::new(r, 1.0, 0.0, Heading::DownRight)
    }

    fn joined(
        manager: &mut ClientManager,
        addr: SocketAddr,
    ) -> (u32, mpsc::Receiver<Arc<Packet>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = manager.add_client(addr, tx).unwrap();
        manager.mark_joined(id);
        (id, rx)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (id1, _rx1) = joined(&mut manager, test_addr());
        let (id2, _rx2) = joined(&mut manager, test_addr2());

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get(id2).unwrap().addr, test_addr2());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);

        assert!(manager.add_client(test_addr(), tx1).is_some());
        assert!(manager.add_client(test_addr2(), tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_closes_queue() {
        let mut manager = ClientManager::new(2);
        let (id, mut rx) = joined(&mut manager, test_addr());

        assert!(manager.remove_client(&id));
        assert!(!manager.remove_client(&id));
        assert!(manager.is_empty());
        assert!(rx.try_recv().is_err());
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_handshake_flag() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::channel(1);
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(!manager.is_joined(id));
        assert!(manager.mark_joined(id));
        assert!(manager.is_joined(id));
        assert!(!manager.mark_joined(999));
    }

    #[test]
    fn test_registry_tracks_latest_pose() {
        let mut manager = ClientManager::new(3);
        let (id1, _rx1) = joined(&mut manager, test_addr());
        let (id2, _rx2) = joined(&mut manager, test_addr2());

        assert!(manager.player_registry().is_empty());

        manager.update_pose(id1, pose(1.0));
        manager.update_pose(id1, pose(2.0));
        let registry = manager.player_registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[&id1].r, 2.0);
        assert!(!registry.contains_key(&id2));

        manager.remove_client(&id1);
        assert!(manager.player_registry().is_empty());
        assert!(!manager.update_pose(id1, pose(3.0)));
    }

    #[test]
    fn test_broadcast_skips_excluded_and_unjoined() {
        let mut manager = ClientManager::new(4);
        let (id1, mut rx1) = joined(&mut manager, test_addr());
        let (_id2, mut rx2) = joined(&mut manager, test_addr2());
        let (tx3, mut rx3) = mpsc::channel(4);
        manager.add_client("127.0.0.1:8082".parse().unwrap(), tx3);

        let delivered = manager.broadcast(Arc::new(Packet::Disconnect), Some(id1));
        assert_eq!(delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(*rx2.try_recv().unwrap(), Packet::Disconnect);
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = mpsc::channel(2);
        let id = manager.add_client(test_addr(), tx).unwrap();
        manager.mark_joined(id);

        for _ in 0..5 {
            manager.broadcast(Arc::new(Packet::Disconnect), None);
        }

        assert_eq!(manager.get(id).unwrap().dropped, 3);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_to_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.send_to(42, Arc::new(Packet::Disconnect)));
    }
}
