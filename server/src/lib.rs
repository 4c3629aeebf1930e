//! # World Server Library
//!
//! This library provides the authoritative server for the shared isometric
//! city. It owns the canonical stacked-tile world, applies edits coming from
//! clients, persists the result and rebroadcasts it so every connected client
//! converges on the same world.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative World
//! The server holds the only world every client agrees on. Clients send edit
//! intents; the server validates them against its own copy, applies the
//! accepted ones and broadcasts the full block list. Rejected intents are
//! dropped silently and change nothing.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection establishment, handshake and protocol version check
//! - Vehicle pose tracking for the player registry
//! - Disconnection handling and cleanup
//!
//! ### Persistence
//! Every accepted edit is written to a [`store::WorldStore`] before it is
//! broadcast, and the last saved world is restored on startup.
//!
//! ## Architecture Design
//!
//! ### Single Mutation Loop
//! One task owns the world and the connection registry. Per-connection reader
//! tasks forward decoded packets to it over a channel, and per-connection
//! writer tasks drain bounded outbound queues. Because every edit goes
//! through the same loop, a later edit always overwrites an earlier one and
//! every client sees them in the same order.
//!
//! ### Slow Clients
//! Broadcasts never wait on a socket. A client whose outbound queue is full
//! misses that message; the next snapshot carries the whole world anyway.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, ID assignment, outbound queues and vehicle poses.
//!
//! ### Game Module (`game`)
//! The canonical world plus its store.
//!
//! ### Network Module (`network`)
//! TCP accept loop, framing, handshake and the mutation loop itself.
//!
//! ### Store Module (`store`)
//! JSON file and in-memory world storage.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(
//!         "127.0.0.1:8080",
//!         ServerConfig::default(),
//!         Box::new(JsonFileStore::new("world.json")),
//!     )
//!     .await?;
//!
//!     // Accepts clients and applies their edits until the process stops
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
pub mod store;
