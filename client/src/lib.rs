//! # World Client Library
//!
//! This library provides the client side of the shared isometric city: a
//! local replica of the world, the link to the authoritative server, the
//! client-local camera and the pieces the windowed binary uses to read input
//! and draw.
//!
//! ## Architecture Overview
//!
//! ### Server-Driven Replica
//! The client never edits its world on its own while connected. Placing or
//! removing a block sends an intent to the server, and the replica changes
//! only when the server broadcasts the resulting world. Every broadcast is a
//! full snapshot, so a client that missed one catches up with the next.
//!
//! ### Offline Fallback
//! If the server cannot be reached at startup, or goes away mid-session, the
//! client keeps playing alone on its current world and applies edits
//! directly.
//!
//! ### Local Vehicle
//! One vehicle per client is simulated locally with the same kinematics the
//! shared crate defines. Its pose is reported to the server whenever it
//! changes, and other players' vehicles arrive as registry broadcasts.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Replica state: world mirror, remote vehicles, the local vehicle, the
//! block palette and tile classification loading.
//!
//! ### Network Module (`network`)
//! TCP connection and handshake, background socket tasks, and the
//! [`network::Client`] session that routes edits online or offline.
//!
//! ### Camera Module (`camera`)
//! Rotation, zoom, pan and follow mode; never synchronized.
//!
//! ### Input Module (`input`)
//! Keyboard and mouse mapping for one frame.
//!
//! ### Rendering Module (`rendering`)
//! Flat-colour isometric drawing with back-to-front ordering.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::{Heading, TileTable};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client =
//!         Client::connect_or_offline("127.0.0.1:8080", 30, TileTable::standard()).await;
//!
//!     // Build a road on cell (3, 4) and drive onto it
//!     client.place_block(3, 4, "block1");
//!     client.spawn_vehicle(3, 3);
//!     client.tick(Some(Heading::DownLeft));
//!
//!     // Apply whatever the server broadcast in the meantime
//!     client.pump();
//!     client.shutdown();
//! }
//! ```

pub mod camera;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
