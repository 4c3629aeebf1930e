//! Types and rules shared by the server and the client: grid geometry, the
//! stacked-tile world, vehicle kinematics and the wire protocol.

pub mod codec;
pub mod geometry;
pub mod tiles;
pub mod vehicle;
pub mod world;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use geometry::{rotate_grid, rotate_point, rotate_position, IsoProjection, Rotation};
pub use tiles::{TileClassifier, TileKind, TileTable};
pub use vehicle::{Heading, TickReport, Vehicle, VehiclePose};
pub use world::{BlockRecord, EditError, PlacePolicy, World};

pub const PROTOCOL_VERSION: u32 = 1;

/// Side length of the square grid unless configured otherwise.
pub const MAP_SIZE: usize = 30;
/// Identifier of the permanent ground layer of a fresh world.
pub const GROUND_BLOCK: &str = "grass";
/// Highest elevation a block may occupy. Edits and saved records above it
/// are refused.
pub const MAX_ELEVATION: usize = 255;

pub const TILE_W: f32 = 64.0;
pub const TILE_H: f32 = 32.0;
/// Screen pixels per unit of elevation at zoom 1.
pub const Z_STEP: f32 = 24.0;

/// Grid units a vehicle travels per simulation tick.
pub const VEHICLE_SPEED: f32 = 0.15;
/// Largest height difference a vehicle may cross in one move.
pub const CLIMB_LIMIT: f32 = 1.5;
/// Vehicles at or above this height drive over overpasses, below it under them.
pub const OVERPASS_CLEARANCE: f32 = 0.8;
/// Fraction of the remaining height difference closed per tick.
pub const HEIGHT_EASING: f32 = 0.2;
/// Vehicles are kept this far inside the far edge of the grid.
pub const EDGE_MARGIN: f32 = 0.1;

/// Messages exchanged over a client connection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    PlaceBlock {
        r: i32,
        c: i32,
        z: i32,
        block: String,
    },
    RemoveBlock {
        r: i32,
        c: i32,
    },
    Move {
        pose: VehiclePose,
    },
    Disconnect,

    Connected {
        client_id: u32,
        map_size: usize,
    },
    WorldSnapshot {
        blocks: Vec<BlockRecord>,
    },
    PlayerRegistry {
        players: BTreeMap<u32, VehiclePose>,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Connect { .. } => "connect",
            Packet::PlaceBlock { .. } => "place_block",
            Packet::RemoveBlock { .. } => "remove_block",
            Packet::Move { .. } => "move",
            Packet::Disconnect => "disconnect",
            Packet::Connected { .. } => "connected",
            Packet::WorldSnapshot { .. } => "world_snapshot",
            Packet::PlayerRegistry { .. } => "player_registry",
            Packet::Disconnected { .. } => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialization_place_block() {
        let packet = Packet::PlaceBlock {
            r: 3,
            c: 4,
            z: 1,
            block: "block7".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_packet_serialization_player_registry() {
        let mut players = BTreeMap::new();
        players.insert(1, VehiclePose::new(1.5, 2.25, 0.2, Heading::UpLeft));
        players.insert(7, VehiclePose::new(0.0, 9.0, 1.0, Heading::DownRight));

        let packet = Packet::PlayerRegistry { players };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::PlayerRegistry { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[&1].heading, Heading::UpLeft);
                assert_eq!(players[&7].c, 9.0);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_kind_names() {
        assert_eq!(Packet::Disconnect.kind(), "disconnect");
        assert_eq!(Packet::RemoveBlock { r: 0, c: 0 }.kind(), "remove_block");
        assert_eq!(
            Packet::WorldSnapshot { blocks: vec![] }.kind(),
            "world_snapshot"
        );
    }
}
