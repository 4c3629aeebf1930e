//! Client-side replica of the shared world

use log::{debug, info};
use shared::{
    BlockRecord, Heading, PlacePolicy, TileTable, Vehicle, VehiclePose, World, MAP_SIZE,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Number of block identifiers offered by the palette (`block1` to `block100`).
pub const PALETTE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum TileTableError {
    #[error("failed to read tile table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tile table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads a classification table such as `{"block7": "ramp"}`, or the
/// standard table when no path is given.
pub fn load_tile_table(path: Option<&Path>) -> Result<TileTable, TileTableError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let table: TileTable = serde_json::from_str(&text)?;
            info!(
                "Loaded {} tile classes from {}",
                table.len(),
                path.display()
            );
            Ok(table)
        }
        None => Ok(TileTable::standard()),
    }
}

/// Everything the client knows about the world and the other players.
///
/// Online, the world here is a mirror: it only changes when a snapshot
/// arrives. Offline, edits are applied to it directly.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    world: World,
    players: BTreeMap<u32, VehiclePose>,
    client_id: Option<u32>,
    vehicle: Option<Vehicle>,
    tiles: TileTable,
    snapshots: u64,
}

impl ClientGameState {
    /// An all-grass world of `map_size` with nobody else in it.
    pub fn new(map_size: usize, tiles: TileTable) -> Self {
        Self {
            world: World::new(map_size),
            players: BTreeMap::new(),
            client_id: None,
            vehicle: None,
            tiles,
            snapshots: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn tiles(&self) -> &TileTable {
        &self.tiles
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    /// Number of world snapshots applied so far.
    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    /// Adopts the identity and map size the server assigned.
    pub fn join(&mut self, client_id: u32, map_size: usize) {
        self.client_id = Some(client_id);
        if map_size != self.world.size() {
            debug!("Resizing world from {} to {}", self.world.size(), map_size);
            self.world = World::new(map_size);
            self.vehicle = None;
        }
    }

    /// Forgets the server identity and remote vehicles, keeping the world.
    pub fn leave(&mut self) {
        self.client_id = None;
        self.players.clear();
    }

    /// Replaces the whole world with a server snapshot.
    pub fn apply_snapshot(&mut self, blocks: &[BlockRecord]) {
        self.world.rebuild(blocks);
        self.snapshots += 1;
    }

    /// Replaces the set of known vehicles with a registry broadcast.
    pub fn apply_registry(&mut self, players: BTreeMap<u32, VehiclePose>) {
        self.players = players;
    }

    /// Vehicles of everyone but this client.
    pub fn remote_players(&self) -> impl Iterator<Item = (u32, &VehiclePose)> + '_ {
        let own = self.client_id;
        self.players
            .iter()
            .filter(move |(id, _)| Some(**id) != own)
            .map(|(id, pose)| (*id, pose))
    }

    /// Elevation a new block on top of cell `(r, c)` would occupy.
    pub fn placement_height(&self, r: usize, c: usize) -> Option<usize> {
        self.world.height(r, c)
    }

    /// Applies a placement straight to the local world. Used offline only.
    pub fn place_local(&mut self, r: usize, c: usize, z: usize, block: &str) -> bool {
        self.world
            .place_block(r as i32, c as i32, z as i32, block, PlacePolicy::default())
            .is_ok()
    }

    /// Applies a removal straight to the local world. Used offline only.
    pub fn remove_local(&mut self, r: usize, c: usize) -> bool {
        self.world.remove_top_block(r as i32, c as i32).is_ok()
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.vehicle.as_ref()
    }

    /// Puts the local vehicle on cell `(r, c)` at the cell's top elevation,
    /// replacing any previous one.
    pub fn spawn_vehicle(&mut self, r: usize, c: usize) -> VehiclePose {
        let (z, _) = self.world.probe(r as f32, c as f32);
        let vehicle = Vehicle::new(r as f32, c as f32, z);
        let pose = vehicle.pose;
        self.vehicle = Some(vehicle);
        pose
    }

    /// Advances the local vehicle one tick. Returns the new pose if it moved.
    pub fn drive(&mut self, input: Option<Heading>) -> Option<VehiclePose> {
        let vehicle = self.vehicle.as_mut()?;
        let before = vehicle.pose;
        vehicle.tick(input, &self.world, &self.tiles);
        (vehicle.pose != before).then_some(vehicle.pose)
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new(MAP_SIZE, TileTable::standard())
    }
}

/// Selection of the block identifier placed by the next click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPalette {
    blocks: Vec<String>,
    selected: usize,
}

impl BlockPalette {
    /// `block1` through `block{PALETTE_SIZE}`, with `block1` selected.
    pub fn new() -> Self {
        Self {
            blocks: (1..=PALETTE_SIZE).map(|i| format!("block{}", i)).collect(),
            selected: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.blocks[self.selected]
    }

    /// Selects the block at `index`, ignoring indices past the end.
    pub fn select(&mut self, index: usize) {
        if index < self.blocks.len() {
            self.selected = index;
        }
    }

    pub fn cycle(&mut self) {
        self.selected = (self.selected + 1) % self.blocks.len();
    }
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self::new()
    }
}
