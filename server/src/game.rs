//! Authoritative world state
//!
//! Owns the canonical [`World`] and its durable store. Every accepted edit is
//! saved before the caller gets a chance to broadcast it.

use crate::store::{StoreError, WorldStore};
use log::{debug, info, warn};
use shared::{BlockRecord, EditError, PlacePolicy, World};

pub struct GameState {
    world: World,
    policy: PlacePolicy,
    store: Box<dyn WorldStore>,
    edits: u64,
}

impl GameState {
    /// Restores the last saved world, or starts from all-grass when the
    /// store has nothing. A store that cannot be read is a startup fault.
    pub fn load(
        map_size: usize,
        policy: PlacePolicy,
        mut store: Box<dyn WorldStore>,
    ) -> Result<Self, StoreError> {
        let world = match store.load()? {
            Some(blocks) => {
                info!("Restored world from {} saved blocks", blocks.len());
                World::from_blocks(map_size, &blocks)
            }
            None => {
                info!("No saved world, starting with {0}x{0} grass", map_size);
                World::new(map_size)
            }
        };

        Ok(Self {
            world,
            policy,
            store,
            edits: 0,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn policy(&self) -> PlacePolicy {
        self.policy
    }

    /// Number of edits accepted since startup.
    pub fn edits(&self) -> u64 {
        self.edits
    }

    pub fn snapshot(&self) -> Vec<BlockRecord> {
        self.world.to_blocks()
    }

    pub fn place_block(&mut self, r: i32, c: i32, z: i32, block: &str) -> Result<(), EditError> {
        self.world.place_block(r, c, z, block, self.policy)?;
        debug!("Placed {} at ({}, {}, {})", block, r, c, z);
        self.accept_edit();
        Ok(())
    }

    pub fn remove_block(&mut self, r: i32, c: i32) -> Result<(), EditError> {
        self.world.remove_top_block(r, c)?;
        debug!("Removed top block at ({}, {})", r, c);
        self.accept_edit();
        Ok(())
    }

    fn accept_edit(&mut self) {
        self.edits += 1;
        let blocks = self.world.to_blocks();
        if let Err(e) = self.store.save(&blocks) {
            warn!("Failed to save world after edit {}: {}", self.edits, e);
        }
    }
}
