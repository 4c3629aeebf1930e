//! Stacked-tile world model
//!
//! Every cell owns an ordered stack of layers, index = elevation. The ground
//! layer at elevation 0 is permanent and the topmost layer is never empty.
//! All mutations validate their coordinates and report a rejected edit as an
//! [`EditError`] without touching the world.

use crate::{GROUND_BLOCK, MAX_ELEVATION};
use serde::{Deserialize, Serialize};

/// Block identifiers occupying one elevation of a cell, in placement order.
pub type Layer = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    layers: Vec<Layer>,
}

impl Cell {
    fn ground() -> Self {
        Self {
            layers: vec![vec![GROUND_BLOCK.to_string()]],
        }
    }

    /// Number of layers, always at least 1.
    pub fn height(&self) -> usize {
        self.layers.len()
    }

    /// Elevation of the topmost layer.
    pub fn top(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, z: usize) -> Option<&Layer> {
        self.layers.get(z)
    }

    /// Every identifier on every layer, bottom to top.
    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flatten().map(String::as_str)
    }
}

/// How a placement below the top of a stack is resolved. Fixed per
/// deployment; the server never mixes policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacePolicy {
    /// The placed block replaces everything in the target layer. At
    /// elevation 0 this overwrites the ground.
    #[default]
    Overwrite,
    /// The placed block joins the target layer unless already there.
    Decorate,
}

/// One identifier at one elevation of one cell. A world is fully described
/// by the list of its records in `(r, c, z)` order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRecord {
    pub r: usize,
    pub c: usize,
    pub z: usize,
    pub name: String,
}

impl BlockRecord {
    pub fn new(r: usize, c: usize, z: usize, name: impl Into<String>) -> Self {
        Self {
            r,
            c,
            z,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("cell ({r}, {c}) is outside the {size}x{size} grid")]
    OutOfBounds { r: i32, c: i32, size: usize },
    #[error("elevation {0} is negative")]
    InvalidElevation(i32),
    #[error("elevation {z} leaves a gap above stack height {height}")]
    Gap { z: usize, height: usize },
    #[error("the ground layer cannot be removed")]
    BaseLayer,
}

/// The full `size x size` grid of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    size: usize,
    cells: Vec<Cell>,
}

impl World {
    /// A world where every cell holds only the ground layer.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::ground(); size * size],
        }
    }

    /// Builds a world from its block list, see [`World::rebuild`].
    pub fn from_blocks(size: usize, blocks: &[BlockRecord]) -> Self {
        let mut world = Self::new(size);
        world.rebuild(blocks);
        world
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell(&self, r: usize, c: usize) -> Option<&Cell> {
        if r < self.size && c < self.size {
            Some(&self.cells[r * self.size + c])
        } else {
            None
        }
    }

    pub fn height(&self, r: usize, c: usize) -> Option<usize> {
        self.cell(r, c).map(Cell::height)
    }

    fn index(&self, r: i32, c: i32) -> Result<usize, EditError> {
        let size = self.size as i32;
        if (0..size).contains(&r) && (0..size).contains(&c) {
            Ok(r as usize * self.size + c as usize)
        } else {
            Err(EditError::OutOfBounds {
                r,
                c,
                size: self.size,
            })
        }
    }

    /// Places `block` at elevation `z` of cell `(r, c)`.
    ///
    /// `z` equal to the stack height grows the stack by one layer; a lower
    /// `z` is resolved by `policy`; anything higher would float over a gap
    /// and is rejected.
    pub fn place_block(
        &mut self,
        r: i32,
        c: i32,
        z: i32,
        block: &str,
        policy: PlacePolicy,
    ) -> Result<(), EditError> {
        let index = self.index(r, c)?;
        if z < 0 || z as usize > MAX_ELEVATION {
            return Err(EditError::InvalidElevation(z));
        }
        let z = z as usize;
        let cell = &mut self.cells[index];
        let height = cell.height();

        if z == height {
            cell.layers.push(vec![block.to_string()]);
            return Ok(());
        }
        if z > height {
            return Err(EditError::Gap { z, height });
        }

        let layer = &mut cell.layers[z];
        match policy {
            PlacePolicy::Overwrite => {
                layer.clear();
                layer.push(block.to_string());
            }
            PlacePolicy::Decorate => {
                if !layer.iter().any(|b| b == block) {
                    layer.push(block.to_string());
                }
            }
        }
        Ok(())
    }

    /// Removes the topmost layer of cell `(r, c)`. The ground layer stays.
    ///
    /// Empty layers exposed by the removal are discarded with it, so the
    /// top of a stack always holds at least one block.
    pub fn remove_top_block(&mut self, r: i32, c: i32) -> Result<(), EditError> {
        let index = self.index(r, c)?;
        let cell = &mut self.cells[index];
        if cell.height() <= 1 {
            return Err(EditError::BaseLayer);
        }
        cell.layers.pop();
        while cell.height() > 1 && cell.layers.last().is_some_and(Vec::is_empty) {
            cell.layers.pop();
        }
        Ok(())
    }

    /// Replaces the whole world with the one described by `blocks`.
    ///
    /// Starts from all-ground. Records are applied in order: the first
    /// elevation-0 record of a cell replaces its default ground, every other
    /// record pads the stack with empty layers up to its elevation and joins
    /// that layer unless already present. Records outside the grid are
    /// skipped. The result depends only on `blocks`, never on prior state.
    pub fn rebuild(&mut self, blocks: &[BlockRecord]) {
        let mut fresh = World::new(self.size);
        let mut ground_claimed = vec![false; fresh.cells.len()];

        for record in blocks {
            if record.r >= self.size || record.c >= self.size || record.z > MAX_ELEVATION {
                continue;
            }
            let index = record.r * self.size + record.c;
            let cell = &mut fresh.cells[index];

            if record.z == 0 && !ground_claimed[index] {
                ground_claimed[index] = true;
                cell.layers[0] = vec![record.name.clone()];
                continue;
            }

            while cell.layers.len() <= record.z {
                cell.layers.push(Vec::new());
            }
            let layer = &mut cell.layers[record.z];
            if !layer.contains(&record.name) {
                layer.push(record.name.clone());
            }
        }

        *self = fresh;
    }

    /// Block list form of the world, the inverse of [`World::rebuild`].
    pub fn to_blocks(&self) -> Vec<BlockRecord> {
        let mut blocks = Vec::with_capacity(self.cells.len());
        for (index, cell) in self.cells.iter().enumerate() {
            let (r, c) = (index / self.size, index % self.size);
            for (z, layer) in cell.layers.iter().enumerate() {
                for name in layer {
                    blocks.push(BlockRecord::new(r, c, z, name.as_str()));
                }
            }
        }
        blocks
    }

    /// Top elevation and all identifiers of the cell containing the
    /// continuous position `(r, c)`. Outside the grid reads as flat ground
    /// with nothing on it.
    pub fn probe(&self, r: f32, c: f32) -> (f32, Vec<&str>) {
        let (fr, fc) = (r.floor(), c.floor());
        let size = self.size as f32;
        if fr >= 0.0 && fc >= 0.0 && fr < size && fc < size {
            let cell = &self.cells[fr as usize * self.size + fc as usize];
            (cell.top() as f32, cell.blocks().collect())
        } else {
            (0.0, Vec::new())
        }
    }
}
