//! Durable storage for the canonical world
//!
//! The server only needs two operations: load whatever was saved last, and
//! save the current block list after every accepted edit.

use serde::{Deserialize, Serialize};
use shared::BlockRecord;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait WorldStore: Send {
    /// Returns the saved block list, or `None` when nothing was saved yet.
    fn load(&mut self) -> Result<Option<Vec<BlockRecord>>, StoreError>;

    fn save(&mut self, blocks: &[BlockRecord]) -> Result<(), StoreError>;
}

/// On-disk layout of a save file.
#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    blocks: Vec<BlockRecord>,
}

/// Keeps the world as a JSON file. Saves go through a sibling temp file and
/// a rename so a crash mid-write leaves the previous save intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WorldStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<Vec<BlockRecord>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        let save: SaveFile = serde_json::from_str(&text)?;
        Ok(Some(save.blocks))
    }

    fn save(&mut self, blocks: &[BlockRecord]) -> Result<(), StoreError> {
        let save = SaveFile {
            blocks: blocks.to_vec(),
        };
        let temp = self.temp_path();
        std::fs::write(&temp, serde_json::to_vec(&save)?)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// Keeps nothing across restarts. Remembers the last save for inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Option<Vec<BlockRecord>>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store as if a previous run had saved `blocks`.
    pub fn with_blocks(blocks: Vec<BlockRecord>) -> Self {
        Self {
            saved: Some(blocks),
            saves: 0,
        }
    }

    pub fn saved(&self) -> Option<&[BlockRecord]> {
        self.saved.as_deref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl WorldStore for MemoryStore {
    fn load(&mut self) -> Result<Option<Vec<BlockRecord>>, StoreError> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, blocks: &[BlockRecord]) -> Result<(), StoreError> {
        self.saved = Some(blocks.to_vec());
        self.saves += 1;
        Ok(())
    }
}
