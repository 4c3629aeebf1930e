//! Semantic classes of block identifiers as seen by vehicles

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Road,
    Ramp,
    Overpass,
    #[default]
    Plain,
}

impl TileKind {
    /// Ramps and overpasses are part of the road network as well.
    pub fn is_roadway(self) -> bool {
        !matches!(self, TileKind::Plain)
    }
}

/// Lookup from block identifier to its class.
pub trait TileClassifier {
    fn classify(&self, block: &str) -> TileKind;
}

/// Static classification table. Unlisted identifiers are plain terrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileTable {
    kinds: HashMap<String, TileKind>,
}

impl TileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gameplay configuration the stock block set ships with.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for i in 1..20 {
            table.insert(format!("block{}", i), TileKind::Road);
        }
        for id in ["block5", "block6", "block10"] {
            table.insert(id, TileKind::Overpass);
        }
        for id in ["block7", "block8", "block20", "block21"] {
            table.insert(id, TileKind::Ramp);
        }
        table
    }

    pub fn insert(&mut self, block: impl Into<String>, kind: TileKind) {
        self.kinds.insert(block.into(), kind);
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl TileClassifier for TileTable {
    fn classify(&self, block: &str) -> TileKind {
        self.kinds.get(block).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let table = TileTable::standard();
        assert_eq!(table.classify("block1"), TileKind::Road);
        assert_eq!(table.classify("block19"), TileKind::Road);
        assert_eq!(table.classify("block7"), TileKind::Ramp);
        assert_eq!(table.classify("block21"), TileKind::Ramp);
        assert_eq!(table.classify("block6"), TileKind::Overpass);
        assert_eq!(table.classify("grass"), TileKind::Plain);
        assert_eq!(table.classify("block22"), TileKind::Plain);
    }

    #[test]
    fn test_roadway_classes() {
        assert!(TileKind::Road.is_roadway());
        assert!(TileKind::Ramp.is_roadway());
        assert!(TileKind::Overpass.is_roadway());
        assert!(!TileKind::Plain.is_roadway());
    }

    #[test]
    fn test_custom_table() {
        let mut table = TileTable::new();
        assert!(table.is_empty());
        table.insert("bridge", TileKind::Overpass);
        assert_eq!(table.len(), 1);
        assert_eq!(table.classify("bridge"), TileKind::Overpass);
        assert_eq!(table.classify("block1"), TileKind::Plain);
    }
}
