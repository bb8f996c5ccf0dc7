// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tile storage of committed collision entries.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use super::CollisionData;

/// Identifies the entries one layer registered for one tile.
///
/// Displays as `layer-quadkey`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerTileKey {
    /// Layer identifier.
    pub layer: String,
    /// Quadkey of the layer tile (not the collision tile).
    pub quadkey: String,
}

impl LayerTileKey {
    /// Build a key from its parts.
    pub fn new(layer: &str, quadkey: &str) -> Self {
        Self {
            layer: layer.into(),
            quadkey: quadkey.into(),
        }
    }
}

impl fmt::Display for LayerTileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.layer, self.quadkey)
    }
}

/// Collision tile cache: collision tile key → layer tile → entries.
///
/// At most one entry list exists per (collision tile, layer tile) pair;
/// committing a layer tile again replaces its previous list.
#[derive(Clone, Debug, Default)]
pub struct TileCollisionCache {
    tiles: BTreeMap<String, BTreeMap<LayerTileKey, Vec<CollisionData>>>,
}

impl TileCollisionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the entries of a layer tile, replacing any previous list.
    pub fn insert(&mut self, cache_key: &str, key: LayerTileKey, entries: Vec<CollisionData>) {
        self.tiles
            .entry(cache_key.into())
            .or_default()
            .insert(key, entries);
    }

    /// Drop the entries of a layer tile. Returns true if something was removed.
    pub fn remove(&mut self, cache_key: &str, key: &LayerTileKey) -> bool {
        let Some(layers) = self.tiles.get_mut(cache_key) else {
            return false;
        };
        let removed = layers.remove(key).is_some();
        if layers.is_empty() {
            self.tiles.remove(cache_key);
        }
        removed
    }

    /// Drop every entry list registered by `layer`, across all tiles.
    pub fn remove_layer(&mut self, layer: &str) -> usize {
        let mut removed = 0;
        self.tiles.retain(|_, layers| {
            let before = layers.len();
            layers.retain(|key, _| key.layer != layer);
            removed += before - layers.len();
            !layers.is_empty()
        });
        removed
    }

    /// Entry lists registered under a collision tile.
    pub fn layers<'a>(
        &'a self,
        cache_key: &str,
    ) -> impl Iterator<Item = (&'a LayerTileKey, &'a Vec<CollisionData>)> + use<'a> {
        self.tiles.get(cache_key).into_iter().flatten()
    }

    /// Entries of one layer tile.
    pub fn get(&self, cache_key: &str, key: &LayerTileKey) -> Option<&Vec<CollisionData>> {
        self.tiles.get(cache_key)?.get(key)
    }

    /// Mutable entries of one layer tile.
    pub fn get_mut(
        &mut self,
        cache_key: &str,
        key: &LayerTileKey,
    ) -> Option<&mut Vec<CollisionData>> {
        self.tiles.get_mut(cache_key)?.get_mut(key)
    }

    /// Number of collision tiles holding entries.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}
