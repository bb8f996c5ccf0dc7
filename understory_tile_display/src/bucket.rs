// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tile render state and the pool that owns it.

use std::collections::BTreeMap;

use understory_tile_index::{BufferKey, TileCoord, TileSize};

use crate::error::LoadError;
use crate::extrude::ExtrudeBuffers;
use crate::task::TaskId;

bitflags::bitflags! {
    /// State of one layer within a bucket.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LayerFlags: u8 {
        /// Buffers are built and may be drawn.
        const READY     = 0b0000_0001;
        /// A build task is running.
        const BUSY      = 0b0000_0010;
        /// Loading failed; see [`LayerState::error`].
        const ERROR     = 0b0000_0100;
        /// Data was requested from the provider and has not arrived.
        const REQUESTED = 0b0000_1000;
        /// The data changed since the buffers were built.
        const OUTDATED  = 0b0001_0000;
    }
}

/// Built geometry of one layer tile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerBuffers {
    /// Label and icon quads, in the display's buffer arena.
    pub labels: Option<BufferKey>,
    /// Triangle indices into the label buffer.
    pub label_indices: Vec<u32>,
    /// Extrusion walls.
    pub walls: ExtrudeBuffers,
}

/// Per-layer state of a bucket.
#[derive(Clone, Debug, Default)]
pub struct LayerState {
    /// Readiness and activity.
    pub flags: LayerFlags,
    /// Build task in flight.
    pub task: Option<TaskId>,
    /// Buffers of the latest applied build.
    pub buffers: Option<LayerBuffers>,
    /// Latest load failure.
    pub error: Option<LoadError>,
}

/// Identifies a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// Tile quadkey.
    pub quadkey: String,
    /// Tile size granularity.
    pub tile_size: TileSize,
}

impl BucketKey {
    /// Build a key.
    pub fn new(quadkey: &str, tile_size: TileSize) -> Self {
        Self {
            quadkey: quadkey.into(),
            tile_size,
        }
    }
}

/// Rendering state for one tile at one tile size.
#[derive(Clone, Debug)]
pub struct Bucket {
    coord: TileCoord,
    key: BucketKey,
    created: u64,
    layers: BTreeMap<String, LayerState>,
}

impl Bucket {
    /// Tile address.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Pool key.
    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Tile quadkey.
    pub fn quadkey(&self) -> &str {
        &self.key.quadkey
    }

    /// Tile size granularity.
    pub fn tile_size(&self) -> TileSize {
        self.key.tile_size
    }

    /// Creation order; lower is older.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// State of a layer, if it was ever touched.
    pub fn layer(&self, layer: &str) -> Option<&LayerState> {
        self.layers.get(layer)
    }

    /// State of a layer, created on demand.
    pub fn layer_mut(&mut self, layer: &str) -> &mut LayerState {
        self.layers.entry(layer.into()).or_default()
    }

    /// State of a layer, if it was ever touched, mutably.
    pub fn layer_state_mut(&mut self, layer: &str) -> Option<&mut LayerState> {
        self.layers.get_mut(layer)
    }

    /// Forget a layer.
    pub fn remove_layer(&mut self, layer: &str) -> Option<LayerState> {
        self.layers.remove(layer)
    }

    /// All layer states.
    pub fn layers(&self) -> impl Iterator<Item = (&str, &LayerState)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All layer states, mutably.
    pub fn layers_mut(&mut self) -> impl Iterator<Item = (&str, &mut LayerState)> {
        self.layers.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// True if `layer` has buffers ready to draw.
    pub fn is_ready(&self, layer: &str) -> bool {
        self.layer(layer)
            .is_some_and(|s| s.flags.contains(LayerFlags::READY))
    }

    /// True if any layer is building.
    pub fn is_busy(&self) -> bool {
        self.layers
            .values()
            .any(|s| s.flags.contains(LayerFlags::BUSY))
    }
}

/// Owns buckets by quadkey and tile size.
#[derive(Clone, Debug)]
pub struct BucketPool {
    buckets: BTreeMap<BucketKey, Bucket>,
    next_created: u64,
    capacity: usize,
}

impl BucketPool {
    /// Pool that starts evicting past `capacity` buckets.
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            next_created: 0,
            capacity,
        }
    }

    /// Eviction threshold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The bucket for a tile, created if missing. Never creates two buckets
    /// for the same key.
    pub fn get_or_create(&mut self, coord: TileCoord, tile_size: TileSize) -> &mut Bucket {
        let key = BucketKey::new(&coord.to_quadkey(), tile_size);
        let next = &mut self.next_created;
        self.buckets.entry(key.clone()).or_insert_with(|| {
            let created = *next;
            *next += 1;
            tracing::debug!(quadkey = %key.quadkey, ?tile_size, "bucket created");
            Bucket {
                coord,
                key,
                created,
                layers: BTreeMap::new(),
            }
        })
    }

    /// Look up a bucket.
    pub fn get(&self, quadkey: &str, tile_size: TileSize) -> Option<&Bucket> {
        self.buckets.get(&BucketKey::new(quadkey, tile_size))
    }

    /// Look up a bucket mutably.
    pub fn get_mut(&mut self, quadkey: &str, tile_size: TileSize) -> Option<&mut Bucket> {
        self.buckets.get_mut(&BucketKey::new(quadkey, tile_size))
    }

    /// Remove a bucket.
    pub fn remove(&mut self, key: &BucketKey) -> Option<Bucket> {
        self.buckets.remove(key)
    }

    /// All buckets, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    /// All buckets, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bucket> {
        self.buckets.values_mut()
    }

    /// Remove the oldest buckets until the pool is within capacity.
    ///
    /// Busy buckets and buckets for which `keep` returns true are never
    /// evicted, so the pool may stay above capacity.
    pub fn evict(&mut self, keep: impl Fn(&BucketKey) -> bool) -> Vec<Bucket> {
        let excess = self.buckets.len().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }
        let mut candidates: Vec<(u64, BucketKey)> = self
            .buckets
            .values()
            .filter(|b| !b.is_busy() && !keep(&b.key))
            .map(|b| (b.created, b.key.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(created, _)| *created);
        let evicted: Vec<Bucket> = candidates
            .into_iter()
            .take(excess)
            .filter_map(|(_, key)| self.buckets.remove(&key))
            .collect();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), remaining = self.buckets.len(), "buckets evicted");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(q: &str) -> TileCoord {
        TileCoord::from_quadkey(q).unwrap()
    }

    #[test]
    fn one_bucket_per_key() {
        let mut pool = BucketPool::new(8);
        let first = pool.get_or_create(coord("03"), TileSize::Size256).created();
        pool.get_or_create(coord("03"), TileSize::Size256)
            .layer_mut("roads")
            .flags |= LayerFlags::READY;
        assert_eq!(pool.len(), 1);
        let again = pool.get("03", TileSize::Size256).unwrap();
        assert_eq!(again.created(), first);
        assert!(again.is_ready("roads"));
        assert!(!again.is_ready("pois"));

        pool.get_or_create(coord("03"), TileSize::Size512);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn eviction_takes_oldest_idle_unkept() {
        let mut pool = BucketPool::new(2);
        for q in ["0", "1", "2", "3"] {
            pool.get_or_create(coord(q), TileSize::Size256);
        }
        pool.get_mut("0", TileSize::Size256)
            .unwrap()
            .layer_mut("a")
            .flags |= LayerFlags::BUSY;
        let evicted = pool.evict(|k| k.quadkey == "1");
        let keys: Vec<_> = evicted.iter().map(Bucket::quadkey).collect();
        assert_eq!(keys, ["2", "3"]);
        assert_eq!(pool.len(), 2);
        assert!(pool.evict(|_| false).is_empty());
    }

    #[test]
    fn eviction_may_leave_pool_over_capacity() {
        let mut pool = BucketPool::new(1);
        for q in ["0", "1", "2"] {
            pool.get_or_create(coord(q), TileSize::Size512);
        }
        let evicted = pool.evict(|k| k.quadkey != "2");
        assert_eq!(evicted.len(), 1);
        assert_eq!(pool.len(), 2);
    }
}
