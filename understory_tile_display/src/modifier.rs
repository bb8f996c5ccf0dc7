// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning feature mutations into per-tile invalidation.
//!
//! Each [`FeatureEvent`] is planned against the buckets that are currently
//! cached for the event's layer. Only tiles whose bounds meet the feature's
//! bounds are touched. A geometry change is a diff of two tile sets:
//!
//! ```
//! use std::collections::BTreeSet;
//! use understory_tile_display::modifier::{ChangeKind, diff_tiles};
//! use understory_tile_display::BucketKey;
//! use understory_tile_index::TileSize;
//!
//! let key = |q: &str| BucketKey::new(q, TileSize::Size256);
//! let old: BTreeSet<_> = [key("00"), key("01")].into();
//! let new: BTreeSet<_> = [key("01"), key("10")].into();
//! let kinds: Vec<_> = diff_tiles("roads", &old, &new)
//!     .into_iter()
//!     .map(|c| (c.key.quadkey, c.kind))
//!     .collect();
//! assert_eq!(
//!     kinds,
//!     [
//!         ("00".to_string(), ChangeKind::Remove),
//!         ("01".to_string(), ChangeKind::Modify),
//!         ("10".to_string(), ChangeKind::Add),
//!     ]
//! );
//! ```

use std::collections::BTreeSet;

use understory_tile_index::quadkey::is_related;
use understory_tile_index::{Aabb2D, TileSize};

use crate::bucket::{BucketKey, BucketPool};

/// A mutation reported by the data provider. Bounds are normalized world
/// rectangles.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureEvent {
    /// A feature appeared.
    Added {
        /// Layer id.
        layer: String,
        /// Bounds of the new feature.
        bounds: Aabb2D,
    },
    /// A feature went away.
    Removed {
        /// Layer id.
        layer: String,
        /// Bounds the feature had.
        bounds: Aabb2D,
    },
    /// A feature's geometry moved or reshaped.
    GeometryChanged {
        /// Layer id.
        layer: String,
        /// Bounds before the change.
        old: Aabb2D,
        /// Bounds after the change.
        new: Aabb2D,
    },
    /// The style of a layer changed; every cached tile is rebuilt.
    StyleChanged {
        /// Layer id.
        layer: String,
    },
}

impl FeatureEvent {
    /// Layer the event belongs to.
    pub fn layer(&self) -> &str {
        match self {
            Self::Added { layer, .. }
            | Self::Removed { layer, .. }
            | Self::GeometryChanged { layer, .. }
            | Self::StyleChanged { layer } => layer,
        }
    }
}

/// What happened to a tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// The feature now covers the tile.
    Add,
    /// The feature no longer covers the tile.
    Remove,
    /// The feature covered the tile before and still does.
    Modify,
}

/// One tile to rebuild.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileChange {
    /// Layer id.
    pub layer: String,
    /// Affected bucket.
    pub key: BucketKey,
    /// Kind of change.
    pub kind: ChangeKind,
}

/// Cached tiles of `layer` at `tile_size` whose bounds meet `bounds`.
pub fn cached_tiles(
    pool: &BucketPool,
    layer: &str,
    tile_size: TileSize,
    bounds: &Aabb2D,
) -> BTreeSet<BucketKey> {
    pool.iter()
        .filter(|b| b.tile_size() == tile_size && b.layer(layer).is_some())
        .filter(|b| b.coord().bounds().intersects(bounds))
        .map(|b| b.key().clone())
        .collect()
}

/// Compare two tile sets: tiles only in `new` are added, tiles only in `old`
/// are removed, tiles in both are modified. Each tile appears once.
pub fn diff_tiles(
    layer: &str,
    old: &BTreeSet<BucketKey>,
    new: &BTreeSet<BucketKey>,
) -> Vec<TileChange> {
    let change = |key: &BucketKey, kind| TileChange {
        layer: layer.into(),
        key: key.clone(),
        kind,
    };
    let mut out: Vec<TileChange> = old
        .difference(new)
        .map(|k| change(k, ChangeKind::Remove))
        .chain(old.intersection(new).map(|k| change(k, ChangeKind::Modify)))
        .chain(new.difference(old).map(|k| change(k, ChangeKind::Add)))
        .collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Tiles touched by `event`, given the layer's tile size.
pub fn plan(event: &FeatureEvent, pool: &BucketPool, tile_size: TileSize) -> Vec<TileChange> {
    let layer = event.layer();
    let every = |bounds: &Aabb2D, kind: ChangeKind| -> Vec<TileChange> {
        cached_tiles(pool, layer, tile_size, bounds)
            .into_iter()
            .map(|key| TileChange {
                layer: layer.into(),
                key,
                kind,
            })
            .collect()
    };
    match event {
        FeatureEvent::Added { bounds, .. } => every(bounds, ChangeKind::Add),
        FeatureEvent::Removed { bounds, .. } => every(bounds, ChangeKind::Remove),
        FeatureEvent::GeometryChanged { old, new, .. } => diff_tiles(
            layer,
            &cached_tiles(pool, layer, tile_size, old),
            &cached_tiles(pool, layer, tile_size, new),
        ),
        FeatureEvent::StyleChanged { .. } => every(&Aabb2D::new(0.0, 0.0, 1.0, 1.0), ChangeKind::Modify),
    }
}

/// Buckets whose quadkey is an ancestor, descendant, or equal of any key in
/// `affected`. `None` selects every bucket.
pub fn related_buckets(pool: &BucketPool, affected: Option<&[&str]>) -> Vec<BucketKey> {
    pool.iter()
        .filter(|b| affected.is_none_or(|keys| keys.iter().any(|k| is_related(k, b.quadkey()))))
        .map(|b| b.key().clone())
        .collect()
}
