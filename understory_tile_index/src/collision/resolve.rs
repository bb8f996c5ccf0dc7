// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen-space sweep shared by the full and the per-tile passes.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kurbo::Point;

use super::{CollisionData, LayerTileKey, chain_boxes};
use crate::backend::Backend;
use crate::quadkey::TileSize;
use crate::types::{Aabb2D, min_t};

/// Maps collision space to screen pixels.
pub trait Projection {
    /// Project a point of the collision tile space at `level` (512 pixels per
    /// tile) to screen pixels.
    ///
    /// Returns `None` for points that have no screen position, such as points
    /// behind the camera.
    fn project(&self, x: f64, y: f64, z: f64, level: u8) -> Option<Point>;
}

impl<F> Projection for F
where
    F: Fn(f64, f64, f64, u8) -> Option<Point>,
{
    fn project(&self, x: f64, y: f64, z: f64, level: u8) -> Option<Point> {
        self(x, y, z, level)
    }
}

/// A layer tile currently on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VisibleTile<'a> {
    /// Layer identifier.
    pub layer: &'a str,
    /// Quadkey of the layer tile.
    pub quadkey: &'a str,
    /// Tile size of the layer.
    pub tile_size: TileSize,
}

/// What a screen-space pass needs to know about the current frame.
#[derive(Copy, Clone)]
pub struct ScreenView<'a> {
    /// Camera projection.
    pub projection: &'a dyn Projection,
    /// Layer tiles whose entries take part in the pass.
    pub tiles: &'a [VisibleTile<'a>],
}

impl fmt::Debug for ScreenView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenView")
            .field("tiles", &self.tiles)
            .finish_non_exhaustive()
    }
}

/// Outcome of a screen-space pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Entries that took part.
    pub candidates: usize,
    /// Entries left visible.
    pub visible: usize,
    /// Entries hidden.
    pub hidden: usize,
    /// Entries whose vertices had at least one visibility bit flipped.
    pub toggled: usize,
    /// True if any vertex data changed and needs re-upload.
    pub updated: bool,
}

/// An entry queued for the sweep, addressed by its place in the cache.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub(crate) cache_key: alloc::string::String,
    pub(crate) key: LayerTileKey,
    pub(crate) index: usize,
    priority: f64,
    map_aligned: bool,
    boxes: Option<Vec<Aabb2D>>,
}

impl Candidate {
    pub(crate) fn new(
        cache_key: &str,
        key: &LayerTileKey,
        index: usize,
        entry: &CollisionData,
        projection: &dyn Projection,
        padding: f64,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            key: key.clone(),
            index,
            priority: entry.priority,
            map_aligned: entry.is_map_aligned(),
            boxes: screen_boxes(entry, projection, padding),
        }
    }
}

/// Screen boxes of an entry under `projection`, or `None` if its anchor does
/// not project.
pub(crate) fn screen_boxes(
    entry: &CollisionData,
    projection: &dyn Projection,
    padding: f64,
) -> Option<Vec<Aabb2D>> {
    let p = projection.project(entry.anchor.x, entry.anchor.y, entry.cz, entry.level)?;
    let center = p + entry.offset;
    let single = || {
        vec![Aabb2D::from_center(center.x, center.y, entry.half_width, entry.half_height).inflate(padding)]
    };
    let Some(slope) = entry.slope.filter(|_| entry.is_chain()) else {
        return Some(single());
    };
    let ahead = entry.anchor + slope;
    let Some(q) = projection.project(ahead.x, ahead.y, entry.cz, entry.level) else {
        return Some(single());
    };
    let dir = q - p;
    if dir.hypot2() == 0.0 {
        return Some(single());
    }
    let side = min_t(entry.half_width, entry.half_height);
    Some(chain_boxes(center, dir.normalize(), entry.half_width, side))
}

/// Accepted screen boxes, kept in two sets: boxes of map-aligned entries and
/// boxes of viewport-aligned entries.
#[derive(Debug, Default)]
pub(crate) struct Sweep<B> {
    map: B,
    viewport: B,
    slots: usize,
}

impl<B: Backend + Default> Sweep<B> {
    pub(crate) fn new() -> Self {
        Self {
            map: B::default(),
            viewport: B::default(),
            slots: 0,
        }
    }

    fn blocked(&self, boxes: &[Aabb2D]) -> bool {
        boxes
            .iter()
            .any(|b| self.map.intersects_any(*b) || self.viewport.intersects_any(*b))
    }

    fn accept(&mut self, boxes: &[Aabb2D], map_aligned: bool) {
        let set = if map_aligned {
            &mut self.map
        } else {
            &mut self.viewport
        };
        for b in boxes {
            set.insert(self.slots, *b);
            self.slots += 1;
        }
    }

    /// Seed the sweep with an entry that already holds its place on screen.
    pub(crate) fn occupy(&mut self, candidate: &Candidate) {
        if let Some(boxes) = &candidate.boxes {
            self.accept(boxes, candidate.map_aligned);
        }
    }

    /// Sort candidates by priority (lower first, ties in queue order) and
    /// decide each one. The result is parallel to the sorted slice.
    pub(crate) fn run(&mut self, candidates: &mut [Candidate]) -> Vec<bool> {
        candidates.sort_by(|a, b| a.priority.total_cmp(&b.priority));
        candidates
            .iter()
            .map(|c| match &c.boxes {
                Some(boxes) if !self.blocked(boxes) => {
                    self.accept(boxes, c.map_aligned);
                    true
                }
                _ => false,
            })
            .collect()
    }
}
