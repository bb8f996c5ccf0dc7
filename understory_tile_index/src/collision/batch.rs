// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phase-1 registration batch for one layer tile.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use kurbo::{Point, Vec2};

use super::{
    CollisionConfig, CollisionData, CollisionRef, LOWEST_PRIORITY, LayerTileKey, chain_boxes,
};
use crate::buffer::BufferRange;
use crate::quadkey::{TileCoord, TileSize};
use crate::types::{Aabb2D, min_t};

/// Candidates accepted so far for one layer tile, plus the obstacles that
/// were registered around it when the batch was opened.
///
/// Created by [`CollisionHandler::init_tile`](super::CollisionHandler::init_tile)
/// and committed with [`CollisionHandler::complete_tile`](super::CollisionHandler::complete_tile).
/// The batch owns its state, so several tiles can be built in interleaved
/// steps.
#[derive(Clone, Debug)]
pub struct TileBatch {
    pub(crate) key: LayerTileKey,
    pub(crate) cache_key: String,
    tile: TileCoord,
    tile_size: TileSize,
    level: u8,
    origin: Point,
    scale: f64,
    obstacles: Vec<Aabb2D>,
    pub(crate) entries: Vec<CollisionData>,
    pub(crate) updated: bool,
    padding: f64,
    aspect_threshold: f64,
}

impl TileBatch {
    pub(crate) fn new(
        key: LayerTileKey,
        cache_key: String,
        tile: TileCoord,
        tile_size: TileSize,
        obstacles: Vec<Aabb2D>,
        config: &CollisionConfig,
    ) -> Self {
        // Collision space has 512 pixels per tile at the collision tile's
        // level. A 256 tile is one quarter of its parent, so its pixels map 1:1
        // after offsetting by its position; the level-0 256 tile has no parent
        // and is stretched over the level-0 512 tile instead.
        let (level, scale) = match tile_size {
            TileSize::Size512 => (tile.level, 1.0),
            TileSize::Size256 if tile.level > 0 => (tile.level - 1, 1.0),
            TileSize::Size256 => (0, 2.0),
        };
        let px = f64::from(tile_size.pixels()) * scale;
        Self {
            key,
            cache_key,
            tile,
            tile_size,
            level,
            origin: Point::new(f64::from(tile.x) * px, f64::from(tile.y) * px),
            scale,
            obstacles,
            entries: Vec::new(),
            updated: false,
            padding: config.box_padding,
            aspect_threshold: config.slope_aspect_threshold,
        }
    }

    /// Layer tile this batch registers.
    pub fn key(&self) -> &LayerTileKey {
        &self.key
    }

    /// Collision tile the batch commits into.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The layer tile's address.
    pub fn tile(&self) -> TileCoord {
        self.tile
    }

    /// The layer's tile size.
    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    /// Level of the collision tile.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Accepted entries.
    pub fn entries(&self) -> &[CollisionData] {
        &self.entries
    }

    /// Number of accepted entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was accepted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of boxes from neighbouring tiles and other layers.
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    /// Convert tile-local pixel coordinates into collision space.
    pub fn to_world(&self, cx: f64, cy: f64) -> Point {
        self.origin + Vec2::new(cx, cy) * self.scale
    }

    /// Offer a candidate placement.
    ///
    /// `cx`/`cy` are tile-local pixels, offsets and half extents are screen
    /// pixels. A `priority` of `None` means [`LOWEST_PRIORITY`]. A `slope`
    /// marks the candidate as aligned with a line running in that direction.
    ///
    /// Returns `None` (recording nothing) if any of the candidate's boxes
    /// intersects a box accepted earlier in this batch or an obstacle.
    pub fn insert(
        &mut self,
        cx: f64,
        cy: f64,
        cz: f64,
        offset_x: f64,
        offset_y: f64,
        half_width: f64,
        half_height: f64,
        priority: Option<f64>,
        slope: Option<Vec2>,
    ) -> Option<CollisionRef> {
        let anchor = self.to_world(cx, cy);
        let offset = Vec2::new(offset_x, offset_y);
        let slope = slope.filter(|s| s.hypot2() > 0.0).map(Vec2::normalize);
        let boxes = self.boxes_for(anchor + offset, half_width, half_height, slope);

        let blocked = boxes.iter().any(|b| {
            self.entries
                .iter()
                .flat_map(|e| e.boxes.iter())
                .chain(self.obstacles.iter())
                .any(|o| o.intersects(b))
        });
        if blocked {
            tracing::trace!(tile = %self.key, cx, cy, "collision candidate rejected");
            return None;
        }

        self.entries.push(CollisionData {
            anchor,
            cz,
            offset,
            half_width,
            half_height,
            priority: priority.unwrap_or(LOWEST_PRIORITY),
            slope,
            boxes,
            ranges: Vec::new(),
            level: self.level,
            visible: None,
        });
        self.updated = true;
        Some(CollisionRef::new(self.entries.len() - 1))
    }

    /// Attach the vertices drawn for an accepted entry.
    ///
    /// Returns false if `entry` does not belong to this batch.
    pub fn attach(&mut self, entry: CollisionRef, range: BufferRange) -> bool {
        match self.entries.get_mut(entry.idx()) {
            Some(e) => {
                e.ranges.push(range);
                true
            }
            None => false,
        }
    }

    fn boxes_for(
        &self,
        center: Point,
        half_width: f64,
        half_height: f64,
        slope: Option<Vec2>,
    ) -> Vec<Aabb2D> {
        if let Some(dir) = slope {
            let side = min_t(half_width, half_height);
            if side > 0.0 && half_width / half_height > self.aspect_threshold {
                return chain_boxes(center, dir, half_width, side);
            }
        }
        vec![Aabb2D::from_center(center.x, center.y, half_width, half_height).inflate(self.padding)]
    }
}
