// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-phase label and icon collision detection for tiled maps.
//!
//! ## Phase 1: world space, per tile
//!
//! While a tile layer is being built, every candidate placement is offered to
//! a [`TileBatch`] opened with [`CollisionHandler::init_tile`]. The batch
//! rejects candidates overlapping anything it accepted already or anything
//! registered by the 8 same-level neighbours and by other layers of the same
//! collision tile. [`CollisionHandler::complete_tile`] commits the batch into
//! the tile cache.
//!
//! ## Phase 2: screen space, viewport wide
//!
//! Whenever the camera or the set of registered tiles changes, call
//! [`CollisionHandler::update`]. The first update schedules a pass one debounce
//! delay later and further updates leave it in place. When it is due,
//! [`CollisionHandler::poll`] says so and [`CollisionHandler::resolve`]
//! re-projects every visible entry, sweeps them in priority order, and flips
//! the visibility bit of the vertices of each entry whose outcome changed.
//!
//! ```
//! use understory_tile_index::collision::{CollisionConfig, CollisionHandler};
//! use understory_tile_index::quadkey::TileSize;
//!
//! let mut handler = CollisionHandler::new(CollisionConfig::default());
//! let mut batch = handler.init_tile("0123", TileSize::Size512, "pois").unwrap();
//! let a = batch.insert(10.0, 10.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(1.0), None);
//! let b = batch.insert(12.0, 12.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(2.0), None);
//! assert!(a.is_some());
//! assert!(b.is_none());
//! handler.complete_tile(batch);
//! ```

mod batch;
mod cache;
mod handler;
mod resolve;

use alloc::vec::Vec;
use core::time::Duration;
use kurbo::{Point, Vec2};

use crate::buffer::BufferRange;
use crate::types::{Aabb2D, ceil_to_i64};

pub use batch::TileBatch;
pub use cache::{LayerTileKey, TileCollisionCache};
pub use handler::CollisionHandler;
pub use resolve::{Projection, Resolution, ScreenView, VisibleTile};

/// Tunables for collision detection.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CollisionConfig {
    /// Quiet period after the latest [`CollisionHandler::update`] before a
    /// screen-space pass runs.
    pub debounce: Duration,
    /// Same-level ring of neighbour tiles consulted in phase 1; 1 means the 8
    /// adjacent tiles.
    pub neighbour_radius: u32,
    /// Pixels added on every side of single boxes.
    pub box_padding: f64,
    /// Width to height ratio above which slope-aligned candidates become a
    /// chain of square boxes.
    pub slope_aspect_threshold: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            neighbour_radius: 1,
            box_padding: 4.0,
            slope_aspect_threshold: 1.5,
        }
    }
}

/// Lowest priority; used when a style does not provide one.
pub const LOWEST_PRIORITY: f64 = f64::MAX;

/// Handle to an accepted entry within a [`TileBatch`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollisionRef(u32);

impl CollisionRef {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "A tile batch never holds 2^32 candidates."
    )]
    pub(crate) const fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One accepted label or icon placement.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionData {
    /// Anchor in collision world space (512 pixels per tile at `level`).
    pub anchor: Point,
    /// Anchor height above the ground in collision world pixels, forwarded
    /// to the projection.
    pub cz: f64,
    /// Screen pixel offset applied after projecting the anchor.
    pub offset: Vec2,
    /// Half width in pixels, before padding.
    pub half_width: f64,
    /// Half height in pixels, before padding.
    pub half_height: f64,
    /// Lower values win.
    pub priority: f64,
    /// Unit direction for map-aligned placements along a line.
    pub slope: Option<Vec2>,
    /// World-space boxes checked in phase 1: one box, or a chain for
    /// elongated slope-aligned placements.
    pub boxes: Vec<Aabb2D>,
    /// Vertices whose visibility bit follows this entry's outcome.
    pub ranges: Vec<BufferRange>,
    /// Level of the collision tile the entry belongs to.
    pub level: u8,
    /// Outcome of the latest screen-space pass, if any.
    pub visible: Option<bool>,
}

impl CollisionData {
    /// True if the entry is laid out as a chain of square boxes.
    pub fn is_chain(&self) -> bool {
        self.boxes.len() > 1
    }

    /// True if the entry rotates with the map.
    pub fn is_map_aligned(&self) -> bool {
        self.slope.is_some()
    }
}

/// Squares of half side `side` strung along the unit vector `dir`, spread
/// evenly so the chain ends exactly `half_width` either side of `center`.
pub(crate) fn chain_boxes(center: Point, dir: Vec2, half_width: f64, side: f64) -> Vec<Aabb2D> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Ratio of two positive extents, clamped to at least 1."
    )]
    let count = ceil_to_i64(half_width / side).max(1) as usize;
    let reach = half_width - side;
    let step = if count > 1 {
        2.0 * reach / (count - 1) as f64
    } else {
        0.0
    };
    (0..count)
        .map(|i| {
            let along = if count > 1 { -reach + step * i as f64 } else { 0.0 };
            let c = center + dir * along;
            Aabb2D::from_center(c.x, c.y, side, side)
        })
        .collect()
}

