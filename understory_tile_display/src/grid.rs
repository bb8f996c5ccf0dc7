// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visible tile computation.

use kurbo::{Point, Vec2};
use understory_tile_index::quadkey::{MAX_LEVEL, tiles_in_rect};
use understory_tile_index::{TileCoord, TileSize};

use crate::transform::{TILE_PIXELS, Transform};

/// Grid tunables.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridConfig {
    /// Pitch (radians) beyond which coverage stops growing toward the horizon.
    pub max_pitch: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_pitch: 50_f64.to_radians(),
        }
    }
}

/// A tile as placed on screen for the current transform.
///
/// Screen tiles are recomputed on every transform change and are not owned
/// by buckets.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenTile {
    /// Tile address.
    pub coord: TileCoord,
    /// Quadkey of `coord`.
    pub quadkey: String,
    /// Tile size of the layers drawing this tile.
    pub tile_size: TileSize,
    /// Top-left corner in screen pixels, before pitch is applied.
    pub origin: Point,
    /// Drawn size relative to the tile's nominal pixel size.
    pub scale: f64,
    /// Distance from the tile centre to the camera centre, in tiles.
    pub distance: f64,
}

/// Tile level drawn at `zoom` for layers of `tile_size`.
pub fn tile_level(zoom: f64, tile_size: TileSize) -> u8 {
    let z = zoom.floor() - f64::from(tile_size.level_offset());
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Clamped to 0..=MAX_LEVEL first."
    )]
    let level = z.clamp(0.0, f64::from(MAX_LEVEL)) as u8;
    level
}

/// Computes the tiles covering the viewport.
#[derive(Clone, Copy, Debug, Default)]
pub struct Grid {
    config: GridConfig,
}

impl Grid {
    /// Create a grid.
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Tiles of `tile_size` needed to cover the viewport, nearest to the
    /// viewport centre first.
    pub fn tiles(&self, transform: &Transform, tile_size: TileSize) -> Vec<ScreenTile> {
        let level = tile_level(transform.zoom, tile_size);
        let per_axis = f64::from(level).exp2();
        let tile_pixels = transform.world_size() / per_axis;
        let scale = tile_pixels / f64::from(tile_size.pixels());
        let rect = transform.coverage(self.config.max_pitch);
        let (sin, cos) = (-transform.rotation).sin_cos();
        let half = Vec2::new(transform.viewport.width / 2.0, transform.viewport.height / 2.0);

        let mut tiles: Vec<ScreenTile> = tiles_in_rect(level, rect)
            .into_iter()
            .map(|coord| {
                let corner = Point::new(f64::from(coord.x) / per_axis, f64::from(coord.y) / per_axis);
                let g = (corner - transform.center) * transform.world_size();
                let flat = Vec2::new(g.x * cos - g.y * sin, g.x * sin + g.y * cos) + half;
                let centre = corner + Vec2::new(0.5, 0.5) / per_axis;
                ScreenTile {
                    coord,
                    quadkey: coord.to_quadkey(),
                    tile_size,
                    origin: flat.to_point(),
                    scale,
                    distance: (centre - transform.center).hypot() * per_axis,
                }
            })
            .collect();
        tiles.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.quadkey.cmp(&b.quadkey))
        });
        tracing::trace!(level, count = tiles.len(), ?tile_size, "grid computed");
        tiles
    }
}

/// Pixel size a tile of `tile_size` would have at integer zoom; shared by
/// 256 tiles at `z` and 512 tiles at `z - 1`.
pub fn nominal_pixels(tile_size: TileSize) -> f64 {
    TILE_PIXELS * f64::from(tile_size.level_offset()).exp2()
}
