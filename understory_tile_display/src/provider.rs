// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contracts with the data provider and the style evaluator, and the tile
//! data they exchange.

use std::collections::BTreeMap;

use kurbo::{Point, Vec2};
use understory_tile_index::{TileCoord, TileSize};

/// Tile-local geometry, in pixels of the layer's tile size (y down).
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// A single point.
    Point(Point),
    /// An open polyline.
    LineString(Vec<Point>),
    /// Exterior ring followed by holes.
    Polygon(Vec<Vec<Point>>),
}

/// One decoded feature of a tile.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Provider-assigned identifier.
    pub id: u64,
    /// Geometry.
    pub geometry: Geometry,
    /// Attributes consumed by the style evaluator.
    pub properties: BTreeMap<String, String>,
}

impl Feature {
    /// A feature without properties.
    pub fn new(id: u64, geometry: Geometry) -> Self {
        Self {
            id,
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Features of one layer tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileData {
    /// Features in draw order.
    pub features: Vec<Feature>,
}

/// Where and how a label or icon sits, and how it takes part in collision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Half width in pixels.
    pub half_width: f64,
    /// Half height in pixels.
    pub half_height: f64,
    /// Pixel offset from the anchor.
    pub offset: Vec2,
    /// Lower values win; `None` is the lowest priority.
    pub priority: Option<f64>,
    /// Items that do not collide are always drawn and never block others.
    pub collides: bool,
}

impl Placement {
    /// A colliding placement of the given half extents.
    pub fn new(half_width: f64, half_height: f64) -> Self {
        Self {
            half_width,
            half_height,
            offset: Vec2::ZERO,
            priority: None,
            collides: true,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Drawable produced by the style evaluator for a feature.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleItem {
    /// Text. On line geometry it follows the line.
    Label {
        /// Label text.
        text: String,
        /// Placement.
        placement: Placement,
    },
    /// Icon from the sprite sheet.
    Icon {
        /// Sprite index.
        icon: u16,
        /// Placement.
        placement: Placement,
    },
    /// Extruded walls for polygon geometry.
    Extrude {
        /// Bottom height.
        base: f64,
        /// Top height.
        height: f64,
        /// Also emit the top edge outline.
        outline: bool,
    },
}

/// Style evaluator.
pub trait Styler {
    /// Drawables for `feature` of `layer` at `zoom`. An empty list hides the
    /// feature.
    fn style(&self, layer: &str, feature: &Feature, zoom: f64) -> Vec<StyleItem>;
}

/// Source of tile data.
///
/// Requests are answered later, through
/// [`Display::tile_loaded`](crate::Display::tile_loaded).
pub trait TileProvider {
    /// Start loading a layer tile.
    fn request(&mut self, layer: &str, tile: TileCoord, tile_size: TileSize);

    /// The tile is no longer needed. Answers that arrive anyway are dropped.
    fn cancel(&mut self, layer: &str, tile: TileCoord, tile_size: TileSize) {
        let _ = (layer, tile, tile_size);
    }
}
