// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layers collection.

use understory_tile_index::TileSize;

use crate::error::DisplayError;

/// An 8-bit RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Background color of a layer as a function of zoom.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Background {
    /// The layer does not paint a background.
    #[default]
    None,
    /// Same color at every zoom.
    Solid(Color),
    /// Step function: each stop applies from its zoom upward. Stops must be
    /// sorted by zoom; zooms below the first stop use the first color.
    Stops(Vec<(f64, Color)>),
}

impl Background {
    /// Color at `zoom`.
    pub fn at(&self, zoom: f64) -> Option<Color> {
        match self {
            Self::None => None,
            Self::Solid(c) => Some(*c),
            Self::Stops(stops) => stops
                .iter()
                .rev()
                .find(|(z, _)| *z <= zoom)
                .or(stops.first())
                .map(|(_, c)| *c),
        }
    }
}

/// A data layer drawn from tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Unique identifier.
    pub id: String,
    /// Hidden layers keep their buckets but are neither requested nor drawn.
    pub visible: bool,
    /// Tile granularity of the layer's source.
    pub tile_size: TileSize,
    /// Background, only used when the layer is the base layer.
    pub background: Background,
}

impl Layer {
    /// A visible layer without background.
    pub fn new(id: impl Into<String>, tile_size: TileSize) -> Self {
        Self {
            id: id.into(),
            visible: true,
            tile_size,
            background: Background::None,
        }
    }

    /// Set the background.
    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }
}

/// Ordered layers; index 0 is drawn first and controls the background.
#[derive(Clone, Debug, Default)]
pub struct Layers {
    layers: Vec<Layer>,
}

impl Layers {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `layer` at `index` (0 is the base layer).
    pub fn insert(&mut self, index: usize, layer: Layer) -> Result<(), DisplayError> {
        if self.index_of(&layer.id).is_some() {
            return Err(DisplayError::DuplicateLayer(layer.id));
        }
        if index > self.layers.len() {
            return Err(DisplayError::LayerIndexOutOfRange {
                index,
                len: self.layers.len(),
            });
        }
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Append `layer` on top.
    pub fn push(&mut self, layer: Layer) -> Result<(), DisplayError> {
        self.insert(self.layers.len(), layer)
    }

    /// Remove a layer, returning its former index and the layer.
    pub fn remove(&mut self, id: &str) -> Result<(usize, Layer), DisplayError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| DisplayError::UnknownLayer(id.into()))?;
        Ok((index, self.layers.remove(index)))
    }

    /// Position of a layer.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Look up a layer.
    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Show or hide a layer.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> Result<(), DisplayError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| DisplayError::UnknownLayer(id.into()))?;
        layer.visible = visible;
        Ok(())
    }

    /// Layers in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Visible layers in draw order.
    pub fn visible(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.visible)
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Background color from the base layer.
    pub fn background(&self, zoom: f64) -> Option<Color> {
        self.layers.first()?.background.at(zoom)
    }
}
