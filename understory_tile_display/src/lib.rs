// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tile_display --heading-base-level=0

//! Understory Tile Display: streams vector map tiles into render buffers.
//!
//! The display keeps a live, panned, zoomed, rotated, and pitched map covered
//! by tiles while their data loads and changes underneath it. It is built on
//! [`understory_tile_index`], which supplies tile addressing, the label buffer
//! arena, and collision detection.
//!
//! - [`Grid`] computes the tiles covering the viewport for a [`Transform`], at
//!   256 or 512 pixel granularity, clipped toward the horizon at steep pitch.
//! - [`BucketPool`] owns per-tile render state: per-layer readiness flags, the
//!   build task in flight, and the built buffers. Old off-screen buckets are
//!   evicted once the pool grows past its capacity.
//! - [`BuildTask`] turns a tile's features into label quads and extrusion
//!   walls a few features at a time, registering labels with the collision
//!   handler as it goes. The [`Scheduler`] runs tasks cooperatively and
//!   reports cancelled and outdated results so they can be discarded.
//! - [`modifier`] maps feature mutations onto the cached tiles they touch.
//! - [`Display`] drives all of it, one [`Display::frame`] at a time.
//!
//! Rendering itself is left to the host: a [`Frame`] lists draw commands in
//! layer order and the label buffers to upload.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use kurbo::{Point, Size};
//! use understory_tile_display::{
//!     Display, DisplayConfig, Feature, Layer, StyleItem, Styler, TileData, TileProvider,
//!     Transform,
//! };
//! use understory_tile_index::{TileCoord, TileSize};
//!
//! #[derive(Default)]
//! struct Requests(Vec<String>);
//!
//! impl TileProvider for Requests {
//!     fn request(&mut self, _layer: &str, tile: TileCoord, _tile_size: TileSize) {
//!         self.0.push(tile.to_quadkey());
//!     }
//! }
//!
//! struct Unstyled;
//!
//! impl Styler for Unstyled {
//!     fn style(&self, _layer: &str, _feature: &Feature, _zoom: f64) -> Vec<StyleItem> {
//!         Vec::new()
//!     }
//! }
//!
//! let mut display = Display::new(DisplayConfig::default(), Requests::default(), Rc::new(Unstyled));
//! display.add_layer(0, Layer::new("roads", TileSize::Size256)).unwrap();
//! let camera = Transform::new(Point::new(0.5, 0.5), 1.0, Size::new(512.0, 512.0));
//! display.set_transform(camera, Duration::ZERO);
//!
//! // The first frame asks for the four level-1 tiles.
//! display.frame(Duration::ZERO);
//! assert_eq!(display.provider().0.len(), 4);
//!
//! // Once one of them arrives and is built, it is drawn.
//! let started = display
//!     .tile_loaded("roads", "0", TileSize::Size256, Ok(TileData::default()))
//!     .unwrap();
//! assert!(started);
//! let frame = display.frame(Duration::from_millis(16));
//! assert_eq!(frame.commands.len(), 1);
//! ```

pub mod bucket;
pub mod build;
pub mod decode;
pub mod display;
pub mod error;
pub mod extrude;
pub mod grid;
pub mod layer;
pub mod modifier;
pub mod provider;
pub mod task;
pub mod transform;

pub use bucket::{Bucket, BucketKey, BucketPool, LayerBuffers, LayerFlags, LayerState};
pub use build::{BuildOutput, BuildSettings, BuildStats, BuildTask};
pub use display::{Display, DisplayConfig, DrawCommand, Frame};
pub use error::{DisplayError, LoadError};
pub use extrude::{ExtrudeBuffers, Extrusion, add_extrude};
pub use grid::{Grid, GridConfig, ScreenTile};
pub use layer::{Background, Color, Layer, Layers};
pub use modifier::{ChangeKind, FeatureEvent, TileChange};
pub use provider::{Feature, Geometry, Placement, StyleItem, Styler, TileData, TileProvider};
pub use task::{Scheduler, Step, Task, TaskId, TaskKey};
pub use transform::{CollisionProjection, Transform};
