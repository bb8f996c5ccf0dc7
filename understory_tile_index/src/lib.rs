// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tile_index --heading-base-level=0

//! Understory Tile Index: tile addressing and label collision for tiled vector maps.
//!
//! This crate holds the data structures a tiled map display needs to keep its
//! labels and icons from overlapping while tiles stream in and out:
//!
//! - [`quadkey`]: quadkey strings, [`TileCoord`] addresses, tile sizes, and the
//!   key folding that lets 256 and 512 pixel tile layers share one collision space.
//! - [`buffer`]: vertex attribute buffers in a generational [`BufferArena`], with a
//!   reserved visibility bit per vertex.
//! - [`collision`]: the two-phase [`CollisionHandler`]. Phase 1 rejects overlapping
//!   candidates per tile in world space; phase 2 re-resolves every visible entry in
//!   screen space, debounced, and flips visibility bits only where they change.
//!
//! The screen-space sweep stores accepted boxes in a pluggable [`Backend`]. The
//! default is a flat vector (linear scan); [`UniformGrid`] buckets boxes into cells
//! and pays off once a pass handles a few hundred boxes.
//!
//! # Example
//!
//! ```rust
//! use kurbo::Point;
//! use understory_tile_index::collision::{CollisionConfig, CollisionHandler, ScreenView, VisibleTile};
//! use understory_tile_index::{AttributeBuffer, BufferArena, BufferRange, TileSize};
//!
//! let mut arena = BufferArena::new();
//! let mut labels = AttributeBuffer::new(2);
//! for _ in 0..8 {
//!     labels.push_vertex(&[1, 0]);
//! }
//! let buffer = arena.insert(labels);
//!
//! let mut handler = CollisionHandler::new(CollisionConfig::default());
//! let mut batch = handler.init_tile("0", TileSize::Size512, "places").unwrap();
//! let a = batch.insert(100.0, 100.0, 0.0, 0.0, 0.0, 20.0, 6.0, Some(2.0), None).unwrap();
//! let b = batch.insert(160.0, 100.0, 0.0, 0.0, 0.0, 20.0, 6.0, Some(1.0), None).unwrap();
//! batch.attach(a, BufferRange { buffer, start: 0, stop: 4 });
//! batch.attach(b, BufferRange { buffer, start: 4, stop: 8 });
//! handler.complete_tile(batch);
//!
//! // Zoomed out to half scale, the labels overlap and the lower priority
//! // value keeps its place.
//! let half = |x: f64, y: f64, _z: f64, _level: u8| Some(Point::new(x / 2.0, y / 2.0));
//! let tiles = [VisibleTile { layer: "places", quadkey: "0", tile_size: TileSize::Size512 }];
//! let view = ScreenView { projection: &half, tiles: &tiles };
//! let res = handler.resolve(&view, &mut arena);
//! assert_eq!(res.hidden, 1);
//! assert_eq!(arena.get(buffer).unwrap().is_visible(0), Some(false));
//! assert_eq!(arena.get(buffer).unwrap().is_visible(4), Some(true));
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs in coordinates. Box intersection is closed: boxes
//! sharing only an edge or a corner collide.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod buffer;
pub mod collision;
pub mod quadkey;
pub mod types;

pub use backend::Backend;
pub use backends::{FlatVec, UniformGrid};
pub use buffer::{AttributeBuffer, BufferArena, BufferKey, BufferRange, Uploads};
pub use collision::{CollisionConfig, CollisionData, CollisionHandler, TileBatch};
pub use quadkey::{QuadkeyError, TileCoord, TileSize, tile_cache_key};
pub use types::Aabb2D;
