// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collision basics.
//!
//! Register labels for two neighbouring tiles, then zoom out and let the
//! screen-space pass hide the ones that end up overlapping.
//!
//! Run:
//! - `cargo run -p understory_tile_demos --example collision_basics`
//! - `RUST_LOG=trace cargo run -p understory_tile_demos --example collision_basics`

use kurbo::Point;
use tracing_subscriber::filter::LevelFilter;
use understory_tile_index::collision::{ScreenView, VisibleTile};
use understory_tile_index::{
    AttributeBuffer, BufferArena, BufferRange, CollisionConfig, CollisionHandler, TileSize,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .try_init();
}

fn main() {
    init_tracing();

    let mut handler = CollisionHandler::new(CollisionConfig::default());
    let mut arena = BufferArena::new();

    // Four vertices per label, all starting visible.
    let mut labels = AttributeBuffer::new(5);
    for _ in 0..16 {
        labels.push_vertex(&[1, 0, 0, 0, 0]);
    }
    let buffer = arena.insert(labels);
    let _ = arena.commit();

    // Tile "0" holds a town label near its right edge.
    let mut west = handler.init_tile("0", TileSize::Size512, "places").unwrap();
    let town = west
        .insert(500.0, 200.0, 0.0, 0.0, 0.0, 30.0, 8.0, Some(2.0), None)
        .unwrap();
    west.attach(town, BufferRange { buffer, start: 0, stop: 4 });
    handler.complete_tile(west);

    // Tile "1" is built later. Its city label would overlap the town across
    // the tile edge, so phase 1 rejects it against the neighbour's entries.
    let mut east = handler.init_tile("1", TileSize::Size512, "places").unwrap();
    let city = east.insert(10.0, 200.0, 0.0, 0.0, 0.0, 30.0, 8.0, Some(1.0), None);
    println!("city accepted in phase 1: {}", city.is_some());
    let village = east
        .insert(120.0, 200.0, 0.0, 0.0, 0.0, 25.0, 8.0, Some(5.0), None)
        .unwrap();
    let hamlet = east
        .insert(250.0, 200.0, 0.0, 0.0, 0.0, 20.0, 8.0, None, None)
        .unwrap();
    east.attach(village, BufferRange { buffer, start: 4, stop: 8 });
    east.attach(hamlet, BufferRange { buffer, start: 8, stop: 12 });
    handler.complete_tile(east);

    let tiles = [
        VisibleTile {
            layer: "places",
            quadkey: "0",
            tile_size: TileSize::Size512,
        },
        VisibleTile {
            layer: "places",
            quadkey: "1",
            tile_size: TileSize::Size512,
        },
    ];

    for scale in [1.0, 4.0, 16.0] {
        let project = move |x: f64, y: f64, _z: f64, _level: u8| Some(Point::new(x / scale, y / scale));
        let view = ScreenView {
            projection: &project,
            tiles: &tiles,
        };
        let res = handler.resolve(&view, &mut arena);
        let uploads = arena.commit();
        println!(
            "zoomed out x{scale}: {} candidates, {} visible, {} hidden, {} buffers to re-upload",
            res.candidates,
            res.visible,
            res.hidden,
            uploads.updated.len()
        );
        if let Some(data) = arena.get(buffer) {
            let shown: Vec<bool> = (0..3)
                .map(|label| data.is_visible(label * 4).unwrap_or(false))
                .collect();
            println!("  town, village, hamlet shown: {shown:?}");
        }
    }
}
