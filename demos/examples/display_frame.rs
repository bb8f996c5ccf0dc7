// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display frame loop.
//!
//! Drive a display through a few frames: request the visible tiles, answer
//! them from a synthetic source, pan, and print the draw commands.
//!
//! Run:
//! - `cargo run -p understory_tile_demos --example display_frame`
//! - `RUST_LOG=understory_tile_display=debug cargo run -p understory_tile_demos --example display_frame`

use std::rc::Rc;
use std::time::Duration;

use kurbo::{Point, Size};
use tracing_subscriber::filter::LevelFilter;
use understory_tile_display::{
    Display, DisplayConfig, DrawCommand, Feature, Geometry, Layer, Placement, StyleItem, Styler,
    TileData, TileProvider, Transform,
};
use understory_tile_index::{TileCoord, TileSize};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Queues requests until the main loop answers them.
#[derive(Debug, Default)]
struct Pending(Vec<(String, TileCoord)>);

impl TileProvider for Pending {
    fn request(&mut self, layer: &str, tile: TileCoord, _tile_size: TileSize) {
        self.0.push((layer.to_owned(), tile));
    }

    fn cancel(&mut self, layer: &str, tile: TileCoord, _tile_size: TileSize) {
        self.0.retain(|(l, t)| !(l == layer && *t == tile));
    }
}

/// Labels every point with its `name` property and raises every polygon.
struct Names;

impl Styler for Names {
    fn style(&self, _layer: &str, feature: &Feature, _zoom: f64) -> Vec<StyleItem> {
        match &feature.geometry {
            Geometry::Point(_) => {
                let text = feature.properties.get("name").cloned().unwrap_or_default();
                let half_width = 4.0 * text.len() as f64;
                vec![StyleItem::Label {
                    text,
                    placement: Placement::new(half_width, 7.0).with_priority(feature.id as f64),
                }]
            }
            Geometry::Polygon(_) => vec![StyleItem::Extrude {
                base: 0.0,
                height: 20.0,
                outline: false,
            }],
            Geometry::LineString(_) => Vec::new(),
        }
    }
}

/// A grid of named points plus one building per tile.
fn synthesize(tile: TileCoord) -> TileData {
    let mut features = Vec::new();
    for i in 0..4_u32 {
        for j in 0..4_u32 {
            let at = Point::new(32.0 + 64.0 * f64::from(i), 32.0 + 64.0 * f64::from(j));
            features.push(
                Feature::new(u64::from(i * 4 + j), Geometry::Point(at))
                    .with_property("name", format!("{}-{i}{j}", tile.to_quadkey())),
            );
        }
    }
    let ring = vec![
        Point::new(100.0, 100.0),
        Point::new(150.0, 100.0),
        Point::new(150.0, 150.0),
        Point::new(100.0, 150.0),
        Point::new(100.0, 100.0),
    ];
    features.push(Feature::new(100, Geometry::Polygon(vec![ring])));
    TileData { features }
}

fn main() {
    init_tracing();

    let mut display = Display::new(DisplayConfig::default(), Pending::default(), Rc::new(Names));
    display
        .add_layer(0, Layer::new("places", TileSize::Size256))
        .unwrap();

    let viewport = Size::new(800.0, 600.0);
    let cameras = [
        Transform::new(Point::new(0.5, 0.5), 2.0, viewport),
        Transform::new(Point::new(0.55, 0.5), 2.0, viewport),
        Transform::new(Point::new(0.55, 0.5), 2.5, viewport).with_pitch(0.6),
    ];

    let mut now = Duration::ZERO;
    for camera in cameras {
        display.set_transform(camera, now);
        for _ in 0..4 {
            let frame = display.frame(now);
            let answers = std::mem::take(&mut display.provider_mut().0);
            for (layer, tile) in answers {
                let quadkey = tile.to_quadkey();
                let _ = display
                    .tile_loaded(&layer, &quadkey, TileSize::Size256, Ok(synthesize(tile)))
                    .unwrap();
            }
            let previews = frame
                .commands
                .iter()
                .filter(|c| matches!(c, DrawCommand::Preview { .. }))
                .count();
            println!(
                "t={:>4}ms: {} draws ({} previews), {} new label buffers, {} tasks pending",
                now.as_millis(),
                frame.commands.len(),
                previews,
                frame.uploads.added.len(),
                display.pending_tasks(),
            );
            now += Duration::from_millis(100);
        }
    }
    let buffers = display.arena().len();
    let collision_tiles = display.collision().cache().tile_count();
    tracing::info!(buffers, collision_tiles, "demo finished");
}
