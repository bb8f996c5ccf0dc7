// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chunked conversion of tile features into buffers.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use kurbo::{Point, Vec2};
use understory_tile_index::collision::CollisionRef;
use understory_tile_index::{AttributeBuffer, TileBatch, TileCoord, TileSize};

use crate::extrude::{ExtrudeBuffers, Extrusion, add_extrude};
use crate::provider::{Feature, Geometry, Placement, StyleItem, Styler, TileData};
use crate::task::{Step, Task};

/// Components per label vertex: `kind | visible`, anchor `x, y`, corner
/// offset `dx, dy`.
pub const LABEL_STRIDE: usize = 5;

/// Counters reported when a build finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Features processed.
    pub features: usize,
    /// Labels and icons emitted.
    pub markers: usize,
    /// Labels and icons dropped by collision.
    pub rejected: usize,
    /// Extrusion walls emitted.
    pub walls: usize,
}

/// Everything a finished build hands back to the display.
#[derive(Debug)]
pub struct BuildOutput {
    /// Layer identifier.
    pub layer: String,
    /// Tile address.
    pub tile: TileCoord,
    /// Tile size of the layer.
    pub tile_size: TileSize,
    /// Label and icon quads.
    pub labels: AttributeBuffer,
    /// Triangle indices into `labels`.
    pub label_indices: Vec<u32>,
    /// Vertex ranges of colliding markers, to attach once `labels` has a key.
    pub ranges: Vec<(CollisionRef, Range<u32>)>,
    /// Extrusion walls.
    pub walls: ExtrudeBuffers,
    /// Collision registrations, if the build collided its markers.
    pub batch: Option<TileBatch>,
    /// Counters.
    pub stats: BuildStats,
}

/// Parameters shared by every build of a display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildSettings {
    /// Fractional zoom passed to the styler.
    pub zoom: f64,
    /// Features handled per [`Task::step`].
    pub features_per_step: usize,
    /// Extrusions at or below this height produce no walls.
    pub min_extrude_height: f64,
}

struct Markers {
    labels: AttributeBuffer,
    indices: Vec<u32>,
    ranges: Vec<(CollisionRef, Range<u32>)>,
    batch: Option<TileBatch>,
}

impl Markers {
    fn push(
        &mut self,
        code: i16,
        anchor: Point,
        slope: Option<Vec2>,
        placement: &Placement,
        stats: &mut BuildStats,
    ) {
        let collision = match (&mut self.batch, placement.collides) {
            (Some(batch), true) => {
                let accepted = batch.insert(
                    anchor.x,
                    anchor.y,
                    0.0,
                    placement.offset.x,
                    placement.offset.y,
                    placement.half_width,
                    placement.half_height,
                    placement.priority,
                    slope,
                );
                let Some(r) = accepted else {
                    stats.rejected += 1;
                    return;
                };
                Some(r)
            }
            _ => None,
        };

        let first = (code << 1) | 1;
        let (x, y) = (round_i16(anchor.x), round_i16(anchor.y));
        let (hw, hh) = (placement.half_width, placement.half_height);
        let o = placement.offset;
        let start = self.labels.vertex_count();
        let mut v = 0;
        for (sx, sy) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            v = self.labels.push_vertex(&[
                first,
                x,
                y,
                round_i16(o.x + sx * hw),
                round_i16(o.y + sy * hh),
            ]);
        }
        let v0 = v - 3;
        self.indices
            .extend([v0, v0 + 1, v0 + 2, v0 + 1, v0 + 3, v0 + 2]);
        if let Some(r) = collision {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "A tile's label buffer stays far below 2^32 vertices."
            )]
            let start = start as u32;
            self.ranges.push((r, start..v + 1));
        }
        stats.markers += 1;
    }
}

/// Builds the buffers of one layer tile, a few features per step.
pub struct BuildTask {
    layer: String,
    tile: TileCoord,
    tile_size: TileSize,
    features: Vec<Feature>,
    cursor: usize,
    settings: BuildSettings,
    styler: Rc<dyn Styler>,
    markers: Markers,
    walls: ExtrudeBuffers,
    stats: BuildStats,
}

impl fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTask")
            .field("layer", &self.layer)
            .field("tile", &self.tile)
            .field("tile_size", &self.tile_size)
            .field("cursor", &self.cursor)
            .field("features", &self.features.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BuildTask {
    /// Prepare a build. Markers are collision checked only when a `batch` is
    /// given.
    pub fn new(
        layer: &str,
        tile: TileCoord,
        tile_size: TileSize,
        data: TileData,
        styler: Rc<dyn Styler>,
        batch: Option<TileBatch>,
        settings: BuildSettings,
    ) -> Self {
        Self {
            layer: layer.into(),
            tile,
            tile_size,
            features: data.features,
            cursor: 0,
            settings,
            styler,
            markers: Markers {
                labels: AttributeBuffer::new(LABEL_STRIDE),
                indices: Vec::new(),
                ranges: Vec::new(),
                batch,
            },
            walls: ExtrudeBuffers::default(),
            stats: BuildStats::default(),
        }
    }

    /// Features left to process.
    pub fn remaining(&self) -> usize {
        self.features.len() - self.cursor
    }

    fn process(&mut self, index: usize) {
        let feature = &self.features[index];
        let extent = f64::from(self.tile_size.pixels());
        let items = self
            .styler
            .style(&self.layer, feature, self.settings.zoom);
        for item in &items {
            match item {
                StyleItem::Label { placement, .. } => {
                    if let Some((anchor, slope)) = anchor(&feature.geometry, extent) {
                        self.markers
                            .push(0, anchor, slope, placement, &mut self.stats);
                    }
                }
                StyleItem::Icon { icon, placement } => {
                    if let Some((anchor, _)) = anchor(&feature.geometry, extent) {
                        let code = i16::try_from(icon.saturating_add(1).min(0x3fff)).unwrap_or(0x3fff);
                        self.markers
                            .push(code, anchor, None, placement, &mut self.stats);
                    }
                }
                StyleItem::Extrude {
                    base,
                    height,
                    outline,
                } => {
                    if let Geometry::Polygon(rings) = &feature.geometry {
                        let extrusion = Extrusion {
                            base: *base,
                            height: *height,
                            min_height: self.settings.min_extrude_height,
                            outline: *outline,
                        };
                        self.stats.walls += add_extrude(&mut self.walls, rings, extent, &extrusion);
                    }
                }
            }
        }
        self.stats.features += 1;
    }
}

impl Task for BuildTask {
    type Output = BuildOutput;

    fn step(&mut self) -> Step {
        let end = (self.cursor + self.settings.features_per_step.max(1)).min(self.features.len());
        for i in self.cursor..end {
            self.process(i);
        }
        self.cursor = end;
        tracing::trace!(layer = %self.layer, remaining = self.remaining(), "build step");
        if self.cursor == self.features.len() {
            Step::Done
        } else {
            Step::Continue
        }
    }

    fn finish(self) -> BuildOutput {
        tracing::debug!(
            layer = %self.layer,
            quadkey = %self.tile.to_quadkey(),
            markers = self.stats.markers,
            rejected = self.stats.rejected,
            walls = self.stats.walls,
            "tile built"
        );
        BuildOutput {
            layer: self.layer,
            tile: self.tile,
            tile_size: self.tile_size,
            labels: self.markers.labels,
            label_indices: self.markers.indices,
            ranges: self.markers.ranges,
            walls: self.walls,
            batch: self.markers.batch,
            stats: self.stats,
        }
    }
}

/// Anchor of a feature's label inside the tile, with the line direction for
/// line geometry. Anchors outside `0..extent` belong to a neighbouring tile.
fn anchor(geometry: &Geometry, extent: f64) -> Option<(Point, Option<Vec2>)> {
    let (p, slope) = match geometry {
        Geometry::Point(p) => (*p, None),
        Geometry::LineString(points) => {
            let (a, b) = points
                .windows(2)
                .map(|w| (w[0], w[1]))
                .max_by(|x, y| (x.1 - x.0).hypot2().total_cmp(&(y.1 - y.0).hypot2()))?;
            let d = b - a;
            (a.midpoint(b), (d.hypot2() > 0.0).then(|| d.normalize()))
        }
        Geometry::Polygon(rings) => {
            let ring = rings.first().filter(|r| !r.is_empty())?;
            #[allow(clippy::cast_precision_loss, reason = "Ring lengths are small.")]
            let n = ring.len() as f64;
            let sum = ring.iter().fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
            ((sum / n).to_point(), None)
        }
    };
    let inside = (0.0..extent).contains(&p.x) && (0.0..extent).contains(&p.y);
    inside.then_some((p, slope))
}

fn round_i16(v: f64) -> i16 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Clamped to the i16 range first."
    )]
    let r = v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_tile_index::collision::{CollisionConfig, CollisionHandler};

    struct Fixed;

    impl Styler for Fixed {
        fn style(&self, _layer: &str, feature: &Feature, _zoom: f64) -> Vec<StyleItem> {
            match &feature.geometry {
                Geometry::Polygon(_) => vec![StyleItem::Extrude {
                    base: 0.0,
                    height: 20.0,
                    outline: false,
                }],
                Geometry::LineString(_) => vec![StyleItem::Label {
                    text: "Main St".into(),
                    placement: Placement::new(30.0, 5.0),
                }],
                Geometry::Point(_) => vec![StyleItem::Icon {
                    icon: 7,
                    placement: Placement::new(6.0, 6.0).with_priority(1.0),
                }],
            }
        }
    }

    fn settings(per_step: usize) -> BuildSettings {
        BuildSettings {
            zoom: 10.0,
            features_per_step: per_step,
            min_extrude_height: 0.01,
        }
    }

    fn data() -> TileData {
        TileData {
            features: vec![
                Feature::new(1, Geometry::Point(Point::new(100.0, 100.0))),
                Feature::new(2, Geometry::Point(Point::new(104.0, 102.0))),
                Feature::new(3, Geometry::Point(Point::new(600.0, 100.0))),
                Feature::new(
                    4,
                    Geometry::LineString(vec![
                        Point::new(200.0, 300.0),
                        Point::new(210.0, 300.0),
                        Point::new(310.0, 300.0),
                    ]),
                ),
                Feature::new(
                    5,
                    Geometry::Polygon(vec![vec![
                        Point::new(400.0, 400.0),
                        Point::new(450.0, 400.0),
                        Point::new(450.0, 450.0),
                        Point::new(400.0, 450.0),
                    ]]),
                ),
            ],
        }
    }

    fn run(task: &mut BuildTask) -> usize {
        let mut steps = 1;
        while task.step() == Step::Continue {
            steps += 1;
        }
        steps
    }

    #[test]
    fn builds_in_bounded_steps() {
        let tile = TileCoord::from_quadkey("0123").unwrap();
        let mut task = BuildTask::new("poi", tile, TileSize::Size512, data(), Rc::new(Fixed), None, settings(2));
        assert_eq!(run(&mut task), 3);
        let out = task.finish();
        assert_eq!(out.stats.features, 5);
        // Without a batch nothing collides; the point at x = 600 is outside.
        assert_eq!(out.stats.markers, 3);
        assert_eq!(out.labels.vertex_count(), 12);
        assert_eq!(out.label_indices.len(), 18);
        assert_eq!(out.stats.walls, 4);
        assert!(out.ranges.is_empty());
    }

    #[test]
    fn colliding_markers_are_dropped_and_ranges_recorded() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let tile = TileCoord::from_quadkey("0123").unwrap();
        let batch = handler.init_tile("0123", TileSize::Size512, "poi").unwrap();
        let mut task = BuildTask::new(
            "poi",
            tile,
            TileSize::Size512,
            data(),
            Rc::new(Fixed),
            Some(batch),
            settings(16),
        );
        assert_eq!(run(&mut task), 1);
        let out = task.finish();
        assert_eq!(out.stats.rejected, 1);
        assert_eq!(out.stats.markers, 2);
        assert_eq!(out.ranges.len(), 2);
        assert_eq!(out.ranges[0].1, 0..4);
        assert_eq!(out.ranges[1].1, 4..8);

        let batch = out.batch.unwrap();
        // The road label is a chain along its longest segment.
        let road = &batch.entries()[1];
        assert_eq!(road.slope, Some(Vec2::new(1.0, 0.0)));
        assert!(road.is_chain());
        assert_eq!(road.anchor, batch.to_world(260.0, 300.0));
    }

    #[test]
    fn vertices_carry_kind_and_visibility() {
        let tile = TileCoord::from_quadkey("0").unwrap();
        let data = TileData {
            features: vec![Feature::new(1, Geometry::Point(Point::new(10.0, 20.0)))],
        };
        let mut task = BuildTask::new("poi", tile, TileSize::Size256, data, Rc::new(Fixed), None, settings(4));
        run(&mut task);
        let out = task.finish();
        let v = &out.labels.data()[..LABEL_STRIDE];
        assert_eq!(v, &[(8 << 1) | 1, 10, 20, -6, -6]);
        assert_eq!(out.labels.is_visible(3), Some(true));
    }
}
