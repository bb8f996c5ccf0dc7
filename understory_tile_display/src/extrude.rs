// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Side walls for extruded polygons.
//!
//! Rings are tile-local pixel coordinates (y down). Each kept edge becomes a
//! quad of four vertices (bottom and top at both endpoints) with a normal
//! perpendicular to the wall, pointing away from the solid: outward for the
//! exterior ring and into the hole for interior rings.

use kurbo::{Point, Vec2};
use understory_tile_index::Aabb2D;

/// Extrusion heights below this are not worth drawing walls for.
pub const MIN_EXTRUDE_HEIGHT: f64 = 0.01;

/// Wall geometry for one tile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtrudeBuffers {
    /// `x, y, z` per vertex.
    pub positions: Vec<i16>,
    /// `nx, ny` per vertex, scaled to `-127..=127`.
    pub normals: Vec<i8>,
    /// Two triangles per wall.
    pub indices: Vec<u32>,
    /// Top edge of each wall as a line segment, when requested.
    pub outline: Vec<u32>,
}

impl ExtrudeBuffers {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// True if no wall was added.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Parameters of one extruded polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extrusion {
    /// Height of the wall bottoms.
    pub base: f64,
    /// Height of the wall tops.
    pub height: f64,
    /// Heights at or below this produce no walls.
    pub min_height: f64,
    /// Also emit the top edge of each wall into [`ExtrudeBuffers::outline`].
    pub outline: bool,
}

impl Extrusion {
    /// Walls from the ground up to `height`.
    pub fn new(height: f64) -> Self {
        Self {
            base: 0.0,
            height,
            min_height: MIN_EXTRUDE_HEIGHT,
            outline: false,
        }
    }
}

/// Signed area of a ring (shoelace). Positive for rings running clockwise on
/// screen, since y grows downward.
pub fn signed_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Append the walls of a polygon. `rings[0]` is the exterior, the rest are
/// holes. `extent` is the tile size in pixels. Returns the number of walls.
///
/// Edges whose endpoints round to the same pixel are skipped, as are edges
/// lying entirely outside the tile. Zero-area rings produce nothing.
pub fn add_extrude(
    out: &mut ExtrudeBuffers,
    rings: &[Vec<Point>],
    extent: f64,
    extrusion: &Extrusion,
) -> usize {
    if extrusion.height <= extrusion.min_height {
        return 0;
    }
    let Some(exterior) = rings.first() else {
        return 0;
    };
    if signed_area(exterior) == 0.0 {
        return 0;
    }
    let tile = Aabb2D::new(0.0, 0.0, extent, extent);
    let (z0, z1) = (to_i16(extrusion.base), to_i16(extrusion.height));
    let mut walls = 0;

    for (r, ring) in rings.iter().enumerate() {
        let area = signed_area(ring);
        if area == 0.0 {
            continue;
        }
        let side = if (area > 0.0) == (r == 0) { 1.0 } else { -1.0 };
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[(i + 1) % ring.len()]);
            let (ax, ay, bx, by) = (to_i16(a.x), to_i16(a.y), to_i16(b.x), to_i16(b.y));
            if (ax, ay) == (bx, by) {
                continue;
            }
            let edge = Aabb2D::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y));
            if !edge.intersects(&tile) {
                continue;
            }
            let d = b - a;
            let n = Vec2::new(d.y, -d.x).normalize() * side;
            let normal = [to_i8(n.x * 127.0), to_i8(n.y * 127.0)];

            #[allow(
                clippy::cast_possible_truncation,
                reason = "A tile's wall buffer stays far below 2^32 vertices."
            )]
            let v = out.vertex_count() as u32;
            for (x, y, z) in [(ax, ay, z0), (bx, by, z0), (ax, ay, z1), (bx, by, z1)] {
                out.positions.extend([x, y, z]);
                out.normals.extend(normal);
            }
            if side > 0.0 {
                out.indices.extend([v, v + 1, v + 2, v + 1, v + 3, v + 2]);
            } else {
                out.indices.extend([v, v + 2, v + 1, v + 1, v + 2, v + 3]);
            }
            if extrusion.outline {
                out.outline.extend([v + 2, v + 3]);
            }
            walls += 1;
        }
    }
    walls
}

fn to_i16(v: f64) -> i16 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Clamped to the i16 range first."
    )]
    let r = v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    r
}

fn to_i8(v: f64) -> i8 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Clamped to the i8 range first."
    )]
    let r = v.round().clamp(-127.0, 127.0) as i8;
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn wall_normals(out: &ExtrudeBuffers) -> Vec<(i8, i8)> {
        out.normals
            .chunks(8)
            .map(|n| (n[0], n[1]))
            .collect()
    }

    #[test]
    fn square_walls_face_outward_either_winding() {
        let mut out = ExtrudeBuffers::default();
        let walls = add_extrude(&mut out, &[square(10.0, 10.0, 100.0, 100.0)], 512.0, &Extrusion::new(30.0));
        assert_eq!(walls, 4);
        assert_eq!(out.vertex_count(), 16);
        assert_eq!(out.indices.len(), 24);
        assert!(out.outline.is_empty());
        assert_eq!(wall_normals(&out), [(0, -127), (127, 0), (0, 127), (-127, 0)]);
        assert_eq!(&out.positions[..12], &[10, 10, 0, 100, 10, 0, 10, 10, 30, 100, 10, 30]);

        let mut ccw = square(10.0, 10.0, 100.0, 100.0);
        ccw.reverse();
        let mut rev = ExtrudeBuffers::default();
        add_extrude(&mut rev, &[ccw], 512.0, &Extrusion::new(30.0));
        let mut a = wall_normals(&out);
        let mut b = wall_normals(&rev);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn hole_walls_face_into_the_hole() {
        let mut hole = square(40.0, 40.0, 60.0, 60.0);
        // Holes come in either winding; the result must not depend on it.
        for _ in 0..2 {
            let mut out = ExtrudeBuffers::default();
            add_extrude(
                &mut out,
                &[square(0.0, 0.0, 100.0, 100.0), hole.clone()],
                512.0,
                &Extrusion::new(5.0),
            );
            let normals = wall_normals(&out);
            assert_eq!(normals.len(), 8);
            // The hole's top edge sits at y = 40 and faces down, into the hole.
            let top = out
                .positions
                .chunks(12)
                .zip(&normals)
                .skip(4)
                .find(|(p, _)| p[1] == 40 && p[4] == 40)
                .map(|(_, n)| *n);
            assert_eq!(top, Some((0, 127)));
            hole.reverse();
        }
    }

    #[test]
    fn degenerate_and_outside_edges_are_skipped() {
        let ring = vec![
            Point::new(10.0, 10.0),
            Point::new(10.2, 10.1),
            Point::new(100.0, 10.0),
            Point::new(100.0, 100.0),
        ];
        let mut out = ExtrudeBuffers::default();
        assert_eq!(add_extrude(&mut out, &[ring], 512.0, &Extrusion::new(1.0)), 3);

        // Entirely below the 512 pixel tile.
        let outside = square(500.0, 600.0, 700.0, 700.0);
        let mut out = ExtrudeBuffers::default();
        assert_eq!(add_extrude(&mut out, &[outside], 512.0, &Extrusion::new(1.0)), 0);
        // Every edge but the right one (x = 700) reaches into the tile.
        let straddling = square(500.0, 100.0, 700.0, 200.0);
        assert_eq!(add_extrude(&mut out, &[straddling], 512.0, &Extrusion::new(1.0)), 3);
    }

    #[test]
    fn flat_or_empty_polygons_add_nothing() {
        let mut out = ExtrudeBuffers::default();
        let ring = square(0.0, 0.0, 50.0, 50.0);
        assert_eq!(add_extrude(&mut out, &[ring.clone()], 512.0, &Extrusion::new(0.005)), 0);
        let line = vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0), Point::new(100.0, 0.0)];
        assert_eq!(add_extrude(&mut out, &[line], 512.0, &Extrusion::new(10.0)), 0);
        assert_eq!(add_extrude(&mut out, &[], 512.0, &Extrusion::new(10.0)), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn outline_adds_two_indices_per_wall() {
        let mut out = ExtrudeBuffers::default();
        let extrusion = Extrusion {
            outline: true,
            ..Extrusion::new(12.0)
        };
        let walls = add_extrude(&mut out, &[square(0.0, 0.0, 20.0, 20.0)], 512.0, &extrusion);
        assert_eq!(out.indices.len() + out.outline.len(), walls * 8);
        assert_eq!(&out.outline[..2], &[2, 3]);
    }
}
