// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decoding of command-encoded tile geometry.
//!
//! Geometry arrives as a stream of `u32`s: a command integer
//! `id | (count << 3)` followed by `count` pairs of zigzag-encoded deltas for
//! `MoveTo` (1) and `LineTo` (2), or nothing for `ClosePath` (7). The cursor
//! starts at the origin and is not reset between parts.

use kurbo::{Point, Vec2};

use crate::error::LoadError;
use crate::extrude::signed_area;
use crate::provider::Geometry;

const MOVE_TO: u32 = 1;
const LINE_TO: u32 = 2;
const CLOSE_PATH: u32 = 7;

/// Geometry type declared by the tile for a feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    /// One or more points.
    Point,
    /// One or more lines.
    LineString,
    /// One or more polygons.
    Polygon,
}

/// Decode a command stream into geometries, scaling coordinates by `scale`
/// (tile pixels per encoded unit).
///
/// Multi-geometries come back as several entries. For polygons, each ring with
/// positive area starts a new polygon and negative rings are its holes.
pub fn decode_geometry(
    kind: GeometryKind,
    commands: &[u32],
    scale: f64,
) -> Result<Vec<Geometry>, LoadError> {
    let parts = decode_parts(commands, scale)?;
    let mut out = Vec::new();
    match kind {
        GeometryKind::Point => {
            out.extend(parts.into_iter().flatten().map(Geometry::Point));
        }
        GeometryKind::LineString => {
            out.extend(
                parts
                    .into_iter()
                    .filter(|p| p.len() >= 2)
                    .map(Geometry::LineString),
            );
        }
        GeometryKind::Polygon => {
            let mut rings: Vec<Vec<Point>> = Vec::new();
            for ring in parts {
                let area = signed_area(&ring);
                if area > 0.0 && !rings.is_empty() {
                    out.push(Geometry::Polygon(std::mem::take(&mut rings)));
                }
                if area != 0.0 {
                    rings.push(ring);
                }
            }
            if !rings.is_empty() {
                out.push(Geometry::Polygon(rings));
            }
        }
    }
    Ok(out)
}

fn decode_parts(commands: &[u32], scale: f64) -> Result<Vec<Vec<Point>>, LoadError> {
    let mut parts: Vec<Vec<Point>> = Vec::new();
    let mut cursor = Vec2::ZERO;
    let mut it = commands.iter().copied();
    while let Some(command) = it.next() {
        let (id, count) = (command & 0x7, command >> 3);
        match id {
            MOVE_TO | LINE_TO => {
                for i in 0..count {
                    let (Some(dx), Some(dy)) = (it.next(), it.next()) else {
                        return Err(LoadError::Decode { command });
                    };
                    cursor += Vec2::new(f64::from(zigzag(dx)), f64::from(zigzag(dy)));
                    let p = (cursor * scale).to_point();
                    if (id == MOVE_TO && i == 0) || parts.is_empty() {
                        parts.push(vec![p]);
                    } else if let Some(part) = parts.last_mut() {
                        part.push(p);
                    }
                }
            }
            CLOSE_PATH => {}
            _ => return Err(LoadError::Decode { command }),
        }
    }
    Ok(parts)
}

fn zigzag(v: u32) -> i32 {
    #[allow(
        clippy::cast_possible_wrap,
        reason = "Zigzag decoding reinterprets the shifted bits."
    )]
    let r = ((v >> 1) as i32) ^ -((v & 1) as i32);
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: u32, count: u32) -> u32 {
        id | (count << 3)
    }

    fn zz(v: i32) -> u32 {
        #[allow(clippy::cast_sign_loss, reason = "Zigzag encoding.")]
        let r = ((v << 1) ^ (v >> 31)) as u32;
        r
    }

    #[test]
    fn points_and_lines() {
        let pts = decode_geometry(
            GeometryKind::Point,
            &[cmd(MOVE_TO, 2), zz(5), zz(7), zz(3), zz(-2)],
            1.0,
        )
        .unwrap();
        assert_eq!(
            pts,
            [
                Geometry::Point(Point::new(5.0, 7.0)),
                Geometry::Point(Point::new(8.0, 5.0))
            ]
        );

        let line = decode_geometry(
            GeometryKind::LineString,
            &[cmd(MOVE_TO, 1), zz(2), zz(2), cmd(LINE_TO, 2), zz(0), zz(8), zz(8), zz(0)],
            0.5,
        )
        .unwrap();
        assert_eq!(
            line,
            [Geometry::LineString(vec![
                Point::new(1.0, 1.0),
                Point::new(1.0, 5.0),
                Point::new(5.0, 5.0)
            ])]
        );
    }

    #[test]
    fn polygon_with_hole() {
        let commands = [
            // Exterior, clockwise on screen.
            cmd(MOVE_TO, 1),
            zz(0),
            zz(0),
            cmd(LINE_TO, 3),
            zz(10),
            zz(0),
            zz(0),
            zz(10),
            zz(-10),
            zz(0),
            cmd(CLOSE_PATH, 1),
            // Hole, counter-clockwise.
            cmd(MOVE_TO, 1),
            zz(2),
            zz(-8),
            cmd(LINE_TO, 3),
            zz(0),
            zz(2),
            zz(2),
            zz(0),
            zz(0),
            zz(-2),
            cmd(CLOSE_PATH, 1),
        ];
        let polys = decode_geometry(GeometryKind::Polygon, &commands, 1.0).unwrap();
        assert_eq!(polys.len(), 1);
        let Geometry::Polygon(rings) = &polys[0] else {
            panic!("expected a polygon");
        };
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1][0], Point::new(2.0, 2.0));
    }

    #[test]
    fn unknown_command_is_fatal() {
        let err = decode_geometry(GeometryKind::Point, &[cmd(4, 1), 0, 0], 1.0).unwrap_err();
        assert_eq!(err, LoadError::Decode { command: cmd(4, 1) });
        let truncated = decode_geometry(GeometryKind::Point, &[cmd(MOVE_TO, 1), 0], 1.0);
        assert!(truncated.is_err());
    }
}
