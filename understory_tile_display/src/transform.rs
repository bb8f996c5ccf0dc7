// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Camera transform: normalized world coordinates to screen pixels and back.
//!
//! The world is the unit square `0..1` on both axes (y down). At zoom `z` it
//! spans `256 * 2^z` pixels. Pitch tilts a pinhole camera about the viewport
//! centre so that the top of the screen looks further away.

use kurbo::{Point, Size, Vec2};
use understory_tile_index::collision::Projection;
use understory_tile_index::Aabb2D;

/// Pixel size of a level-`z` tile at integer zoom `z`.
pub const TILE_PIXELS: f64 = 256.0;

/// Vertical field of view used by [`Transform::default`]; the focal length
/// is then 1.5 viewport heights.
pub const DEFAULT_FOV: f64 = 0.643_501_108_793_284_4;

/// Rays closer than this fraction of the focal length to the horizon are
/// treated as missing the ground.
const HORIZON_EPSILON: f64 = 1e-6;

/// Position, zoom, rotation, and pitch of the map camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Normalized world position at the viewport centre.
    pub center: Point,
    /// Fractional zoom level.
    pub zoom: f64,
    /// Map rotation in radians.
    pub rotation: f64,
    /// Camera tilt in radians; 0 looks straight down.
    pub pitch: f64,
    /// Viewport size in pixels.
    pub viewport: Size,
    /// Vertical field of view in radians.
    pub fov: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            center: Point::new(0.5, 0.5),
            zoom: 0.0,
            rotation: 0.0,
            pitch: 0.0,
            viewport: Size::new(512.0, 512.0),
            fov: DEFAULT_FOV,
        }
    }
}

impl Transform {
    /// A flat, unrotated camera.
    pub fn new(center: Point, zoom: f64, viewport: Size) -> Self {
        Self {
            center,
            zoom,
            viewport,
            ..Self::default()
        }
    }

    /// Set the rotation.
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the pitch.
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    /// World extent in pixels at the current zoom.
    pub fn world_size(&self) -> f64 {
        TILE_PIXELS * self.zoom.exp2()
    }

    /// Distance from the eye to the viewport plane, in pixels.
    pub fn focal_length(&self) -> f64 {
        self.viewport.height / 2.0 / (self.fov / 2.0).tan()
    }

    /// Project a normalized world point to screen pixels.
    ///
    /// Returns `None` for points behind the camera or beyond the horizon.
    pub fn world_to_screen(&self, world: Point) -> Option<Point> {
        self.world_to_screen_at(world, 0.0)
    }

    /// Project a normalized world point raised `height` pixels (at the
    /// current zoom) above the ground.
    pub fn world_to_screen_at(&self, world: Point, height: f64) -> Option<Point> {
        let g = rotate((world - self.center) * self.world_size(), -self.rotation);
        let d = self.focal_length();
        let (sp, cp) = self.pitch.sin_cos();
        let depth = d - g.y * sp - height * cp;
        if depth <= HORIZON_EPSILON * d {
            return None;
        }
        let k = d / depth;
        Some(Point::new(
            self.viewport.width / 2.0 + g.x * k,
            self.viewport.height / 2.0 + (g.y * cp - height * sp) * k,
        ))
    }

    /// Un-project a screen pixel onto the ground plane.
    ///
    /// Returns `None` for pixels above the horizon.
    pub fn screen_to_world(&self, screen: Point) -> Option<Point> {
        self.unproject(screen, self.pitch)
    }

    /// Normalized world rectangle covering the viewport.
    ///
    /// Pitch is clipped to `max_pitch`, and rows close to the horizon are
    /// pulled in, so the rectangle stays bounded however far the camera tilts.
    pub fn coverage(&self, max_pitch: f64) -> Aabb2D {
        let pitch = self.pitch.clamp(0.0, max_pitch.max(0.0));
        let (w, h) = (self.viewport.width, self.viewport.height);
        let d = self.focal_length();
        let (sp, cp) = pitch.sin_cos();
        // Keep the top rows below 95% of the way to the horizon.
        let min_dy = if sp > 0.0 { -0.95 * d * cp / sp } else { f64::NEG_INFINITY };
        let top = (h / 2.0 + min_dy).max(0.0);

        let mut rect: Option<Aabb2D> = None;
        for corner in [
            Point::new(0.0, top),
            Point::new(w, top),
            Point::new(0.0, h),
            Point::new(w, h),
        ] {
            let Some(p) = self.unproject(corner, pitch) else {
                continue;
            };
            let b = Aabb2D::new(p.x, p.y, p.x, p.y);
            rect = Some(rect.map_or(b, |r| r.union(&b)));
        }
        rect.unwrap_or(Aabb2D::new(
            self.center.x,
            self.center.y,
            self.center.x,
            self.center.y,
        ))
    }

    fn unproject(&self, screen: Point, pitch: f64) -> Option<Point> {
        let dx = screen.x - self.viewport.width / 2.0;
        let dy = screen.y - self.viewport.height / 2.0;
        let d = self.focal_length();
        let (sp, cp) = pitch.sin_cos();
        let denom = d * cp + dy * sp;
        if denom <= HORIZON_EPSILON * d {
            return None;
        }
        let gy = dy * d / denom;
        let gx = dx * (d - gy * sp) / d;
        let g = rotate(Vec2::new(gx, gy), self.rotation);
        Some(self.center + g / self.world_size())
    }
}

fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Adapts a [`Transform`] to the collision space of the tile index, where a
/// collision tile at level `L` spans 512 pixels.
#[derive(Clone, Copy, Debug)]
pub struct CollisionProjection<'a>(pub &'a Transform);

impl Projection for CollisionProjection<'_> {
    fn project(&self, x: f64, y: f64, z: f64, level: u8) -> Option<Point> {
        let extent = 512.0 * f64::from(level).exp2();
        let height = z / extent * self.0.world_size();
        self.0
            .world_to_screen_at(Point::new(x / extent, y / extent), height)
    }
}
