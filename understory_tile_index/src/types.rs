// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::cmp::Ordering;

/// Axis-aligned bounding box in 2D.
///
/// Boxes are closed intervals on both axes: two boxes whose edges touch are
/// considered intersecting.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2D {
    /// Minimum x (left)
    pub min_x: f64,
    /// Minimum y (top)
    pub min_y: f64,
    /// Maximum x (right)
    pub max_x: f64,
    /// Maximum y (bottom)
    pub max_y: f64,
}

impl Aabb2D {
    /// Create a new AABB from min/max corners.
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create an AABB from a center point and half extents.
    pub const fn from_center(cx: f64, cy: f64, half_w: f64, half_h: f64) -> Self {
        Self {
            min_x: cx - half_w,
            min_y: cy - half_h,
            max_x: cx + half_w,
            max_y: cy + half_h,
        }
    }

    /// Width of the box (never negative).
    pub fn width(&self) -> f64 {
        max_t(self.max_x - self.min_x, 0.0)
    }

    /// Height of the box (never negative).
    pub fn height(&self) -> f64 {
        max_t(self.max_y - self.min_y, 0.0)
    }

    /// Closed-interval overlap test.
    ///
    /// Each box's min must be `<=` the other's max on both axes, so boxes that
    /// only share an edge or a corner still intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        le(self.min_x, other.max_x)
            && le(other.min_x, self.max_x)
            && le(self.min_y, other.max_y)
            && le(other.min_y, self.max_y)
    }

    /// The smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: min_t(self.min_x, other.min_x),
            min_y: min_t(self.min_y, other.min_y),
            max_x: max_t(self.max_x, other.max_x),
            max_y: max_t(self.max_y, other.max_y),
        }
    }

    /// Grow the box by `pad` on every side.
    pub fn inflate(&self, pad: f64) -> Self {
        Self {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    /// Return true if the AABB is inverted (no extent). Assumes no NaN.
    ///
    /// A zero-width box is not empty: it still intersects boxes it touches.
    pub fn is_empty(&self) -> bool {
        lt(self.max_x, self.min_x) || lt(self.max_y, self.min_y)
    }
}

/// Floor a finite float to an integer without relying on `std` float intrinsics.
#[inline]
pub(crate) fn floor_to_i64(v: f64) -> i64 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Callers pass world or screen pixel coordinates well inside i64."
    )]
    let i = v as i64;
    if (i as f64) > v { i - 1 } else { i }
}

/// Ceil a finite float to an integer without relying on `std` float intrinsics.
#[inline]
pub(crate) fn ceil_to_i64(v: f64) -> i64 {
    -floor_to_i64(-v)
}

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

pub(crate) fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

pub(crate) fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}
