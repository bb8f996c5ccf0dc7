// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for the screen-space accepted-box sets used during resolution.

use alloc::boxed::Box;
use core::fmt::Debug;

use crate::types::Aabb2D;

/// Spatial set of boxes accepted so far in a resolution sweep.
///
/// Slots are caller-chosen identifiers (the sweep uses candidate indices). A
/// backend only has to answer "which accepted boxes intersect this one"; the
/// answers must use the closed-interval test of [`Aabb2D::intersects`].
pub trait Backend: Debug {
    /// Record an accepted box under `slot`.
    fn insert(&mut self, slot: usize, aabb: Aabb2D);

    /// Forget every box.
    fn clear(&mut self);

    /// Number of boxes recorded.
    fn len(&self) -> usize;

    /// True if no box has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Query slots whose box intersects the rectangle.
    fn query_rect<'a>(&'a self, rect: Aabb2D) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// True if any recorded box intersects the rectangle.
    fn intersects_any(&self, rect: Aabb2D) -> bool {
        self.query_rect(rect).next().is_some()
    }
}
