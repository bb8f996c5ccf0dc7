// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform grid backend for screen-space boxes.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, floor_to_i64};

/// Default cell edge in screen pixels; roughly one short label.
pub const DEFAULT_CELL_SIZE: f64 = 64.0;

/// Uniform grid backend.
///
/// Uses a fixed-size cell grid to accelerate queries. Each box is registered
/// in every cell it covers; queries gather candidates from the covered cells
/// and confirm them with the exact closed-interval test. Negative coordinates
/// are fine (boxes hanging off the top-left of the viewport).
#[derive(Clone)]
pub struct UniformGrid {
    cell_w: f64,
    cell_h: f64,
    boxes: Vec<(usize, Aabb2D)>,
    cells: BTreeMap<(i64, i64), Vec<usize>>,
}

impl Default for UniformGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE, DEFAULT_CELL_SIZE)
    }
}

impl UniformGrid {
    /// Create a grid backend with the given cell size.
    pub fn new(cell_w: f64, cell_h: f64) -> Self {
        debug_assert!(cell_w > 0.0 && cell_h > 0.0, "cell sizes must be positive");
        Self {
            cell_w,
            cell_h,
            boxes: Vec::new(),
            cells: BTreeMap::new(),
        }
    }

    fn key_for(&self, x: f64, y: f64) -> (i64, i64) {
        (
            floor_to_i64(x / self.cell_w),
            floor_to_i64(y / self.cell_h),
        )
    }

    fn cells_for_aabb(&self, a: &Aabb2D) -> impl Iterator<Item = (i64, i64)> + use<> {
        let (minx, miny) = self.key_for(a.min_x, a.min_y);
        let (maxx, maxy) = self.key_for(a.max_x, a.max_y);
        (miny..=maxy).flat_map(move |y| (minx..=maxx).map(move |x| (x, y)))
    }
}

impl Backend for UniformGrid {
    fn insert(&mut self, slot: usize, aabb: Aabb2D) {
        let entry = self.boxes.len();
        self.boxes.push((slot, aabb));
        for key in self.cells_for_aabb(&aabb) {
            self.cells.entry(key).or_default().push(entry);
        }
    }
    fn clear(&mut self) {
        self.boxes.clear();
        self.cells.clear();
    }
    fn len(&self) -> usize {
        self.boxes.len()
    }
    fn query_rect<'a>(&'a self, rect: Aabb2D) -> Box<dyn Iterator<Item = usize> + 'a> {
        let mut set = BTreeSet::new();
        for key in self.cells_for_aabb(&rect) {
            if let Some(entries) = self.cells.get(&key) {
                for &e in entries {
                    let (slot, aabb) = self.boxes[e];
                    if aabb.intersects(&rect) {
                        set.insert(slot);
                    }
                }
            }
        }
        Box::new(set.into_iter())
    }
    fn intersects_any(&self, rect: Aabb2D) -> bool {
        self.cells_for_aabb(&rect).any(|key| {
            self.cells.get(&key).is_some_and(|entries| {
                entries
                    .iter()
                    .any(|&e| self.boxes[e].1.intersects(&rect))
            })
        })
    }
}

impl Debug for UniformGrid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UniformGrid")
            .field("cell_w", &self.cell_w)
            .field("cell_h", &self.cell_h)
            .field("boxes", &self.boxes.len())
            .field("cells", &self.cells.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::FlatVec;
    use alloc::vec::Vec;

    #[test]
    fn agrees_with_flatvec() {
        let mut grid = UniformGrid::new(16.0, 16.0);
        let mut flat = FlatVec::default();
        let boxes = [
            Aabb2D::new(-20.0, -20.0, -4.0, -4.0),
            Aabb2D::new(0.0, 0.0, 16.0, 16.0),
            Aabb2D::new(40.0, 10.0, 90.0, 20.0),
            Aabb2D::new(200.0, 200.0, 201.0, 201.0),
        ];
        for (i, b) in boxes.iter().enumerate() {
            grid.insert(i, *b);
            flat.insert(i, *b);
        }
        let queries = [
            Aabb2D::new(16.0, 16.0, 17.0, 17.0),
            Aabb2D::new(-5.0, -5.0, 0.0, 0.0),
            Aabb2D::new(60.0, 0.0, 61.0, 9.9),
            Aabb2D::new(89.0, 19.0, 300.0, 300.0),
        ];
        for q in queries {
            let mut g: Vec<_> = grid.query_rect(q).collect();
            let mut f: Vec<_> = flat.query_rect(q).collect();
            g.sort_unstable();
            f.sort_unstable();
            assert_eq!(g, f, "backends disagree for {q:?}");
            assert_eq!(grid.intersects_any(q), flat.intersects_any(q));
        }
    }

    #[test]
    fn boxes_spanning_cells_are_reported_once() {
        let mut grid = UniformGrid::new(10.0, 10.0);
        grid.insert(7, Aabb2D::new(0.0, 0.0, 35.0, 35.0));
        let hits: Vec<_> = grid.query_rect(Aabb2D::new(0.0, 0.0, 40.0, 40.0)).collect();
        assert_eq!(hits, [7]);
        assert_eq!(grid.len(), 1);
    }
}
