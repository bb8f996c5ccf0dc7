// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; good for tiny sets.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Flat vector backend with linear scans.
#[derive(Clone, Default)]
pub struct FlatVec {
    entries: Vec<(usize, Aabb2D)>,
}

impl Debug for FlatVec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatVec")
            .field("boxes", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl Backend for FlatVec {
    fn insert(&mut self, slot: usize, aabb: Aabb2D) {
        self.entries.push((slot, aabb));
    }
    fn clear(&mut self) {
        self.entries.clear();
    }
    fn len(&self) -> usize {
        self.entries.len()
    }
    fn query_rect<'a>(&'a self, rect: Aabb2D) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.entries
                .iter()
                .filter(move |(_, a)| a.intersects(&rect))
                .map(|(slot, _)| *slot),
        )
    }
    fn intersects_any(&self, rect: Aabb2D) -> bool {
        self.entries.iter().any(|(_, a)| a.intersects(&rect))
    }
}
