// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for the accepted-box sets.
//!
//! - `flatvec`: flat vector with linear scans. Best for the few dozen labels a
//!   typical viewport holds.
//! - `grid`: uniform screen-space grid. Pays off once a viewport accumulates
//!   hundreds of candidates (dense POI layers, pitched views).
//!
//! Both produce identical answers; only the cost differs.

pub mod flatvec;
pub mod grid;

pub use flatvec::FlatVec;
pub use grid::UniformGrid;
