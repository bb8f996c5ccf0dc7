// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use understory_tile_index::QuadkeyError;

/// Why a tile's data could not be loaded.
///
/// Load errors are recorded on the bucket as a per-layer error flag and never
/// stop other tiles or layers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The tile payload contained a geometry command the decoder does not
    /// know. Fatal for that tile; retrying is up to the provider.
    #[error("unknown geometry command {command}")]
    Decode {
        /// Raw command id.
        command: u32,
    },
    /// The provider has no data for the tile.
    #[error("tile unavailable")]
    Unavailable,
    /// Any other provider failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Errors returned by [`Display`](crate::Display) operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    /// No layer with this id.
    #[error("unknown layer `{0}`")]
    UnknownLayer(String),
    /// A layer with this id already exists.
    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),
    /// Insertion index past the end of the layer list.
    #[error("layer index {index} out of range for {len} layers")]
    LayerIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of layers.
        len: usize,
    },
    /// A malformed quadkey.
    #[error(transparent)]
    Quadkey(#[from] QuadkeyError),
}
