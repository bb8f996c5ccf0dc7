// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quadkeys: string paths addressing tiles in a quad-tree tile pyramid.
//!
//! A quadkey has one digit per level, so its length equals the tile's zoom
//! level and the empty string addresses the single level-0 tile. Each digit is
//! `x_bit | (y_bit << 1)` for the bit of that level, most significant first,
//! which makes every prefix of a quadkey one of its ancestors.
//!
//! ```
//! use understory_tile_index::quadkey::{TileCoord, is_related};
//!
//! let t = TileCoord::new(3, 3, 5).unwrap();
//! assert_eq!(t.to_quadkey(), "213");
//! assert_eq!(TileCoord::from_quadkey("213").unwrap(), t);
//! assert!(is_related("21", "213"));
//! assert!(!is_related("12", "213"));
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use crate::types::{Aabb2D, floor_to_i64};

/// Deepest supported level; tile coordinates must fit in `u32`.
pub const MAX_LEVEL: u8 = 30;

/// Errors produced when parsing or validating tile addresses.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QuadkeyError {
    /// A quadkey digit was not one of `0..=3`.
    #[error("invalid quadkey digit {digit:?} at position {position}")]
    InvalidDigit {
        /// The offending character.
        digit: char,
        /// Its byte position in the quadkey.
        position: usize,
    },
    /// The quadkey is deeper than [`MAX_LEVEL`].
    #[error("quadkey level {level} exceeds the maximum of {MAX_LEVEL}")]
    TooDeep {
        /// Requested level.
        level: usize,
    },
    /// Tile coordinates outside the `2^level` grid.
    #[error("tile ({x}, {y}) is outside level {level}")]
    OutOfRange {
        /// Tile level.
        level: u8,
        /// Tile column.
        x: u32,
        /// Tile row.
        y: u32,
    },
}

/// Tile address as `(level, x, y)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level (equals the quadkey length).
    pub level: u8,
    /// Column, `0..2^level`.
    pub x: u32,
    /// Row, `0..2^level`.
    pub y: u32,
}

/// Number of tiles along one axis at `level`.
#[inline]
pub const fn tiles_per_axis(level: u8) -> u64 {
    1_u64 << level
}

impl TileCoord {
    /// Create a validated tile coordinate.
    pub fn new(level: u8, x: u32, y: u32) -> Result<Self, QuadkeyError> {
        if level > MAX_LEVEL {
            return Err(QuadkeyError::TooDeep {
                level: level as usize,
            });
        }
        let n = tiles_per_axis(level);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(QuadkeyError::OutOfRange { level, x, y });
        }
        Ok(Self { level, x, y })
    }

    /// Parse a quadkey.
    pub fn from_quadkey(quadkey: &str) -> Result<Self, QuadkeyError> {
        if quadkey.len() > MAX_LEVEL as usize {
            return Err(QuadkeyError::TooDeep {
                level: quadkey.len(),
            });
        }
        let (mut x, mut y) = (0_u32, 0_u32);
        for (position, digit) in quadkey.chars().enumerate() {
            let bits = match digit {
                '0' => 0,
                '1' => 1,
                '2' => 2,
                '3' => 3,
                _ => return Err(QuadkeyError::InvalidDigit { digit, position }),
            };
            x = (x << 1) | (bits & 1);
            y = (y << 1) | (bits >> 1);
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Length was checked against MAX_LEVEL above."
        )]
        let level = quadkey.len() as u8;
        Ok(Self { level, x, y })
    }

    /// Encode as a quadkey.
    pub fn to_quadkey(&self) -> String {
        let mut out = String::with_capacity(self.level as usize);
        for i in (0..self.level).rev() {
            let mask = 1_u32 << i;
            let mut digit = b'0';
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            out.push(digit as char);
        }
        out
    }

    /// The tile one level up, or `None` at level 0.
    pub fn parent(&self) -> Option<Self> {
        (self.level > 0).then(|| Self {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// The four tiles one level down, in quadkey digit order.
    pub fn children(&self) -> Option<[Self; 4]> {
        if self.level >= MAX_LEVEL {
            return None;
        }
        let (level, x, y) = (self.level + 1, self.x << 1, self.y << 1);
        Some([
            Self { level, x, y },
            Self { level, x: x + 1, y },
            Self { level, x, y: y + 1 },
            Self {
                level,
                x: x + 1,
                y: y + 1,
            },
        ])
    }

    /// Same-level tiles within `radius` rows/columns, excluding `self`.
    ///
    /// Tiles beyond the edge of the pyramid are skipped (no wrap-around), so a
    /// radius of 1 yields up to 8 neighbours.
    pub fn neighbours(&self, radius: u32) -> Vec<Self> {
        let n = tiles_per_axis(self.level) as i64;
        let r = i64::from(radius);
        let mut out = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let x = i64::from(self.x) + dx;
                let y = i64::from(self.y) + dy;
                if x < 0 || y < 0 || x >= n || y >= n {
                    continue;
                }
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Range checked against 2^level which fits in u32."
                )]
                out.push(Self {
                    level: self.level,
                    x: x as u32,
                    y: y as u32,
                });
            }
        }
        out
    }

    /// Tile bounds in normalized world coordinates (`0..1` on both axes).
    pub fn bounds(&self) -> Aabb2D {
        let n = tiles_per_axis(self.level) as f64;
        Aabb2D::new(
            f64::from(self.x) / n,
            f64::from(self.y) / n,
            f64::from(self.x + 1) / n,
            f64::from(self.y + 1) / n,
        )
    }
}

/// Pixel edge length of a tile layer's tiles.
///
/// A 512 tile at level `L` covers the same area as four 256 tiles at level
/// `L + 1` and is drawn at the same scale, so both granularities share one
/// collision space keyed by the 512 grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileSize {
    /// 256 pixel tiles.
    #[default]
    Size256,
    /// 512 pixel tiles.
    Size512,
}

impl TileSize {
    /// Edge length in pixels.
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
        }
    }

    /// Parse a pixel size; only 256 and 512 are supported.
    pub const fn from_pixels(pixels: u32) -> Option<Self> {
        match pixels {
            256 => Some(Self::Size256),
            512 => Some(Self::Size512),
            _ => None,
        }
    }

    /// Level offset between the map zoom and the tile level at that zoom.
    pub const fn level_offset(self) -> u8 {
        match self {
            Self::Size256 => 0,
            Self::Size512 => 1,
        }
    }
}

/// Key of the collision tile that a layer tile registers into.
///
/// 256 tiles fold into their parent so that a 256 tile at `Q` and a 512 tile
/// at `Q`'s parent share one key. The level-0 256 tile has no parent and keys
/// by itself.
pub fn tile_cache_key(quadkey: &str, tile_size: TileSize) -> &str {
    match tile_size {
        TileSize::Size512 => quadkey,
        TileSize::Size256 => parent_key(quadkey).unwrap_or(quadkey),
    }
}

/// Parent quadkey (the key without its last digit), or `None` for the root.
pub fn parent_key(quadkey: &str) -> Option<&str> {
    quadkey.len().checked_sub(1).map(|len| &quadkey[..len])
}

/// True if one key is a prefix of the other (ancestor, descendant, or equal).
pub fn is_related(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// All tiles of `level` intersecting a normalized world rectangle.
///
/// The rectangle is clamped to the world; edges are inclusive, so a rectangle
/// ending exactly on a tile boundary also reports the tile beyond it.
pub fn tiles_in_rect(level: u8, rect: Aabb2D) -> Vec<TileCoord> {
    let n = tiles_per_axis(level) as i64;
    let nf = n as f64;
    let mut out = Vec::new();
    let (raw_x0, raw_y0) = (
        floor_to_i64(rect.min_x * nf),
        floor_to_i64(rect.min_y * nf),
    );
    let (raw_x1, raw_y1) = (
        floor_to_i64(rect.max_x * nf),
        floor_to_i64(rect.max_y * nf),
    );
    if rect.is_empty() || raw_x1 < 0 || raw_y1 < 0 || raw_x0 >= n || raw_y0 >= n {
        return out;
    }
    let clamp = |v: i64| v.clamp(0, n - 1);
    let (x0, y0, x1, y1) = (clamp(raw_x0), clamp(raw_y0), clamp(raw_x1), clamp(raw_y1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Clamped to 0..2^level which fits in u32."
            )]
            out.push(TileCoord {
                level,
                x: x as u32,
                y: y as u32,
            });
        }
    }
    out
}
