// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collision handler: phase-1 bookkeeping and phase-2 scheduling.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::time::Duration;

use super::resolve::{Candidate, Sweep};
use super::{CollisionConfig, LayerTileKey, Resolution, ScreenView, TileBatch, TileCollisionCache};
use crate::backend::Backend;
use crate::backends::FlatVec;
use crate::buffer::BufferArena;
use crate::quadkey::{QuadkeyError, TileCoord, TileSize, tile_cache_key};

/// Owns the collision cache and decides when screen-space passes run.
///
/// `B` is the spatial backend used for the accepted-box sets of a pass.
/// Times are monotonic durations from any fixed origin chosen by the caller.
#[derive(Debug)]
pub struct CollisionHandler<B: Backend + Default = FlatVec> {
    config: CollisionConfig,
    cache: TileCollisionCache,
    in_progress: BTreeMap<LayerTileKey, usize>,
    deadline: Option<Duration>,
    _backend: PhantomData<fn() -> B>,
}

impl CollisionHandler<FlatVec> {
    /// Create a handler using the flat-vector backend.
    pub fn new(config: CollisionConfig) -> Self {
        Self::with_backend(config)
    }
}

impl<B: Backend + Default> CollisionHandler<B> {
    /// Create a handler using backend `B`.
    pub fn with_backend(config: CollisionConfig) -> Self {
        Self {
            config,
            cache: TileCollisionCache::new(),
            in_progress: BTreeMap::new(),
            deadline: None,
            _backend: PhantomData,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Committed entries.
    pub fn cache(&self) -> &TileCollisionCache {
        &self.cache
    }

    /// True if a batch for `layer`/`quadkey` is open.
    pub fn is_in_progress(&self, layer: &str, quadkey: &str) -> bool {
        self.in_progress
            .contains_key(&LayerTileKey::new(layer, quadkey))
    }

    /// Open a batch for a layer tile.
    ///
    /// The batch snapshots the boxes of every layer registered in the
    /// neighbouring collision tiles and of the other layers registered in its
    /// own collision tile.
    pub fn init_tile(
        &mut self,
        quadkey: &str,
        tile_size: TileSize,
        layer: &str,
    ) -> Result<TileBatch, QuadkeyError> {
        let tile = TileCoord::from_quadkey(quadkey)?;
        let cache_key = tile_cache_key(quadkey, tile_size);
        let collision_tile = TileCoord::from_quadkey(cache_key)?;
        let key = LayerTileKey::new(layer, quadkey);

        let mut obstacles = Vec::new();
        for neighbour in collision_tile.neighbours(self.config.neighbour_radius) {
            for (_, entries) in self.cache.layers(&neighbour.to_quadkey()) {
                obstacles.extend(entries.iter().flat_map(|e| e.boxes.iter().copied()));
            }
        }
        for (other, entries) in self.cache.layers(cache_key) {
            if *other != key {
                obstacles.extend(entries.iter().flat_map(|e| e.boxes.iter().copied()));
            }
        }

        *self.in_progress.entry(key.clone()).or_default() += 1;
        tracing::debug!(
            tile = %key,
            cache_key,
            obstacles = obstacles.len(),
            "collision tile opened"
        );
        Ok(TileBatch::new(
            key,
            cache_key.into(),
            tile,
            tile_size,
            obstacles,
            &self.config,
        ))
    }

    /// Commit a batch, replacing whatever its layer tile registered before.
    ///
    /// Returns true if the batch accepted anything.
    pub fn complete_tile(&mut self, batch: TileBatch) -> bool {
        self.finish(&batch.key);
        let updated = batch.updated;
        let TileBatch {
            key,
            cache_key,
            entries,
            ..
        } = batch;
        tracing::debug!(tile = %key, entries = entries.len(), "collision tile completed");
        if entries.is_empty() {
            self.cache.remove(&cache_key, &key);
        } else {
            self.cache.insert(&cache_key, key, entries);
        }
        updated
    }

    /// Close a batch without committing it, for builds whose result is discarded.
    pub fn abandon(&mut self, batch: TileBatch) {
        tracing::debug!(tile = %batch.key, "collision tile abandoned");
        self.finish(&batch.key);
    }

    /// Commit a batch and immediately resolve its entries on screen.
    ///
    /// Only the new entries are decided; entries of the other tiles in `view`
    /// that are currently visible act as fixed obstacles and keep their state.
    /// Returns `None` if the batch accepted nothing.
    pub fn complete_tile_synced(
        &mut self,
        batch: TileBatch,
        view: &ScreenView<'_>,
        arena: &mut BufferArena,
    ) -> Option<Resolution> {
        let cache_key = batch.cache_key.clone();
        let key = batch.key.clone();
        if !self.complete_tile(batch) {
            return None;
        }
        let padding = self.config.box_padding;

        let mut sweep = Sweep::<B>::new();
        for (other_cache_key, other) in self.visible_keys(view) {
            if other == key {
                continue;
            }
            let Some(entries) = self.cache.get(&other_cache_key, &other) else {
                continue;
            };
            for (i, e) in entries.iter().enumerate() {
                if e.visible == Some(true) {
                    let c = Candidate::new(&other_cache_key, &other, i, e, view.projection, padding);
                    sweep.occupy(&c);
                }
            }
        }

        let mut candidates: Vec<Candidate> = self
            .cache
            .get(&cache_key, &key)
            .into_iter()
            .flat_map(|entries| entries.iter().enumerate())
            .map(|(i, e)| Candidate::new(&cache_key, &key, i, e, view.projection, padding))
            .collect();
        let decisions = sweep.run(&mut candidates);
        Some(self.apply(&candidates, &decisions, arena))
    }

    /// Drop the entries of a layer tile.
    ///
    /// Skipped while a batch for that layer tile is open, since the batch will
    /// replace them on completion. Returns true if entries were removed.
    pub fn clear_tile(&mut self, quadkey: &str, tile_size: TileSize, layer: &str) -> bool {
        let key = LayerTileKey::new(layer, quadkey);
        if self.in_progress.contains_key(&key) {
            tracing::trace!(tile = %key, "clear skipped, tile in progress");
            return false;
        }
        self.cache.remove(tile_cache_key(quadkey, tile_size), &key)
    }

    /// Drop every entry of `layer`. Returns the number of layer tiles removed.
    pub fn remove_tiles(&mut self, layer: &str) -> usize {
        let removed = self.cache.remove_layer(layer);
        tracing::debug!(layer, removed, "collision layer removed");
        removed
    }

    /// Request a screen-space pass once `debounce` has elapsed after `now`.
    ///
    /// Calls made while a pass is already scheduled keep its deadline, so
    /// continuous motion still gets a pass every `debounce`.
    pub fn update(&mut self, now: Duration) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.config.debounce);
        }
    }

    /// True if a requested pass is due at `now`. Consumes the request.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// True if a pass has been requested and not yet polled.
    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    /// Run a screen-space pass over every entry of the tiles in `view`.
    ///
    /// Any pending request is consumed.
    pub fn resolve(&mut self, view: &ScreenView<'_>, arena: &mut BufferArena) -> Resolution {
        self.deadline = None;
        let padding = self.config.box_padding;
        let mut candidates = Vec::new();
        for (cache_key, key) in self.visible_keys(view) {
            let Some(entries) = self.cache.get(&cache_key, &key) else {
                continue;
            };
            candidates.extend(
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| Candidate::new(&cache_key, &key, i, e, view.projection, padding)),
            );
        }
        let decisions = Sweep::<B>::new().run(&mut candidates);
        let resolution = self.apply(&candidates, &decisions, arena);
        tracing::debug!(
            candidates = resolution.candidates,
            visible = resolution.visible,
            toggled = resolution.toggled,
            "collision pass"
        );
        resolution
    }

    fn finish(&mut self, key: &LayerTileKey) {
        if let Some(count) = self.in_progress.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.in_progress.remove(key);
            }
        }
    }

    fn visible_keys(&self, view: &ScreenView<'_>) -> BTreeSet<(alloc::string::String, LayerTileKey)> {
        view.tiles
            .iter()
            .map(|t| {
                (
                    tile_cache_key(t.quadkey, t.tile_size).into(),
                    LayerTileKey::new(t.layer, t.quadkey),
                )
            })
            .collect()
    }

    fn apply(
        &mut self,
        candidates: &[Candidate],
        decisions: &[bool],
        arena: &mut BufferArena,
    ) -> Resolution {
        let mut out = Resolution {
            candidates: candidates.len(),
            ..Resolution::default()
        };
        for (c, &visible) in candidates.iter().zip(decisions) {
            if visible {
                out.visible += 1;
            } else {
                out.hidden += 1;
            }
            let Some(entry) = self
                .cache
                .get_mut(&c.cache_key, &c.key)
                .and_then(|entries| entries.get_mut(c.index))
            else {
                continue;
            };
            entry.visible = Some(visible);
            let mut toggled = false;
            for range in &entry.ranges {
                toggled |= arena.set_range_visible(range, visible) == Some(true);
            }
            if toggled {
                out.toggled += 1;
            }
        }
        out.updated = out.toggled > 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::UniformGrid;
    use crate::buffer::{AttributeBuffer, BufferRange};
    use crate::collision::{CollisionRef, VisibleTile};
    use kurbo::{Point, Vec2};

    fn identity(x: f64, y: f64, _z: f64, _level: u8) -> Option<Point> {
        Some(Point::new(x, y))
    }

    fn arena_with(vertices: u32) -> (BufferArena, crate::buffer::BufferKey) {
        let mut buffer = AttributeBuffer::new(2);
        for _ in 0..vertices {
            buffer.push_vertex(&[1, 7]);
        }
        let mut arena = BufferArena::new();
        let key = arena.insert(buffer);
        arena.commit();
        (arena, key)
    }

    #[test]
    fn neighbour_entries_block_new_tile() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        // Tile 0 at level 1 is (0,0); tile 1 is (1,0).
        let mut left = handler.init_tile("0", TileSize::Size512, "pois").unwrap();
        assert!(left.insert(508.0, 100.0, 0.0, 0.0, 0.0, 6.0, 6.0, None, None).is_some());
        handler.complete_tile(left);

        let mut right = handler.init_tile("1", TileSize::Size512, "pois").unwrap();
        assert_eq!(right.obstacle_count(), 1);
        // World x 512 + 2 overlaps the box reaching to 518.
        assert!(right.insert(2.0, 100.0, 0.0, 0.0, 0.0, 6.0, 6.0, None, None).is_none());
        assert!(right.insert(100.0, 100.0, 0.0, 0.0, 0.0, 6.0, 6.0, None, None).is_some());
    }

    #[test]
    fn other_layers_block_but_own_previous_entries_do_not() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let mut roads = handler.init_tile("03", TileSize::Size512, "roads").unwrap();
        roads.insert(50.0, 50.0, 0.0, 0.0, 0.0, 10.0, 4.0, None, None);
        handler.complete_tile(roads);

        let mut again = handler.init_tile("03", TileSize::Size512, "roads").unwrap();
        assert_eq!(again.obstacle_count(), 0);
        assert!(again.insert(50.0, 50.0, 0.0, 0.0, 0.0, 10.0, 4.0, None, None).is_some());

        let mut pois = handler.init_tile("03", TileSize::Size512, "pois").unwrap();
        assert!(pois.insert(52.0, 50.0, 0.0, 0.0, 0.0, 3.0, 3.0, None, None).is_none());
    }

    #[test]
    fn quarter_tiles_share_the_parent_collision_tile() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let mut big = handler.init_tile("03", TileSize::Size512, "roads").unwrap();
        // Bottom-right quadrant of 03, covered by the 256 tile 033.
        big.insert(300.0, 300.0, 0.0, 0.0, 0.0, 5.0, 5.0, None, None);
        handler.complete_tile(big);

        let mut small = handler.init_tile("033", TileSize::Size256, "pois").unwrap();
        assert_eq!(small.cache_key(), "03");
        assert_eq!(small.to_world(44.0, 44.0), Point::new(812.0, 812.0));
        assert!(small.insert(44.0, 44.0, 0.0, 0.0, 0.0, 5.0, 5.0, None, None).is_none());
    }

    #[test]
    fn root_quarter_tile_is_stretched() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let batch = handler.init_tile("", TileSize::Size256, "pois").unwrap();
        assert_eq!(batch.cache_key(), "");
        assert_eq!(batch.level(), 0);
        assert_eq!(batch.to_world(128.0, 64.0), Point::new(256.0, 128.0));
    }

    #[test]
    fn clear_skips_tiles_in_progress() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let mut batch = handler.init_tile("12", TileSize::Size512, "pois").unwrap();
        batch.insert(10.0, 10.0, 0.0, 0.0, 0.0, 2.0, 2.0, None, None);
        handler.complete_tile(batch);

        let reload = handler.init_tile("12", TileSize::Size512, "pois").unwrap();
        assert!(handler.is_in_progress("pois", "12"));
        assert!(!handler.clear_tile("12", TileSize::Size512, "pois"));
        handler.complete_tile(reload);
        assert!(!handler.is_in_progress("pois", "12"));

        let dropped = handler.init_tile("13", TileSize::Size512, "pois").unwrap();
        handler.abandon(dropped);
        assert!(!handler.is_in_progress("pois", "13"));
        // The empty reload already dropped the previous entries.
        assert!(handler.cache().is_empty());
    }

    #[test]
    fn remove_tiles_is_exact() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        for layer in ["a", "ab"] {
            let mut b = handler.init_tile("2", TileSize::Size512, layer).unwrap();
            b.insert(10.0 + 100.0 * layer.len() as f64, 10.0, 0.0, 0.0, 0.0, 2.0, 2.0, None, None);
            handler.complete_tile(b);
        }
        assert_eq!(handler.remove_tiles("a"), 1);
        assert_eq!(handler.cache().layers("2").count(), 1);
    }

    #[test]
    fn debounce_keeps_first_deadline() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let ms = Duration::from_millis;
        assert!(!handler.poll(ms(0)));
        handler.update(ms(0));
        handler.update(ms(100));
        assert!(handler.is_scheduled());
        assert!(!handler.poll(ms(149)));
        assert!(handler.poll(ms(150)));
        assert!(!handler.is_scheduled());
        assert!(!handler.poll(ms(1000)));
    }

    #[test]
    fn continuous_updates_still_resolve() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let mut fired = Vec::new();
        // Two seconds of camera motion at 16 ms per frame.
        for frame in 0..125_u64 {
            let now = Duration::from_millis(frame * 16);
            handler.update(now);
            if handler.poll(now) {
                fired.push(frame * 16);
            }
        }
        assert!(fired.len() >= 10, "passes fired at {fired:?}");
        assert_eq!(fired[0], 160, "first pass at {fired:?}");
        assert!(
            fired.windows(2).all(|w| w[1] - w[0] <= 176),
            "gap between passes too long: {fired:?}"
        );
    }

    #[test]
    fn resolve_hides_lower_priority_overlaps_and_flips_bits() {
        let mut handler = CollisionHandler::<UniformGrid>::with_backend(CollisionConfig::default());
        let (mut arena, buffer) = arena_with(8);

        let mut batch = handler.init_tile("0", TileSize::Size512, "pois").unwrap();
        let a = batch.insert(100.0, 100.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(3.0), None).unwrap();
        let b = batch.insert(200.0, 100.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(1.0), None).unwrap();
        batch.attach(a, BufferRange { buffer, start: 0, stop: 4 });
        batch.attach(b, BufferRange { buffer, start: 4, stop: 8 });
        assert!(!batch.attach(CollisionRef::new(9), BufferRange { buffer, start: 0, stop: 1 }));
        handler.complete_tile(batch);

        // Zoomed out by 10: the two labels now overlap on screen.
        let far = |x: f64, y: f64, _z: f64, _l: u8| Some(Point::new(x / 10.0, y / 10.0));
        let tiles = [VisibleTile {
            layer: "pois",
            quadkey: "0",
            tile_size: TileSize::Size512,
        }];
        let view = ScreenView {
            projection: &far,
            tiles: &tiles,
        };
        let res = handler.resolve(&view, &mut arena);
        assert_eq!((res.candidates, res.visible, res.hidden), (2, 1, 1));
        assert_eq!(res.toggled, 1);
        assert!(res.updated);
        let data = arena.get(buffer).unwrap();
        assert_eq!(data.is_visible(0), Some(false));
        assert_eq!(data.is_visible(4), Some(true));

        // Same view again: nothing changes.
        let again = handler.resolve(&view, &mut arena);
        assert_eq!(again.toggled, 0);
        assert!(!again.updated);

        // Zoom back in: both fit.
        let view = ScreenView {
            projection: &identity,
            tiles: &tiles,
        };
        let res = handler.resolve(&view, &mut arena);
        assert_eq!(res.visible, 2);
        assert_eq!(arena.get(buffer).unwrap().is_visible(0), Some(true));
    }

    #[test]
    fn map_and_viewport_aligned_entries_block_each_other() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let mut batch = handler.init_tile("0", TileSize::Size512, "roads").unwrap();
        batch
            .insert(100.0, 100.0, 0.0, 0.0, 0.0, 30.0, 5.0, Some(1.0), Some(Vec2::new(1.0, 0.0)))
            .unwrap();
        handler.complete_tile(batch);
        let mut pois = handler.init_tile("00", TileSize::Size256, "pois").unwrap();
        pois.insert(300.0, 300.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(2.0), None).unwrap();
        handler.complete_tile(pois);

        // Squash everything onto one spot.
        let point = |_x: f64, _y: f64, _z: f64, _l: u8| Some(Point::new(10.0, 10.0));
        let tiles = [
            VisibleTile {
                layer: "roads",
                quadkey: "0",
                tile_size: TileSize::Size512,
            },
            VisibleTile {
                layer: "pois",
                quadkey: "00",
                tile_size: TileSize::Size256,
            },
        ];
        let (mut arena, _) = arena_with(0);
        let res = handler.resolve(
            &ScreenView {
                projection: &point,
                tiles: &tiles,
            },
            &mut arena,
        );
        assert_eq!((res.visible, res.hidden), (1, 1));
        assert_eq!(res.toggled, 0);
    }

    #[test]
    fn synced_completion_respects_visible_neighbours() {
        let mut handler = CollisionHandler::new(CollisionConfig::default());
        let (mut arena, buffer) = arena_with(2);

        let mut first = handler.init_tile("0", TileSize::Size512, "a").unwrap();
        first.insert(100.0, 100.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(9.0), None);
        handler.complete_tile(first);

        let squash = |_x: f64, _y: f64, _z: f64, _l: u8| Some(Point::new(50.0, 50.0));
        let tiles = [
            VisibleTile {
                layer: "a",
                quadkey: "0",
                tile_size: TileSize::Size512,
            },
            VisibleTile {
                layer: "b",
                quadkey: "3",
                tile_size: TileSize::Size512,
            },
        ];
        let view = ScreenView {
            projection: &squash,
            tiles: &tiles,
        };
        assert_eq!(handler.resolve(&view, &mut arena).visible, 1);

        // Far away in world space, so phase 1 accepts it, but it lands on the
        // same screen spot as the already visible entry and loses despite its
        // better priority.
        let mut second = handler.init_tile("3", TileSize::Size512, "b").unwrap();
        let r = second.insert(100.0, 100.0, 0.0, 0.0, 0.0, 5.0, 5.0, Some(0.0), None).unwrap();
        second.attach(r, BufferRange { buffer, start: 0, stop: 2 });
        let res = handler.complete_tile_synced(second, &view, &mut arena).unwrap();
        assert_eq!((res.candidates, res.visible, res.hidden), (1, 0, 1));
        assert_eq!(res.toggled, 1);
        assert_eq!(arena.get(buffer).unwrap().is_visible(1), Some(false));

        let empty = handler.init_tile("2", TileSize::Size512, "b").unwrap();
        assert!(handler.complete_tile_synced(empty, &view, &mut arena).is_none());
    }
}
