// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tile orchestrator.
//!
//! [`Display`] ties the pieces together. A transform change recomputes the
//! screen tiles and schedules a collision pass. Each [`Display::frame`] then:
//!
//! 1. runs a bounded number of build steps and applies finished builds,
//! 2. requests data for visible layer tiles that have none,
//! 3. runs the debounced screen-space collision pass when due,
//! 4. evicts old buckets that are off screen,
//! 5. composes draw commands, substituting previews for tiles that are not
//!    ready, and
//! 6. collects the buffer upload list.
//!
//! Data arrives through [`Display::tile_loaded`]; answers for tiles that left
//! the screen are dropped.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use kurbo::Point;
use understory_tile_index::collision::{
    CollisionConfig, CollisionHandler, ScreenView, VisibleTile,
};
use understory_tile_index::{Aabb2D, BufferArena, BufferRange, TileCoord, TileSize, Uploads};

use crate::bucket::{Bucket, BucketKey, BucketPool, LayerBuffers, LayerFlags};
use crate::build::{BuildOutput, BuildSettings, BuildTask};
use crate::error::{DisplayError, LoadError};
use crate::extrude::MIN_EXTRUDE_HEIGHT;
use crate::grid::{Grid, GridConfig, ScreenTile};
use crate::layer::{Color, Layer, Layers};
use crate::modifier::{FeatureEvent, TileChange, plan, related_buckets};
use crate::provider::{Styler, TileData, TileProvider};
use crate::task::{Completed, Scheduler, TaskKey};
use crate::transform::{CollisionProjection, Transform};

/// Display tunables.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplayConfig {
    /// Collision detection.
    pub collision: CollisionConfig,
    /// Visible tile computation.
    pub grid: GridConfig,
    /// Buckets kept before old off-screen ones are evicted.
    pub bucket_capacity: usize,
    /// Build steps run per frame.
    pub steps_per_frame: usize,
    /// Features processed per build step.
    pub features_per_step: usize,
    /// Extrusions at or below this height produce no walls.
    pub min_extrude_height: f64,
    /// Levels searched upward for a preview source.
    pub preview_depth: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            collision: CollisionConfig::default(),
            grid: GridConfig::default(),
            bucket_capacity: 256,
            steps_per_frame: 8,
            features_per_step: 16,
            min_extrude_height: MIN_EXTRUDE_HEIGHT,
            preview_depth: 4,
        }
    }
}

/// One draw of a layer tile.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// The tile's own buffers.
    Tile {
        /// Layer id.
        layer: String,
        /// Bucket holding the buffers.
        key: BucketKey,
        /// Screen position of the tile's top-left corner, before pitch.
        origin: Point,
        /// Drawn size relative to the nominal tile size.
        scale: f64,
    },
    /// Part of another bucket standing in for a tile that is not ready.
    Preview {
        /// Layer id.
        layer: String,
        /// Tile being covered.
        target: BucketKey,
        /// Bucket whose buffers are drawn.
        source: BucketKey,
        /// Region of `source` to sample, in unit tile coordinates.
        source_rect: Aabb2D,
        /// Region of `target` covered, in unit tile coordinates.
        dest_rect: Aabb2D,
        /// Screen position of the target's top-left corner, before pitch.
        origin: Point,
        /// Drawn size of the target relative to the nominal tile size.
        scale: f64,
    },
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Clear color from the base layer.
    pub background: Option<Color>,
    /// Draws in layer order.
    pub commands: Vec<DrawCommand>,
    /// Label buffers to upload or free.
    pub uploads: Uploads,
    /// True if a collision pass changed label visibility.
    pub collision_updated: bool,
}

type ScreenTiles = BTreeMap<TileSize, Vec<ScreenTile>>;

/// Streams layer tiles into buffers and keeps their labels free of overlaps.
pub struct Display<P: TileProvider> {
    config: DisplayConfig,
    provider: P,
    styler: Rc<dyn Styler>,
    transform: Transform,
    grid: Grid,
    layers: Layers,
    screen: ScreenTiles,
    pool: BucketPool,
    collision: CollisionHandler,
    arena: BufferArena,
    scheduler: Scheduler<BuildTask>,
    now: Duration,
}

impl<P: TileProvider + core::fmt::Debug> core::fmt::Debug for Display<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Display")
            .field("provider", &self.provider)
            .field("transform", &self.transform)
            .field("layers", &self.layers)
            .field("buckets", &self.pool.len())
            .field("tasks", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

impl<P: TileProvider> Display<P> {
    /// Create a display with no layers.
    pub fn new(config: DisplayConfig, provider: P, styler: Rc<dyn Styler>) -> Self {
        Self {
            config,
            provider,
            styler,
            transform: Transform::default(),
            grid: Grid::new(config.grid),
            layers: Layers::new(),
            screen: ScreenTiles::new(),
            pool: BucketPool::new(config.bucket_capacity),
            collision: CollisionHandler::new(config.collision),
            arena: BufferArena::new(),
            scheduler: Scheduler::new(),
            now: Duration::ZERO,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Current camera.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Layers in draw order.
    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    /// The data provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The data provider, mutably.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Label buffers by key, for the renderer.
    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// Collision state.
    pub fn collision(&self) -> &CollisionHandler {
        &self.collision
    }

    /// Build tasks in flight.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Bucket lookup.
    pub fn bucket(&self, quadkey: &str, tile_size: TileSize) -> Option<&Bucket> {
        self.pool.get(quadkey, tile_size)
    }

    /// Screen placement of a visible tile.
    pub fn screen_tile(&self, quadkey: &str, tile_size: TileSize) -> Option<&ScreenTile> {
        self.screen
            .get(&tile_size)?
            .iter()
            .find(|t| t.quadkey == quadkey)
    }

    /// Visible tiles of a size, nearest to the viewport centre first.
    pub fn screen_tiles(&self, tile_size: TileSize) -> &[ScreenTile] {
        self.screen.get(&tile_size).map_or(&[], Vec::as_slice)
    }

    /// Move the camera.
    ///
    /// Recomputes the screen tiles, schedules a collision pass, and cancels
    /// work for tiles that left the screen.
    pub fn set_transform(&mut self, transform: Transform, now: Duration) {
        self.now = now;
        self.transform = transform;
        self.refresh_screen();
        self.collision.update(now);

        let screen = &self.screen;
        let cancelled = self
            .scheduler
            .cancel_where(|k| !on_screen(screen, &k.quadkey, k.tile_size));
        let mut released = 0;
        for bucket in self.pool.iter_mut() {
            if on_screen(screen, bucket.quadkey(), bucket.tile_size()) {
                continue;
            }
            let (coord, tile_size) = (bucket.coord(), bucket.tile_size());
            for (layer, state) in bucket.layers_mut() {
                if state.flags.contains(LayerFlags::REQUESTED) {
                    state.flags.remove(LayerFlags::REQUESTED);
                    self.provider.cancel(layer, coord, tile_size);
                    released += 1;
                }
            }
        }
        if cancelled + released > 0 {
            tracing::debug!(cancelled, released, "off-screen work cancelled");
        }
    }

    /// Insert a layer at `index`; index 0 is the base layer and sets the
    /// background.
    pub fn add_layer(&mut self, index: usize, layer: Layer) -> Result<(), DisplayError> {
        tracing::debug!(layer = %layer.id, index, "layer added");
        self.layers.insert(index, layer)?;
        self.refresh_screen();
        Ok(())
    }

    /// Remove a layer, cancelling its tasks and requests and releasing its
    /// buffers and collision entries.
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer, DisplayError> {
        let (index, layer) = self.layers.remove(id)?;
        let cancelled = self.scheduler.cancel_where(|k| k.layer == id);
        for bucket in self.pool.iter_mut() {
            let (coord, tile_size) = (bucket.coord(), bucket.tile_size());
            let Some(state) = bucket.remove_layer(id) else {
                continue;
            };
            if state.flags.contains(LayerFlags::REQUESTED) {
                self.provider.cancel(id, coord, tile_size);
            }
            if let Some(key) = state.buffers.and_then(|b| b.labels) {
                self.arena.remove(key);
            }
        }
        let entries = self.collision.remove_tiles(id);
        if entries > 0 {
            self.collision.update(self.now);
        }
        self.refresh_screen();
        tracing::debug!(layer = id, index, cancelled, "layer removed");
        Ok(layer)
    }

    /// Show or hide a layer.
    pub fn set_layer_visible(&mut self, id: &str, visible: bool) -> Result<(), DisplayError> {
        self.layers.set_visible(id, visible)?;
        self.collision.update(self.now);
        Ok(())
    }

    /// Deliver the answer to a tile request.
    ///
    /// Returns `Ok(true)` if a build was started. Answers for tiles that are
    /// no longer on screen, and duplicates of a build already running, are
    /// dropped with `Ok(false)`. A load error is recorded on the bucket.
    pub fn tile_loaded(
        &mut self,
        layer: &str,
        quadkey: &str,
        tile_size: TileSize,
        data: Result<TileData, LoadError>,
    ) -> Result<bool, DisplayError> {
        let Some(info) = self.layers.get(layer) else {
            return Err(DisplayError::UnknownLayer(layer.into()));
        };
        let coord = TileCoord::from_quadkey(quadkey)?;
        if info.tile_size != tile_size || !on_screen(&self.screen, quadkey, tile_size) {
            if let Some(state) = self
                .pool
                .get_mut(quadkey, tile_size)
                .and_then(|b| b.layer_state_mut(layer))
            {
                state.flags.remove(LayerFlags::REQUESTED);
            }
            tracing::debug!(layer, quadkey, "stale tile dropped");
            return Ok(false);
        }

        let state = self.pool.get_or_create(coord, tile_size).layer_mut(layer);
        state.flags.remove(LayerFlags::REQUESTED);
        let data = match data {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(layer, quadkey, %error, "tile load failed");
                state.flags.insert(LayerFlags::ERROR);
                state.error = Some(error);
                return Ok(false);
            }
        };
        if state.flags.contains(LayerFlags::READY) && !state.flags.contains(LayerFlags::OUTDATED) {
            return Ok(false);
        }
        let key = TaskKey::new(layer, quadkey, tile_size);
        if self.scheduler.active(&key).is_some() {
            tracing::trace!(layer, quadkey, "build coalesced");
            return Ok(false);
        }

        let batch = self.collision.init_tile(quadkey, tile_size, layer)?;
        let settings = BuildSettings {
            zoom: self.transform.zoom,
            features_per_step: self.config.features_per_step,
            min_extrude_height: self.config.min_extrude_height,
        };
        let styler = Rc::clone(&self.styler);
        let id = self
            .scheduler
            .spawn(key, || {
                BuildTask::new(layer, coord, tile_size, data, styler, Some(batch), settings)
            })
            .id();
        state.flags.insert(LayerFlags::BUSY);
        state.flags.remove(LayerFlags::ERROR);
        state.error = None;
        state.task = Some(id);
        tracing::debug!(layer, quadkey, "build started");
        Ok(true)
    }

    /// Invalidate the tiles touched by a feature mutation. Invalidated tiles
    /// keep drawing their old buffers until the rebuild lands.
    pub fn apply(&mut self, event: &FeatureEvent) -> Result<Vec<TileChange>, DisplayError> {
        let layer = self
            .layers
            .get(event.layer())
            .ok_or_else(|| DisplayError::UnknownLayer(event.layer().into()))?;
        let changes = plan(event, &self.pool, layer.tile_size);
        for change in &changes {
            self.invalidate(&change.layer, &change.key);
        }
        tracing::debug!(layer = event.layer(), tiles = changes.len(), "feature change applied");
        Ok(changes)
    }

    /// Drop the data of `layer` in every bucket related by quadkey prefix to
    /// one of `affected`, or in every bucket when `affected` is `None`.
    ///
    /// Returns the number of buckets cleared.
    pub fn clear(&mut self, layer: &str, affected: Option<&[&str]>) -> Result<usize, DisplayError> {
        if self.layers.get(layer).is_none() {
            return Err(DisplayError::UnknownLayer(layer.into()));
        }
        let keys = related_buckets(&self.pool, affected);
        let mut cleared = 0;
        for key in &keys {
            let Some(bucket) = self.pool.get_mut(&key.quadkey, key.tile_size) else {
                continue;
            };
            let coord = bucket.coord();
            let Some(state) = bucket.remove_layer(layer) else {
                continue;
            };
            if let Some(id) = state.task {
                self.scheduler.cancel(id);
            }
            if state.flags.contains(LayerFlags::REQUESTED) {
                self.provider.cancel(layer, coord, key.tile_size);
            }
            if let Some(labels) = state.buffers.and_then(|b| b.labels) {
                self.arena.remove(labels);
            }
            self.collision
                .clear_tile(&key.quadkey, key.tile_size, layer);
            cleared += 1;
        }
        tracing::debug!(layer, cleared, "layer cleared");
        Ok(cleared)
    }

    /// Advance one frame.
    pub fn frame(&mut self, now: Duration) -> Frame {
        self.now = now;
        let mut frame = Frame::default();

        for done in self.scheduler.run(self.config.steps_per_frame) {
            frame.collision_updated |= self.apply_build(done);
        }

        self.request_missing();

        if self.collision.poll(now) {
            let tiles = visible_tiles(&self.layers, &self.screen);
            let projection = CollisionProjection(&self.transform);
            let view = ScreenView {
                projection: &projection,
                tiles: &tiles,
            };
            frame.collision_updated |= self.collision.resolve(&view, &mut self.arena).updated;
        }

        self.evict();

        frame.background = self.layers.background(self.transform.zoom);
        frame.commands = self.compose();
        frame.uploads = self.arena.commit();
        frame
    }

    fn refresh_screen(&mut self) {
        let mut sizes: Vec<TileSize> = self.layers.iter().map(|l| l.tile_size).collect();
        sizes.sort_unstable();
        sizes.dedup();
        self.screen = sizes
            .into_iter()
            .map(|size| (size, self.grid.tiles(&self.transform, size)))
            .collect();
    }

    fn invalidate(&mut self, layer: &str, key: &BucketKey) {
        let Some(bucket) = self.pool.get_mut(&key.quadkey, key.tile_size) else {
            return;
        };
        let coord = bucket.coord();
        let state = bucket.layer_mut(layer);
        if self
            .scheduler
            .mark_outdated(&TaskKey::new(layer, &key.quadkey, key.tile_size))
        {
            state.task = None;
            state.flags.remove(LayerFlags::BUSY);
        }
        if state.flags.contains(LayerFlags::REQUESTED) {
            self.provider.cancel(layer, coord, key.tile_size);
        }
        if state.flags.contains(LayerFlags::READY) {
            state.flags.insert(LayerFlags::OUTDATED);
        }
        state
            .flags
            .remove(LayerFlags::REQUESTED | LayerFlags::ERROR);
    }

    /// Returns true if the synced collision pass changed label visibility.
    fn apply_build(&mut self, done: Completed<BuildOutput>) -> bool {
        let stale = done.is_stale();
        let Completed { id, key, output, .. } = done;
        let BuildOutput {
            labels,
            label_indices,
            ranges,
            walls,
            batch,
            ..
        } = output;

        let live = self.layers.get(&key.layer).is_some()
            && on_screen(&self.screen, &key.quadkey, key.tile_size);
        let state = self
            .pool
            .get_mut(&key.quadkey, key.tile_size)
            .and_then(|b| b.layer_state_mut(&key.layer));
        let owned = state.as_ref().is_some_and(|s| s.task == Some(id));

        let Some(state) = state.filter(|_| owned && !stale && live) else {
            tracing::debug!(layer = %key.layer, quadkey = %key.quadkey, stale, live, "build discarded");
            if let Some(state) = self
                .pool
                .get_mut(&key.quadkey, key.tile_size)
                .and_then(|b| b.layer_state_mut(&key.layer))
                .filter(|s| s.task == Some(id))
            {
                state.task = None;
                state.flags.remove(LayerFlags::BUSY);
            }
            let ready = self
                .pool
                .get(&key.quadkey, key.tile_size)
                .is_some_and(|b| b.is_ready(&key.layer));
            if let Some(batch) = batch {
                self.collision.abandon(batch);
            }
            if !ready {
                self.collision
                    .clear_tile(&key.quadkey, key.tile_size, &key.layer);
            }
            return false;
        };

        state.task = None;
        state.flags.remove(LayerFlags::BUSY | LayerFlags::OUTDATED | LayerFlags::ERROR);
        state.flags.insert(LayerFlags::READY);
        let previous = state.buffers.take().and_then(|b| b.labels);
        let label_key = (labels.vertex_count() > 0).then(|| self.arena.insert(labels));
        state.buffers = Some(LayerBuffers {
            labels: label_key,
            label_indices,
            walls,
        });
        if let Some(previous) = previous {
            self.arena.remove(previous);
        }

        let Some(mut batch) = batch else {
            return false;
        };
        if let Some(buffer) = label_key {
            for (entry, vertices) in ranges {
                batch.attach(
                    entry,
                    BufferRange {
                        buffer,
                        start: vertices.start,
                        stop: vertices.end,
                    },
                );
            }
        }
        let tiles = visible_tiles(&self.layers, &self.screen);
        let projection = CollisionProjection(&self.transform);
        let view = ScreenView {
            projection: &projection,
            tiles: &tiles,
        };
        self.collision
            .complete_tile_synced(batch, &view, &mut self.arena)
            .is_some_and(|r| r.updated)
    }

    fn request_missing(&mut self) {
        let wanted: Vec<(String, TileSize)> = self
            .layers
            .visible()
            .map(|l| (l.id.clone(), l.tile_size))
            .collect();
        for (layer, tile_size) in wanted {
            let Some(tiles) = self.screen.get(&tile_size) else {
                continue;
            };
            for tile in tiles {
                let state = self.pool.get_or_create(tile.coord, tile_size).layer_mut(&layer);
                let flags = state.flags;
                let current = flags.contains(LayerFlags::READY) && !flags.contains(LayerFlags::OUTDATED);
                if current
                    || flags.intersects(LayerFlags::BUSY | LayerFlags::REQUESTED | LayerFlags::ERROR)
                {
                    continue;
                }
                state.flags.insert(LayerFlags::REQUESTED);
                tracing::debug!(layer = %layer, quadkey = %tile.quadkey, "tile requested");
                self.provider.request(&layer, tile.coord, tile_size);
            }
        }
    }

    fn evict(&mut self) {
        let screen = &self.screen;
        let evicted = self
            .pool
            .evict(|k| on_screen(screen, &k.quadkey, k.tile_size));
        for bucket in evicted {
            for (layer, state) in bucket.layers() {
                if state.flags.contains(LayerFlags::REQUESTED) {
                    self.provider.cancel(layer, bucket.coord(), bucket.tile_size());
                }
                if let Some(labels) = state.buffers.as_ref().and_then(|b| b.labels) {
                    self.arena.remove(labels);
                }
                self.collision
                    .clear_tile(bucket.quadkey(), bucket.tile_size(), layer);
            }
        }
    }

    fn compose(&self) -> Vec<DrawCommand> {
        let mut commands = Vec::new();
        for layer in self.layers.visible() {
            for tile in self.screen_tiles(layer.tile_size) {
                let key = BucketKey::new(&tile.quadkey, tile.tile_size);
                if self
                    .pool
                    .get(&tile.quadkey, tile.tile_size)
                    .is_some_and(|b| b.is_ready(&layer.id))
                {
                    commands.push(DrawCommand::Tile {
                        layer: layer.id.clone(),
                        key,
                        origin: tile.origin,
                        scale: tile.scale,
                    });
                } else {
                    self.preview(&layer.id, tile, &mut commands);
                }
            }
        }
        commands
    }

    /// Cover a tile that is not ready with the nearest ready ancestor, or
    /// else with whichever of its children are ready.
    fn preview(&self, layer: &str, tile: &ScreenTile, out: &mut Vec<DrawCommand>) {
        let target = BucketKey::new(&tile.quadkey, tile.tile_size);
        let unit = Aabb2D::new(0.0, 0.0, 1.0, 1.0);
        let mut ancestor = tile.coord;
        for depth in 1..=self.config.preview_depth {
            let Some(parent) = ancestor.parent() else {
                break;
            };
            ancestor = parent;
            let quadkey = ancestor.to_quadkey();
            if self
                .pool
                .get(&quadkey, tile.tile_size)
                .is_some_and(|b| b.is_ready(layer))
            {
                out.push(DrawCommand::Preview {
                    layer: layer.into(),
                    target,
                    source: BucketKey::new(&quadkey, tile.tile_size),
                    source_rect: sub_rect(ancestor, tile.coord, depth),
                    dest_rect: unit,
                    origin: tile.origin,
                    scale: tile.scale,
                });
                return;
            }
        }
        let Some(children) = tile.coord.children() else {
            return;
        };
        for child in children {
            let quadkey = child.to_quadkey();
            if self
                .pool
                .get(&quadkey, tile.tile_size)
                .is_some_and(|b| b.is_ready(layer))
            {
                out.push(DrawCommand::Preview {
                    layer: layer.into(),
                    target: target.clone(),
                    source: BucketKey::new(&quadkey, tile.tile_size),
                    source_rect: unit,
                    dest_rect: sub_rect(tile.coord, child, 1),
                    origin: tile.origin,
                    scale: tile.scale,
                });
            }
        }
    }
}

fn on_screen(screen: &ScreenTiles, quadkey: &str, tile_size: TileSize) -> bool {
    screen
        .get(&tile_size)
        .is_some_and(|tiles| tiles.iter().any(|t| t.quadkey == quadkey))
}

fn visible_tiles<'a>(layers: &'a Layers, screen: &'a ScreenTiles) -> Vec<VisibleTile<'a>> {
    layers
        .visible()
        .flat_map(|layer| {
            screen
                .get(&layer.tile_size)
                .into_iter()
                .flatten()
                .map(move |t| VisibleTile {
                    layer: &layer.id,
                    quadkey: &t.quadkey,
                    tile_size: t.tile_size,
                })
        })
        .collect()
}

/// Region of `outer` covered by `inner`, `depth` levels below it, in unit
/// coordinates of `outer`.
fn sub_rect(outer: TileCoord, inner: TileCoord, depth: u8) -> Aabb2D {
    let n = f64::from(depth).exp2();
    let x = f64::from(inner.x - (outer.x << depth));
    let y = f64::from(inner.y - (outer.y << depth));
    Aabb2D::new(x / n, y / n, (x + 1.0) / n, (y + 1.0) / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_rect_of_grandchild() {
        let outer = TileCoord::from_quadkey("1").unwrap();
        let inner = TileCoord::from_quadkey("123").unwrap();
        assert_eq!(sub_rect(outer, inner, 2), Aabb2D::new(0.25, 0.75, 0.5, 1.0));
        let child = TileCoord::from_quadkey("13").unwrap();
        assert_eq!(sub_rect(outer, child, 1), Aabb2D::new(0.5, 0.5, 1.0, 1.0));
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = DisplayConfig::default();
        assert_eq!(config.bucket_capacity, 256);
        assert_eq!(config.steps_per_frame, 8);
        assert_eq!(config.features_per_step, 16);
        assert_eq!(config.min_extrude_height, 0.01);
        assert_eq!(config.collision.debounce, Duration::from_millis(150));
    }
}
