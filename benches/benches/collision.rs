// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Vec2};
use understory_tile_index::collision::{CollisionConfig, CollisionHandler, ScreenView, VisibleTile};
use understory_tile_index::{Backend, BufferArena, FlatVec, TileCoord, TileSize, UniformGrid};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

#[derive(Clone, Copy)]
struct Candidate {
    x: f64,
    y: f64,
    half_width: f64,
    half_height: f64,
    priority: f64,
    slope: Option<Vec2>,
}

fn gen_candidates(count: usize, seed: u64) -> Vec<Candidate> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|i| Candidate {
            x: rng.next_f64() * 512.0,
            y: rng.next_f64() * 512.0,
            half_width: 8.0 + rng.next_f64() * 40.0,
            half_height: 6.0,
            priority: rng.next_f64() * 100.0,
            slope: (i % 4 == 0).then(|| Vec2::new(rng.next_f64(), rng.next_f64())),
        })
        .collect()
}

/// Level-3 quadkeys of an `n` by `n` block of 512 tiles.
fn tile_block(n: u32) -> Vec<String> {
    let mut out = Vec::new();
    for y in 0..n {
        for x in 0..n {
            out.push(TileCoord::new(3, x, y).unwrap().to_quadkey());
        }
    }
    out
}

fn populate<B: Backend + Default>(
    handler: &mut CollisionHandler<B>,
    tiles: &[String],
    per_tile: usize,
) {
    for (i, quadkey) in tiles.iter().enumerate() {
        let mut batch = handler
            .init_tile(quadkey, TileSize::Size512, "labels")
            .unwrap();
        for c in gen_candidates(per_tile, 0x5EED_0000 + i as u64) {
            batch.insert(
                c.x,
                c.y,
                0.0,
                0.0,
                0.0,
                c.half_width,
                c.half_height,
                Some(c.priority),
                c.slope,
            );
        }
        handler.complete_tile(batch);
    }
}

fn bench_phase1_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase1_insert");
    for &count in &[100_usize, 1_000, 5_000] {
        let candidates = gen_candidates(count, 0xCAFE_F00D_DEAD_BEEF);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("tile_{count}"), |b| {
            b.iter_batched(
                || {
                    let mut handler = CollisionHandler::new(CollisionConfig::default());
                    populate(&mut handler, &tile_block(3)[..4], 200);
                    handler
                },
                |mut handler| {
                    let mut batch = handler
                        .init_tile("030", TileSize::Size512, "pois")
                        .unwrap();
                    for c in &candidates {
                        black_box(batch.insert(
                            c.x,
                            c.y,
                            0.0,
                            0.0,
                            0.0,
                            c.half_width,
                            c.half_height,
                            Some(c.priority),
                            c.slope,
                        ));
                    }
                    handler.complete_tile(batch)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn resolve_with<B: Backend + Default>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group(format!("phase2_resolve_{name}"));
    // Zoomed out to half scale so neighbouring entries start to overlap.
    let project = |x: f64, y: f64, _z: f64, _level: u8| Some(Point::new(x / 2.0, y / 2.0));
    for &n in &[2_u32, 4, 8] {
        let tiles = tile_block(n);
        let mut handler = CollisionHandler::<B>::with_backend(CollisionConfig::default());
        populate(&mut handler, &tiles, 300);
        let visible: Vec<VisibleTile<'_>> = tiles
            .iter()
            .map(|q| VisibleTile {
                layer: "labels",
                quadkey: q,
                tile_size: TileSize::Size512,
            })
            .collect();
        let entries: usize = tiles
            .iter()
            .filter_map(|q| {
                handler
                    .cache()
                    .layers(q)
                    .next()
                    .map(|(_, entries)| entries.len())
            })
            .sum();
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_function(format!("tiles_{}", n * n), |b| {
            let mut arena = BufferArena::new();
            b.iter(|| {
                let view = ScreenView {
                    projection: &project,
                    tiles: &visible,
                };
                black_box(handler.resolve(&view, &mut arena))
            });
        });
    }
    group.finish();
}

fn bench_phase2_resolve(c: &mut Criterion) {
    resolve_with::<FlatVec>(c, "flatvec");
    resolve_with::<UniformGrid>(c, "grid");
}

criterion_group!(benches, bench_phase1_insert, bench_phase2_resolve);
criterion_main!(benches);
