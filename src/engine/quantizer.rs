// -----------------------------------------------------------------------------
// Parallel k-means palette extraction over an exact-color histogram
// -----------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, warn};
use rand::seq::index::sample;
use rand_pcg::Pcg64Mcg;

use super::{row_bands, Buffer2d, Color, PriorityPool};
use crate::error::{Error, Result};

/// K-means rounds per restart before giving up on convergence.
const MAX_ROUNDS: u32 = 100;

/// Priority for histogram bands and clustering restarts. Below chord
/// evaluations so palette work never starves an in-flight solve.
const QUANTIZER_PRIORITY: i32 = 1;

/// Exact-color histogram plus the pool used for clustering restarts.
///
/// Colors are bucketed by their 8-bit RGBA encoding, so "distinct" means
/// distinct after quantization to the wire format, not distinct f32 tuples.
pub struct ColorQuantizer {
    histogram: Arc<HashMap<[u8; 4], usize>>,
    pool: Arc<PriorityPool>,
}

impl ColorQuantizer {
    /// Builds the histogram by splitting the image into one row band per
    /// worker and merging the per-band counts. A mask, when given, must match
    /// the image shape; pixels whose mask byte is zero are skipped.
    pub fn new(
        image: &Buffer2d<Color>,
        mask: Option<&Buffer2d<u8>>,
        pool: Arc<PriorityPool>,
    ) -> Result<Self> {
        if let Some(m) = mask {
            if m.w() != image.w() || m.h() != image.h() {
                return Err(Error::Config(format!(
                    "mask shape {}x{} does not match image shape {}x{}",
                    m.w(),
                    m.h(),
                    image.w(),
                    image.h()
                )));
            }
        }

        let w = image.w();
        let pixels: Arc<Vec<[u8; 4]>> =
            Arc::new(image.data().iter().map(|c| c.to_rgba8()).collect());
        let mask_bytes: Arc<Option<Vec<u8>>> = Arc::new(mask.map(|m| m.data().to_vec()));

        let mut handles = Vec::new();
        for (y0, y1) in row_bands(image.h(), pool.n_threads()) {
            let pixels = Arc::clone(&pixels);
            let mask_bytes = Arc::clone(&mask_bytes);
            handles.push(pool.submit(QUANTIZER_PRIORITY, move || {
                let mut counts: HashMap<[u8; 4], usize> = HashMap::new();
                for i in y0 * w..y1 * w {
                    if let Some(m) = mask_bytes.as_ref() {
                        if m[i] == 0 {
                            continue;
                        }
                    }
                    *counts.entry(pixels[i]).or_insert(0) += 1;
                }
                counts
            }));
        }

        let mut histogram: HashMap<[u8; 4], usize> = HashMap::new();
        for handle in handles {
            for (key, n) in handle.wait()? {
                *histogram.entry(key).or_insert(0) += n;
            }
        }
        Ok(Self {
            histogram: Arc::new(histogram),
            pool,
        })
    }

    pub fn n_distinct(&self) -> usize {
        self.histogram.len()
    }

    /// Extracts up to `n_colors` representative colors.
    ///
    /// With `n_colors == 0` or nothing in the histogram this logs an error
    /// and returns an empty palette. When the histogram already holds at most
    /// `n_colors` distinct entries they are returned verbatim. Otherwise
    /// `n_restarts` independent clusterings run in parallel (seeded `seed`,
    /// `seed + 1`, ...) and the one with the lowest inertia wins.
    ///
    /// `const_centroids` are fixed attractors that are never updated: a
    /// distinct color strictly closer to one of them than to every mutable
    /// centroid is excluded from the centroid update (used to reserve the
    /// background color).
    pub fn palette(
        &self,
        n_colors: usize,
        n_restarts: usize,
        convergence_threshold: f64,
        seed: u64,
        const_centroids: &[Color],
    ) -> Result<Vec<Color>> {
        if n_colors == 0 {
            error!("palette of zero colors requested");
            return Ok(Vec::new());
        }
        if self.histogram.is_empty() {
            error!("color histogram is empty, no palette to extract");
            return Ok(Vec::new());
        }

        // Sorted so restart seeding is reproducible across runs.
        let mut keys: Vec<[u8; 4]> = self.histogram.keys().copied().collect();
        keys.sort_unstable();
        let distinct: Arc<Vec<(Color, f64)>> = Arc::new(
            keys.iter()
                .map(|&k| (Color::from_rgba8(k), self.histogram[&k] as f64))
                .collect(),
        );

        if distinct.len() <= n_colors {
            if distinct.len() < n_colors {
                warn!(
                    "only {} distinct colors available, palette clamped from {n_colors}",
                    distinct.len()
                );
            }
            return Ok(distinct.iter().map(|&(c, _)| c).collect());
        }

        let mut handles = Vec::new();
        for i in 0..n_restarts.max(1) as u64 {
            let distinct = Arc::clone(&distinct);
            let fixed = const_centroids.to_vec();
            handles.push(self.pool.submit(QUANTIZER_PRIORITY, move || {
                k_means(&distinct, n_colors, convergence_threshold, seed + i, &fixed)
            }));
        }

        let mut best: Option<(Vec<Color>, f64)> = None;
        for handle in handles {
            let (centroids, inertia) = handle.wait()?;
            if best.as_ref().map_or(true, |(_, b)| inertia < *b) {
                best = Some((centroids, inertia));
            }
        }
        // n_restarts >= 1, so best is always populated here.
        Ok(best.map(|(c, _)| c).unwrap_or_default())
    }
}

/// One weighted k-means run; returns the centroids and their inertia.
fn k_means(
    distinct: &[(Color, f64)],
    k: usize,
    convergence_threshold: f64,
    seed: u64,
    const_centroids: &[Color],
) -> (Vec<Color>, f64) {
    let mut rng = Pcg64Mcg::new(seed as u128);
    let mut centroids: Vec<Color> = sample(&mut rng, distinct.len(), k)
        .iter()
        .map(|i| distinct[i].0)
        .collect();

    let mut rounds = 0;
    loop {
        // Assignment: weighted channel sums per mutable centroid. A color
        // strictly closer to a fixed centroid contributes to neither.
        let mut sums = vec![[0.0f64; 4]; k];
        let mut weights = vec![0.0f64; k];
        for &(color, weight) in distinct {
            let fixed_d = const_centroids
                .iter()
                .map(|c| c.dist_sq(color))
                .fold(f64::INFINITY, f64::min);
            let (nearest, mutable_d) = nearest_centroid(&centroids, color);
            if fixed_d < mutable_d {
                continue;
            }
            sums[nearest][0] += color.r as f64 * weight;
            sums[nearest][1] += color.g as f64 * weight;
            sums[nearest][2] += color.b as f64 * weight;
            sums[nearest][3] += color.a as f64 * weight;
            weights[nearest] += weight;
        }

        let mut delta = 0.0;
        for i in 0..k {
            if weights[i] <= 0.0 {
                // Empty cluster keeps its previous centroid.
                continue;
            }
            let updated = Color::new(
                (sums[i][0] / weights[i]) as f32,
                (sums[i][1] / weights[i]) as f32,
                (sums[i][2] / weights[i]) as f32,
                (sums[i][3] / weights[i]) as f32,
            );
            delta += centroids[i].dist(updated);
            centroids[i] = updated;
        }

        rounds += 1;
        if delta <= convergence_threshold {
            break;
        }
        if rounds >= MAX_ROUNDS {
            warn!("k-means did not converge after {MAX_ROUNDS} rounds (delta {delta:.3e})");
            break;
        }
    }

    let inertia = distinct
        .iter()
        .map(|&(color, weight)| {
            let fixed_d = const_centroids
                .iter()
                .map(|c| c.dist_sq(color))
                .fold(f64::INFINITY, f64::min);
            let (_, mutable_d) = nearest_centroid(&centroids, color);
            fixed_d.min(mutable_d) * weight
        })
        .sum();
    (centroids, inertia)
}

fn nearest_centroid(centroids: &[Color], color: Color) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = c.dist_sq(color);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Arc<PriorityPool> {
        Arc::new(PriorityPool::new(2))
    }

    fn gradient(w: usize, h: usize) -> Buffer2d<Color> {
        let mut img = Buffer2d::new(w, h, Color::default());
        for y in 0..h {
            for x in 0..w {
                img[(x, y)] = Color::opaque(x as f32 / w as f32, y as f32 / h as f32, 0.5);
            }
        }
        img
    }

    #[test]
    fn few_distinct_colors_come_back_verbatim() {
        let mut img = Buffer2d::new(4, 1, Color::opaque(1.0, 0.0, 0.0));
        img[(0, 0)] = Color::opaque(0.0, 1.0, 0.0);
        img[(1, 0)] = Color::opaque(0.0, 0.0, 1.0);
        let q = ColorQuantizer::new(&img, None, pool()).unwrap();
        assert_eq!(q.n_distinct(), 3);
        let mut palette = q.palette(8, 2, 1e-3, 1, &[]).unwrap();
        palette.sort_by_key(|c| c.to_rgba8());
        let mut expect = vec![
            Color::opaque(1.0, 0.0, 0.0),
            Color::opaque(0.0, 1.0, 0.0),
            Color::opaque(0.0, 0.0, 1.0),
        ];
        expect.sort_by_key(|c| c.to_rgba8());
        let palette: Vec<[u8; 4]> = palette.iter().map(|c| c.to_rgba8()).collect();
        let expect: Vec<[u8; 4]> = expect.iter().map(|c| c.to_rgba8()).collect();
        assert_eq!(palette, expect);
    }

    #[test]
    fn zero_colors_and_empty_histogram_yield_empty_palettes() {
        let img = gradient(8, 8);
        let q = ColorQuantizer::new(&img, None, pool()).unwrap();
        assert!(q.palette(0, 2, 1e-3, 1, &[]).unwrap().is_empty());

        let masked = ColorQuantizer::new(&img, Some(&Buffer2d::new(8, 8, 0u8)), pool()).unwrap();
        assert_eq!(masked.n_distinct(), 0);
        assert!(masked.palette(4, 2, 1e-3, 1, &[]).unwrap().is_empty());
    }

    #[test]
    fn mismatched_mask_is_a_config_error() {
        let img = gradient(4, 4);
        let mask = Buffer2d::new(4, 3, 1u8);
        match ColorQuantizer::new(&img, Some(&mask), pool()) {
            Err(Error::Config(msg)) => assert!(msg.contains("mask")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn mask_restricts_the_histogram() {
        let mut img = Buffer2d::new(2, 1, Color::opaque(0.0, 0.0, 0.0));
        img[(1, 0)] = Color::opaque(1.0, 1.0, 1.0);
        let mut mask = Buffer2d::new(2, 1, 0u8);
        mask[(1, 0)] = 255;
        let q = ColorQuantizer::new(&img, Some(&mask), pool()).unwrap();
        assert_eq!(q.n_distinct(), 1);
        let palette = q.palette(1, 1, 1e-3, 1, &[]).unwrap();
        assert_eq!(palette[0].to_rgba8(), [255, 255, 255, 255]);
    }

    #[test]
    fn clustering_never_produces_invalid_centroids() {
        let img = gradient(32, 32);
        let q = ColorQuantizer::new(&img, None, pool()).unwrap();
        assert!(q.n_distinct() > 4);
        for seed in 0..4 {
            let palette = q.palette(4, 3, 1e-4, seed, &[]).unwrap();
            assert_eq!(palette.len(), 4);
            for c in palette {
                for ch in [c.r, c.g, c.b, c.a] {
                    assert!(ch.is_finite());
                    assert!((0.0..=1.0).contains(&ch), "channel {ch} out of range");
                }
            }
        }
    }

    #[test]
    fn const_centroid_absorbs_its_cluster() {
        let white = Color::opaque(1.0, 1.0, 1.0);
        let black = Color::opaque(0.0, 0.0, 0.0);
        let mut img = Buffer2d::new(8, 1, white);
        img[(0, 0)] = black;
        let q = ColorQuantizer::new(&img, None, pool()).unwrap();
        let palette = q.palette(1, 2, 1e-4, 3, &[white]).unwrap();
        assert_eq!(palette.len(), 1);
        // White pixels are captured by the fixed centroid, so the one mutable
        // centroid settles on black.
        assert_eq!(palette[0].to_rgba8(), [0, 0, 0, 255]);
    }
}
