// -----------------------------------------------------------------------------
// Orchestration: builder, per-color fan-out, layer merge, annealed reorder
// -----------------------------------------------------------------------------

use std::sync::Arc;

use log::{error, info};
use rand::Rng;

use super::{
    row_bands, AnnealingOptimizer, Buffer2d, Color, ColorLayerResult, ColorSolver, PriorityPool,
    StringSequence, Vec2,
};
use crate::error::{Error, Result};

/// Priority for color-layer driver tasks on the secondary pool.
const COLOR_PRIORITY: i32 = 1;

/// Priority for reorder-energy row bands on the main pool. Above chord work,
/// though none is in flight by the time reordering starts.
const REORDER_PRIORITY: i32 = 3;

/// Evenly spaced positions on a circle, nail 0 at angle zero, increasing
/// anticlockwise.
pub fn nail_ring(center: Vec2, radius: f64, n: u32) -> Vec<Vec2> {
    (0..n)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            center + Vec2::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Merged canvas plus the per-color move sequences in final draw order.
pub struct StringArtOutput {
    pub image: Buffer2d<Color>,
    pub sequence: StringSequence,
}

pub struct StringArtSolver {
    target_img: Arc<Buffer2d<Color>>,
    palette: Vec<Color>,
    background_color: Color,
    nail_radius_px: f64,
    string_radius_px: f64,
    nail_positions: Arc<Vec<Vec2>>,
    pool: Arc<PriorityPool>,
    max_chords_per_color: u32,
    reorder_iterations: u32,
    seed: u64,
}

impl StringArtSolver {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn nail_positions(&self) -> &[Vec2] {
        &self.nail_positions
    }

    pub fn nail_radius_px(&self) -> f64 {
        self.nail_radius_px
    }

    /// Solves every palette color in parallel on a secondary pool sized for
    /// color-level work (chord evaluation inside each solver uses the main
    /// pool), then merges the layers and, when more than one exists, anneals
    /// their draw order against the target image.
    pub fn solve(self) -> Result<StringArtOutput> {
        let color_pool = PriorityPool::new(self.palette.len());
        let mut handles = Vec::with_capacity(self.palette.len());
        for &color in &self.palette {
            let target_img = Arc::clone(&self.target_img);
            let nails = Arc::clone(&self.nail_positions);
            let pool = Arc::clone(&self.pool);
            let (background, nail_r, string_r, cap) = (
                self.background_color,
                self.nail_radius_px,
                self.string_radius_px,
                self.max_chords_per_color,
            );
            handles.push(color_pool.submit(COLOR_PRIORITY, move || {
                ColorSolver::new(&target_img, color, background, nails, nail_r, string_r, pool, cap)
                    .solve()
            }));
        }
        let mut layers = Vec::with_capacity(handles.len());
        for handle in handles {
            layers.push(handle.wait()??);
        }
        drop(color_pool);
        let layers: Arc<Vec<ColorLayerResult>> = Arc::new(layers);

        let order = if layers.len() > 1 {
            self.reorder_layers(&layers)
        } else {
            (0..layers.len()).collect()
        };

        let image = composite(&self.target_img, self.background_color, &layers, &order);
        let mut sequence = StringSequence::new();
        for &i in &order {
            sequence.push(layers[i].color, layers[i].moves.clone());
        }
        info!(
            "solved {} color layers, {} chords total",
            layers.len(),
            sequence.n_chords()
        );
        Ok(StringArtOutput { image, sequence })
    }

    /// Searches layer permutations for the composite closest to the target.
    fn reorder_layers(&self, layers: &Arc<Vec<ColorLayerResult>>) -> Vec<usize> {
        // Render every layer once up front so energy tasks only read.
        for layer in layers.iter() {
            layer.layer();
        }
        let initial: Vec<usize> = (0..layers.len()).collect();
        let initial_energy = self.order_energy(layers, &initial);
        let temp = (initial_energy * 0.05).max(1e-6);
        let annealer = AnnealingOptimizer::new(self.reorder_iterations, temp, 0.995);
        let (best, best_energy) = annealer.optimize(
            initial,
            self.seed,
            |order, rng| {
                let mut next = order.clone();
                let i = rng.gen_range(0..next.len());
                let j = rng.gen_range(0..next.len());
                next.swap(i, j);
                next
            },
            |order| self.order_energy(layers, order),
        );
        info!(
            "layer reorder: energy {initial_energy:.1} -> {best_energy:.1} over {} iterations",
            self.reorder_iterations
        );
        best
    }

    /// Total squared color error of the composite drawn in `order`, reduced
    /// over row bands on the main pool. A failed band scores the permutation
    /// as unusable rather than aborting the search.
    fn order_energy(&self, layers: &Arc<Vec<ColorLayerResult>>, order: &[usize]) -> f64 {
        let mut handles = Vec::new();
        for (y0, y1) in row_bands(self.target_img.h(), self.pool.n_threads()) {
            let target = Arc::clone(&self.target_img);
            let layers = Arc::clone(layers);
            let order = order.to_vec();
            let background = self.background_color;
            handles.push(self.pool.submit(REORDER_PRIORITY, move || {
                let mut band_sum = 0.0f64;
                for y in y0..y1 {
                    for x in 0..target.w() {
                        let mut px = background;
                        for &i in &order {
                            px = px.over(layers[i].layer()[(x, y)]);
                        }
                        band_sum += px.dist_sq(target[(x, y)]);
                    }
                }
                band_sum
            }));
        }
        let mut sum = 0.0f64;
        for handle in handles {
            match handle.wait() {
                Ok(band_sum) => sum += band_sum,
                Err(err) => {
                    error!("reorder energy band failed ({err}), discarding permutation");
                    sum = f64::INFINITY;
                }
            }
        }
        sum
    }
}

/// Background-filled canvas with each layer composited on top in `order`.
fn composite(
    target: &Buffer2d<Color>,
    background: Color,
    layers: &[ColorLayerResult],
    order: &[usize],
) -> Buffer2d<Color> {
    let mut out = Buffer2d::new(target.w(), target.h(), background);
    for &i in order {
        let layer = layers[i].layer();
        for (x, y, &px) in layer.iter() {
            out[(x, y)] = out[(x, y)].over(px);
        }
    }
    out
}

/// Staged construction mirroring the physical setup: diameters and distances
/// in centimeters, converted to pixels against the image's physical diameter.
pub struct Builder {
    target_img: Buffer2d<Color>,
    palette: Vec<Color>,
    background_color: Color,
    img_diameter_cm: f64,
    nail_count: u32,
    nail_diameter_cm: f64,
    nail_img_dist_cm: f64,
    string_diameter_cm: f64,
    thread_pool: Option<Arc<PriorityPool>>,
    max_chords_per_color: u32,
    reorder_iterations: u32,
    seed: u64,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            target_img: Buffer2d::new(0, 0, Color::default()),
            palette: Vec::new(),
            background_color: Color::opaque(1.0, 1.0, 1.0),
            img_diameter_cm: 0.0,
            nail_count: 0,
            nail_diameter_cm: 0.15,
            nail_img_dist_cm: 1.0,
            string_diameter_cm: 0.05,
            thread_pool: None,
            max_chords_per_color: 4096,
            reorder_iterations: 1000,
            seed: 0,
        }
    }
}

impl Builder {
    pub fn target_img(mut self, img: Buffer2d<Color>) -> Self {
        self.target_img = img;
        self
    }

    pub fn palette(mut self, palette: Vec<Color>) -> Self {
        self.palette = palette;
        self
    }

    pub fn background_color(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn img_diameter_cm(mut self, diameter: f64) -> Self {
        self.img_diameter_cm = diameter;
        self
    }

    pub fn nail_count(mut self, count: u32) -> Self {
        self.nail_count = count;
        self
    }

    pub fn nail_diameter_cm(mut self, diameter: f64) -> Self {
        self.nail_diameter_cm = diameter;
        self
    }

    pub fn nail_img_dist_cm(mut self, distance: f64) -> Self {
        self.nail_img_dist_cm = distance;
        self
    }

    pub fn string_diameter_cm(mut self, diameter: f64) -> Self {
        self.string_diameter_cm = diameter;
        self
    }

    pub fn thread_pool(mut self, pool: Arc<PriorityPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    pub fn max_chords_per_color(mut self, cap: u32) -> Self {
        self.max_chords_per_color = cap;
        self
    }

    pub fn reorder_iterations(mut self, iterations: u32) -> Self {
        self.reorder_iterations = iterations;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<StringArtSolver> {
        if self.target_img.w() == 0 || self.target_img.h() == 0 {
            return Err(Error::Config("input image is empty".into()));
        }
        if self.palette.is_empty() {
            return Err(Error::Config("palette is empty".into()));
        }
        if self.img_diameter_cm <= 0.0 {
            return Err(Error::Config("image diameter must be greater than 0".into()));
        }
        if self.nail_count < 3 {
            return Err(Error::Config("nail count must be at least 3".into()));
        }
        if self.nail_diameter_cm <= 0.0 {
            return Err(Error::Config("nail diameter must be greater than 0".into()));
        }
        if self.nail_diameter_cm >= self.img_diameter_cm {
            return Err(Error::Config("nail diameter must be less than image diameter".into()));
        }
        if self.nail_img_dist_cm <= 0.0 {
            return Err(Error::Config("nail-image distance must be greater than 0".into()));
        }
        if self.string_diameter_cm <= 0.0 {
            return Err(Error::Config("string diameter must be greater than 0".into()));
        }
        if self.string_diameter_cm >= self.img_diameter_cm {
            return Err(Error::Config("string diameter must be less than image diameter".into()));
        }
        let Some(pool) = self.thread_pool else {
            return Err(Error::Config("thread pool is not set".into()));
        };

        let (w, h) = (self.target_img.w() as f64, self.target_img.h() as f64);
        let px_per_cm = w.min(h) / self.img_diameter_cm;
        let nail_radius_px = self.nail_diameter_cm / 2.0 * px_per_cm;
        let string_radius_px = self.string_diameter_cm / 2.0 * px_per_cm;
        // Nails sit on a ring just outside the image circle.
        let ring_radius = w.min(h) / 2.0 + (self.nail_img_dist_cm + self.nail_diameter_cm / 2.0) * px_per_cm;
        let center = Vec2::new(w / 2.0, h / 2.0);

        Ok(StringArtSolver {
            target_img: Arc::new(self.target_img),
            palette: self.palette,
            background_color: self.background_color,
            nail_radius_px,
            string_radius_px,
            nail_positions: Arc::new(nail_ring(center, ring_radius, self.nail_count)),
            pool,
            max_chords_per_color: self.max_chords_per_color,
            reorder_iterations: self.reorder_iterations,
            seed: self.seed,
        })
    }
}
