// -----------------------------------------------------------------------------
// Greedy incremental chord search for one color layer
// -----------------------------------------------------------------------------
//
// Two-phase cycle per step: evaluate every candidate chord out of the last
// nail (fanned out on the chord pool, read-only on the canvases), then commit
// the winner on the driver thread. `current` therefore never has concurrent
// writers.

use std::sync::Arc;

use log::{info, warn};
use once_cell::sync::OnceCell;

use super::{line_coverage, Buffer2d, Color, NailId, PriorityPool, StringLine, Vec2, Wrap};
use crate::error::Result;

/// Shared intensity ceiling for `target` and `current`.
pub(crate) const MAX_INTENSITY: f32 = 1.0;

/// Candidates shorter than this many pixels are never selected.
const MIN_CHORD_LEN_PX: f64 = 2.0;

/// A step must improve total squared error by at least this much to keep
/// going; slightly below zero to tolerate floating noise.
const STOP_EPSILON: f64 = 1e-4;

/// Chord evaluations outrank coarser work so a color driver waiting on its
/// fan-out drains quickly.
const CHORD_PRIORITY: i32 = 2;

/// Falloff of string intensity with perpendicular distance: 1 on the ideal
/// line, smoothstep down to 0 at the string radius.
#[inline]
fn line_contribution(d: f64, string_radius: f64) -> f32 {
    let t = 1.0 - (d.abs() / string_radius).min(1.0);
    (t * t * (3.0 - 2.0 * t)) as f32
}

/// Signed change in total squared error if `chord` were drawn, computed over
/// exactly the pixels the rasterizer touches. Does not mutate `current`.
pub(crate) fn evaluate_chord(
    target: &Buffer2d<f32>,
    current: &Buffer2d<f32>,
    chord: &StringLine,
    string_radius: f64,
) -> f64 {
    if chord.start_pos().dist(chord.end_pos()) < MIN_CHORD_LEN_PX {
        return f64::INFINITY;
    }
    let mut delta = 0.0f64;
    line_coverage(chord.start_pos(), chord.end_pos(), 2.0 * string_radius, |x, y, d| {
        if let (Some(&cur), Some(&tgt)) = (current.get(x, y), target.get(x, y)) {
            let drawn = (cur + line_contribution(d, string_radius)).min(MAX_INTENSITY);
            let old_err = (cur - tgt) as f64;
            let new_err = (drawn - tgt) as f64;
            delta += new_err * new_err - old_err * old_err;
        }
    });
    delta
}

/// Re-rasterizes `chord` and accumulates its coverage into `current`,
/// saturating at [`MAX_INTENSITY`].
pub(crate) fn commit_chord(current: &mut Buffer2d<f32>, chord: &StringLine, string_radius: f64) {
    line_coverage(chord.start_pos(), chord.end_pos(), 2.0 * string_radius, |x, y, d| {
        if let Some(cur) = current.get_mut(x, y) {
            *cur = (*cur + line_contribution(d, string_radius)).min(MAX_INTENSITY);
        }
    });
}

/// One finished color layer: the chords in draw order plus the coverage they
/// produced. The tinted RGBA rendering is computed on first use and cached.
pub struct ColorLayerResult {
    pub color: Color,
    pub moves: Vec<StringLine>,
    coverage: Buffer2d<f32>,
    layer: OnceCell<Buffer2d<Color>>,
}

impl ColorLayerResult {
    /// Coverage tinted with the layer color, alpha = accumulated intensity.
    pub fn layer(&self) -> &Buffer2d<Color> {
        self.layer.get_or_init(|| {
            let mut img = Buffer2d::new(self.coverage.w(), self.coverage.h(), Color::default());
            for (x, y, &v) in self.coverage.iter() {
                img[(x, y)] = Color::new(self.color.r, self.color.g, self.color.b, v);
            }
            img
        })
    }

    pub fn coverage(&self) -> &Buffer2d<f32> {
        &self.coverage
    }
}

/// Greedy driver for a single palette color.
pub(crate) struct ColorSolver {
    target: Arc<Buffer2d<f32>>,
    current: Arc<Buffer2d<f32>>,
    color: Color,
    nails: Arc<Vec<Vec2>>,
    nail_radius: f64,
    string_radius: f64,
    pool: Arc<PriorityPool>,
    max_chords: u32,
}

impl ColorSolver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        image: &Buffer2d<Color>,
        color: Color,
        background: Color,
        nails: Arc<Vec<Vec2>>,
        nail_radius: f64,
        string_radius: f64,
        pool: Arc<PriorityPool>,
        max_chords: u32,
    ) -> Self {
        // Affinity field: 1 where the pixel is this color, 0 where it is the
        // background, graded in between.
        let mut target = Buffer2d::new(image.w(), image.h(), 0.0f32);
        for (x, y, &px) in image.iter() {
            let d_color = px.dist(color);
            let d_bg = px.dist(background);
            let denom = d_color + d_bg;
            target[(x, y)] = if denom < 1e-12 { 0.0 } else { (d_bg / denom) as f32 };
        }
        let current = Buffer2d::new(image.w(), image.h(), 0.0f32);
        Self {
            target: Arc::new(target),
            current: Arc::new(current),
            color,
            nails,
            nail_radius,
            string_radius,
            pool,
            max_chords,
        }
    }

    /// Runs the evaluate/commit loop until no candidate improves the error
    /// or the chord cap is hit, then returns the finished layer.
    pub(crate) fn solve(mut self) -> Result<ColorLayerResult> {
        let n_nails = self.nails.len() as NailId;
        let mut moves: Vec<StringLine> = Vec::new();
        let mut last: (NailId, Wrap) = (0, Wrap::Clockwise);

        for step in 0..self.max_chords {
            let mut handles = Vec::with_capacity(2 * (n_nails as usize - 1));
            for end in 0..n_nails {
                if end == last.0 {
                    continue;
                }
                for wrap in [Wrap::Clockwise, Wrap::Anticlockwise] {
                    let target = Arc::clone(&self.target);
                    let current = Arc::clone(&self.current);
                    let nails = Arc::clone(&self.nails);
                    let (nail_radius, string_radius) = (self.nail_radius, self.string_radius);
                    let start = last;
                    let handle = self.pool.submit(CHORD_PRIORITY, move || {
                        let chord = StringLine::new(
                            &nails,
                            nail_radius,
                            string_radius,
                            start.0,
                            start.1,
                            end,
                            wrap,
                        );
                        evaluate_chord(&target, &current, &chord, string_radius)
                    });
                    handles.push((end, wrap, handle));
                }
            }

            let mut best: Option<(f64, NailId, Wrap)> = None;
            for (end, wrap, handle) in handles {
                let delta = handle.wait()?;
                if best.map_or(true, |(d, _, _)| delta < d) {
                    best = Some((delta, end, wrap));
                }
            }
            let Some((delta, end, wrap)) = best else {
                break;
            };
            if !(delta < -STOP_EPSILON) {
                info!(
                    "color layer converged after {} chords (best delta {delta:.3e})",
                    moves.len()
                );
                break;
            }

            let chord = StringLine::new(
                &self.nails,
                self.nail_radius,
                self.string_radius,
                last.0,
                last.1,
                end,
                wrap,
            );
            // All evaluation handles are done, so the driver holds the only
            // reference and make_mut mutates in place.
            commit_chord(Arc::make_mut(&mut self.current), &chord, self.string_radius);
            moves.push(chord);
            last = (end, wrap);

            if step + 1 == self.max_chords {
                warn!(
                    "chord cap {} reached before convergence, returning partial layer",
                    self.max_chords
                );
            }
        }

        Ok(ColorLayerResult {
            color: self.color,
            moves,
            coverage: Arc::try_unwrap(self.current).unwrap_or_else(|arc| (*arc).clone()),
            layer: OnceCell::new(),
        })
    }
}
