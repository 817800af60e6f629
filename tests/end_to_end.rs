//! Full pipeline over a synthetic image: quantize, solve, encode.

use std::sync::Arc;

use stringtrace::engine::{Buffer2d, Color, ColorQuantizer, PriorityPool, StringArtSolver};

const BLACK: Color = Color::opaque(0.0, 0.0, 0.0);
const WHITE: Color = Color::opaque(1.0, 1.0, 1.0);

/// 16x16, left half black, right half white.
fn split_image() -> Buffer2d<Color> {
    let mut img = Buffer2d::new(16, 16, WHITE);
    for y in 0..16 {
        for x in 0..8 {
            img[(x, y)] = BLACK;
        }
    }
    img
}

fn run_solver(palette: Vec<Color>, seed: u64) -> (Buffer2d<Color>, String) {
    let solver = StringArtSolver::builder()
        .target_img(split_image())
        .palette(palette)
        .background_color(WHITE)
        .img_diameter_cm(0.4)
        .nail_count(12)
        .nail_diameter_cm(0.1)
        .nail_img_dist_cm(0.1)
        .string_diameter_cm(0.05)
        .max_chords_per_color(32)
        .reorder_iterations(100)
        .seed(seed)
        .thread_pool(Arc::new(PriorityPool::new(2)))
        .build()
        .unwrap();
    let output = solver.solve().unwrap();
    (output.image, output.sequence.encode())
}

#[test]
fn quantizer_recovers_the_two_image_colors() {
    let target = split_image();
    let pool = Arc::new(PriorityPool::new(2));
    let quantizer = ColorQuantizer::new(&target, None, pool).unwrap();
    let mut palette: Vec<[u8; 4]> = quantizer
        .palette(2, 2, 0.01, 1, &[])
        .unwrap()
        .iter()
        .map(|c| c.to_rgba8())
        .collect();
    palette.sort_unstable();
    assert_eq!(palette, vec![[0, 0, 0, 255], [255, 255, 255, 255]]);
}

#[test]
fn solver_draws_chords_and_improves_on_the_blank_canvas() {
    let target = split_image();
    let (image, encoded) = run_solver(vec![BLACK], 7);

    assert_eq!(image.w(), 16);
    assert_eq!(image.h(), 16);
    // The black half guarantees strongly negative chords exist, so the
    // sequence cannot be empty.
    assert!(
        encoded.lines().any(|l| l.starts_with("L ")),
        "expected at least one chord, got:\n{encoded}"
    );
    for line in encoded.lines() {
        assert!(line.starts_with("C ") || line.starts_with("L "), "bad line {line:?}");
    }

    let baseline: f64 = target.iter().map(|(_, _, &t)| WHITE.dist_sq(t)).sum();
    let achieved: f64 = target
        .iter()
        .map(|(x, y, &t)| image[(x, y)].dist_sq(t))
        .sum();
    assert!(
        achieved < baseline,
        "chords must beat the blank canvas: {achieved} vs {baseline}"
    );
}

#[test]
fn pipeline_is_deterministic_for_a_fixed_seed() {
    let (image_a, encoded_a) = run_solver(vec![BLACK, WHITE], 42);
    let (image_b, encoded_b) = run_solver(vec![BLACK, WHITE], 42);
    assert_eq!(encoded_a, encoded_b);
    assert_eq!(image_a, image_b);
}
