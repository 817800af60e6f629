use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use stringtrace::engine::{Color, ColorQuantizer, PriorityPool, StringArtSolver};
use stringtrace::io;

/// Approximates an image with colored strings strung between nails on a
/// circular rim, emitting the rendered result and the winding sequence.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Target image
    input: PathBuf,

    /// Rendered output image
    #[arg(short, long, default_value = "out.png")]
    output: PathBuf,

    /// Move-sequence text file
    #[arg(short, long, default_value = "sequence.txt")]
    sequence: PathBuf,

    /// Optional mask image; only pixels with nonzero luma feed the palette
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Number of nails on the rim
    #[arg(long, default_value_t = 200)]
    nails: u32,

    /// Physical image diameter in centimeters
    #[arg(long, default_value_t = 20.0)]
    img_diameter_cm: f64,

    /// Nail diameter in centimeters
    #[arg(long, default_value_t = 0.1)]
    nail_diameter_cm: f64,

    /// Gap between the image circle and the nail ring, in centimeters
    #[arg(long, default_value_t = 0.1)]
    nail_img_dist_cm: f64,

    /// String diameter in centimeters
    #[arg(long, default_value_t = 0.05)]
    string_diameter_cm: f64,

    /// Palette size
    #[arg(long, default_value_t = 8)]
    colors: usize,

    /// Independent k-means restarts
    #[arg(long, default_value_t = 16)]
    restarts: usize,

    /// K-means convergence threshold (total centroid movement)
    #[arg(long, default_value_t = 0.01)]
    convergence: f64,

    /// Maximum chords per color layer
    #[arg(long, default_value_t = 4096)]
    max_chords: u32,

    /// Annealing iterations for layer reordering
    #[arg(long, default_value_t = 1000)]
    reorder_iterations: u32,

    /// Worker threads for chord evaluation (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// RNG seed for k-means and reordering
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("loading image {}", args.input.display());
    let target = io::load_rgba(&args.input)?;
    let mask = args.mask.as_deref().map(io::load_mask).transpose()?;

    let pool = Arc::new(PriorityPool::new(args.threads));
    let background = Color::opaque(1.0, 1.0, 1.0);

    info!("building {}-color palette", args.colors);
    let quantizer = ColorQuantizer::new(&target, mask.as_ref(), Arc::clone(&pool))?;
    let palette = quantizer.palette(
        args.colors,
        args.restarts,
        args.convergence,
        args.seed,
        &[background],
    )?;
    let swatches: Vec<String> = palette
        .iter()
        .map(|c| {
            let [r, g, b, _] = c.to_rgba8();
            format!("({r}, {g}, {b})")
        })
        .collect();
    info!("palette: {{ {} }}", swatches.join(", "));

    let solver = StringArtSolver::builder()
        .target_img(target)
        .palette(palette)
        .background_color(background)
        .img_diameter_cm(args.img_diameter_cm)
        .nail_count(args.nails)
        .nail_diameter_cm(args.nail_diameter_cm)
        .nail_img_dist_cm(args.nail_img_dist_cm)
        .string_diameter_cm(args.string_diameter_cm)
        .max_chords_per_color(args.max_chords)
        .reorder_iterations(args.reorder_iterations)
        .seed(args.seed)
        .thread_pool(pool)
        .build()?;

    info!("solving");
    let output = solver.solve()?;

    info!("saving sequence {}", args.sequence.display());
    std::fs::write(&args.sequence, output.sequence.encode())
        .with_context(|| format!("writing {}", args.sequence.display()))?;

    info!("saving image {}", args.output.display());
    io::save_rgba(&args.output, &output.image)?;
    Ok(())
}
