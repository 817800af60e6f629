//! String-art solver: approximates a target image with straight chords of
//! colored string stretched between nails on a circle.
//!
//! The interesting pieces live under [`engine`]: a priority-scheduled thread
//! pool, an antialiased line-coverage rasterizer, a greedy incrementally
//! scored chord search, a parallel k-means palette builder, and a generic
//! simulated-annealing optimizer used to reorder color layers.

pub mod engine;
pub mod error;
pub mod io;
