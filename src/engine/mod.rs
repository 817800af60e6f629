// engine/mod.rs
mod annealer;
mod art_solver;
mod canvas;
mod geom;
mod line;
mod pool;
mod quantizer;
mod sequence;
mod string_line;
mod string_solver;
mod types;

pub use annealer::AnnealingOptimizer;
pub use art_solver::{nail_ring, StringArtOutput, StringArtSolver};
pub use canvas::{row_bands, Buffer2d};
pub use geom::Vec2;
pub use line::line_coverage;
pub use pool::{PriorityPool, TaskHandle};
pub use quantizer::ColorQuantizer;
pub use sequence::StringSequence;
pub use string_line::{NailId, StringLine, Wrap};
pub use string_solver::ColorLayerResult;
pub use types::Color;

pub(crate) use string_solver::ColorSolver;
