// -----------------------------------------------------------------------------
// Move-sequence text encoding consumed by downstream renderers
// -----------------------------------------------------------------------------

use std::fmt::Write as _;

use super::{Color, StringLine};

/// Per-color move lists in final draw order.
///
/// The text form emits, per non-empty layer, one `C r g b` line with 8-bit
/// channel values, an `L nail wrap` line for the first chord's start, then
/// one `L nail wrap` line per chord endpoint. Empty layers are skipped
/// entirely.
#[derive(Default)]
pub struct StringSequence {
    entries: Vec<(Color, Vec<StringLine>)>,
}

impl StringSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, color: Color, moves: Vec<StringLine>) {
        self.entries.push((color, moves));
    }

    pub fn entries(&self) -> &[(Color, Vec<StringLine>)] {
        &self.entries
    }

    pub fn n_layers(&self) -> usize {
        self.entries.len()
    }

    pub fn n_chords(&self) -> usize {
        self.entries.iter().map(|(_, moves)| moves.len()).sum()
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (color, moves) in &self.entries {
            let Some(first) = moves.first() else {
                continue;
            };
            let [r, g, b, _] = color.to_rgba8();
            let _ = writeln!(out, "C {r} {g} {b}");
            let _ = writeln!(out, "L {} {}", first.start_nail(), first.start_wrap().token());
            for line in moves {
                let _ = writeln!(out, "L {} {}", line.end_nail(), line.end_wrap().token());
            }
        }
        out
    }
}
