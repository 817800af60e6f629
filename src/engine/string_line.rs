// -----------------------------------------------------------------------------
// StringLine: one chord between two nails, with tangent-offset endpoints
// -----------------------------------------------------------------------------

use super::Vec2;

pub type NailId = u32;

/// Which side of a nail the string passes, so chords never cut through the
/// nail's physical radius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    Clockwise,
    Anticlockwise,
}

impl Wrap {
    #[inline]
    pub(crate) fn sign(self) -> f64 {
        match self {
            Wrap::Clockwise => -1.0,
            Wrap::Anticlockwise => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Wrap::Clockwise => Wrap::Anticlockwise,
            Wrap::Anticlockwise => Wrap::Clockwise,
        }
    }

    /// Token used by the move-sequence text encoding.
    pub fn token(self) -> &'static str {
        match self {
            Wrap::Clockwise => "c",
            Wrap::Anticlockwise => "ac",
        }
    }
}

/// Immutable chord value. The drawn segment is offset from the nail centers
/// by `nail_radius + string_radius` so the string rests tangent to both
/// nails:
///
/// - equal wraps: the whole segment is translated perpendicular to the
///   nail-to-nail direction (the string stays on one side);
/// - opposite wraps: each offset is the chord direction rotated by
///   `acos((nail_r + string_r) / (L / 2))`, point-symmetric through the
///   midpoint (the string crosses between the nails).
///
/// Construction is symmetric under swapping the endpoints and inverting both
/// wraps: it yields the same physical segment with start/end exchanged.
#[derive(Clone, Copy, Debug)]
pub struct StringLine {
    start_nail: NailId,
    start_wrap: Wrap,
    end_nail: NailId,
    end_wrap: Wrap,
    start_pos: Vec2,
    end_pos: Vec2,
}

impl StringLine {
    pub fn new(
        nail_positions: &[Vec2],
        nail_radius: f64,
        string_radius: f64,
        start_nail: NailId,
        start_wrap: Wrap,
        end_nail: NailId,
        end_wrap: Wrap,
    ) -> Self {
        debug_assert_ne!(start_nail, end_nail);

        let start = nail_positions[start_nail as usize];
        let end = nail_positions[end_nail as usize];

        let dist = start.dist(end);
        let dir = (end - start).norm();
        let offset = nail_radius + string_radius;

        let (start_pos, end_pos) = if start_wrap == end_wrap {
            let shift = dir.perp() * (start_wrap.sign() * offset);
            (start + shift, end + shift)
        } else {
            // Clamp keeps nails closer than the tangent circle from
            // producing NaN; such chords fail the minimum-length guard
            // anyway.
            let alpha = (offset / (dist / 2.0)).clamp(-1.0, 1.0).acos();
            let shift = dir.rotate(alpha * start_wrap.sign()) * offset;
            (start + shift, end - shift)
        };

        Self {
            start_nail,
            start_wrap,
            end_nail,
            end_wrap,
            start_pos,
            end_pos,
        }
    }

    pub fn start_nail(&self) -> NailId {
        self.start_nail
    }

    pub fn start_wrap(&self) -> Wrap {
        self.start_wrap
    }

    pub fn start_pos(&self) -> Vec2 {
        self.start_pos
    }

    pub fn end_nail(&self) -> NailId {
        self.end_nail
    }

    pub fn end_wrap(&self) -> Wrap {
        self.end_wrap
    }

    pub fn end_pos(&self) -> Vec2 {
        self.end_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize, r: f64) -> Vec<Vec2> {
        (0..n)
            .map(|i| {
                let a = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                Vec2::new(r * a.cos(), r * a.sin())
            })
            .collect()
    }

    fn close(a: Vec2, b: Vec2) -> bool {
        a.dist(b) < 1e-9
    }

    #[test]
    fn swap_with_inverted_wraps_is_the_same_segment() {
        let nails = ring(12, 100.0);
        let cases = [
            (Wrap::Clockwise, Wrap::Clockwise),
            (Wrap::Anticlockwise, Wrap::Anticlockwise),
            (Wrap::Clockwise, Wrap::Anticlockwise),
            (Wrap::Anticlockwise, Wrap::Clockwise),
        ];
        for (ws, we) in cases {
            let fwd = StringLine::new(&nails, 2.0, 0.5, 1, ws, 7, we);
            let rev = StringLine::new(&nails, 2.0, 0.5, 7, we.flipped(), 1, ws.flipped());
            assert!(close(fwd.start_pos(), rev.end_pos()), "{ws:?}/{we:?}");
            assert!(close(fwd.end_pos(), rev.start_pos()), "{ws:?}/{we:?}");
        }
    }

    #[test]
    fn equal_wraps_translate_the_chord() {
        let nails = ring(8, 50.0);
        let line = StringLine::new(&nails, 1.5, 0.25, 0, Wrap::Clockwise, 4, Wrap::Clockwise);
        let nail_dir = (nails[4] - nails[0]).norm();
        let seg_dir = (line.end_pos() - line.start_pos()).norm();
        assert!((nail_dir.dot(seg_dir).abs() - 1.0).abs() < 1e-9, "segment stays parallel");
        // Offset magnitude equals the tangent distance.
        let off = line.start_pos() - nails[0];
        assert!((off.len() - 1.75).abs() < 1e-9);
        assert!(off.dot(nail_dir).abs() < 1e-9, "offset is perpendicular");
    }

    #[test]
    fn opposite_wraps_cross_the_center_line() {
        let nails = ring(8, 50.0);
        let line = StringLine::new(&nails, 1.5, 0.25, 0, Wrap::Clockwise, 4, Wrap::Anticlockwise);
        let axis = (nails[4] - nails[0]).norm().perp();
        let s = (line.start_pos() - nails[0]).dot(axis);
        let e = (line.end_pos() - nails[4]).dot(axis);
        assert!(s * e < 0.0, "offsets must sit on opposite sides: {s} {e}");
    }

    #[test]
    fn endpoints_stay_tangent_to_both_nails() {
        let nails = ring(16, 80.0);
        for we in [Wrap::Clockwise, Wrap::Anticlockwise] {
            let line = StringLine::new(&nails, 2.0, 0.5, 3, Wrap::Anticlockwise, 11, we);
            assert!((line.start_pos().dist(nails[3]) - 2.5).abs() < 1e-9);
            assert!((line.end_pos().dist(nails[11]) - 2.5).abs() < 1e-9);
        }
    }
}
