// -----------------------------------------------------------------------------
// Color: RGBA in [0,1] with src-over compositing
// -----------------------------------------------------------------------------

/// RGBA color, channels in [0,1]. Compositing happens in unpremultiplied
/// float space; only I/O boundaries quantize to 8 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self {
            r: px[0] as f32 / 255.0,
            g: px[1] as f32 / 255.0,
            b: px[2] as f32 / 255.0,
            a: px[3] as f32 / 255.0,
        }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let c = self.clamp();
        [
            (c.r * 255.0).round() as u8,
            (c.g * 255.0).round() as u8,
            (c.b * 255.0).round() as u8,
            (c.a * 255.0).round() as u8,
        ]
    }

    /// `top` composited over `self`, unpremultiplied src-over.
    pub fn over(self, top: Color) -> Color {
        let ao = top.a + self.a * (1.0 - top.a);
        if ao <= 0.0 {
            return Color::default();
        }
        Color {
            r: (top.r * top.a + self.r * self.a * (1.0 - top.a)) / ao,
            g: (top.g * top.a + self.g * self.a * (1.0 - top.a)) / ao,
            b: (top.b * top.a + self.b * self.a * (1.0 - top.a)) / ao,
            a: ao,
        }
    }

    #[inline]
    pub fn dist_sq(self, o: Color) -> f64 {
        let dr = (self.r - o.r) as f64;
        let dg = (self.g - o.g) as f64;
        let db = (self.b - o.b) as f64;
        let da = (self.a - o.a) as f64;
        dr * dr + dg * dg + db * db + da * da
    }

    #[inline]
    pub fn dist(self, o: Color) -> f64 {
        self.dist_sq(o).sqrt()
    }

    pub fn clamp(self) -> Color {
        Color {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}
