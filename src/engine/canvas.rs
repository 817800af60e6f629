// -----------------------------------------------------------------------------
// Buffer2d: the one 2D container the core needs, with region views for
// row-banded parallel iteration
// -----------------------------------------------------------------------------

/// Row-major W x H buffer with a bounds-checked accessor. `Index` panics on
/// out-of-range coordinates; the rasterizer goes through [`Buffer2d::get`]
/// because chords routinely overshoot the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer2d<T> {
    w: usize,
    h: usize,
    data: Vec<T>,
}

impl<T: Clone> Buffer2d<T> {
    pub fn new(w: usize, h: usize, fill: T) -> Self {
        Self { w, h, data: vec![fill; w * h] }
    }
}

impl<T> Buffer2d<T> {
    #[inline]
    pub fn w(&self) -> usize {
        self.w
    }

    #[inline]
    pub fn h(&self) -> usize {
        self.h
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return None;
        }
        self.data.get(y as usize * self.w + x as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return None;
        }
        self.data.get_mut(y as usize * self.w + x as usize)
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.w..(y + 1) * self.w]
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Sub-rectangle view over `[x0, x1) x [y0, y1)`, clamped to the buffer.
    pub fn region(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Region<'_, T> {
        Region {
            buf: self,
            x0: x0.min(self.w),
            y0: y0.min(self.h),
            x1: x1.min(self.w),
            y1: y1.min(self.h),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.region(0, 0, self.w, self.h).iter_cells()
    }
}

impl<T> std::ops::Index<(usize, usize)> for Buffer2d<T> {
    type Output = T;
    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(x < self.w && y < self.h, "index ({x}, {y}) out of {}x{}", self.w, self.h);
        &self.data[y * self.w + x]
    }
}

impl<T> std::ops::IndexMut<(usize, usize)> for Buffer2d<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        assert!(x < self.w && y < self.h, "index ({x}, {y}) out of {}x{}", self.w, self.h);
        &mut self.data[y * self.w + x]
    }
}

/// Borrowed rectangular view, used to hand one row band to each worker.
pub struct Region<'a, T> {
    buf: &'a Buffer2d<T>,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl<'a, T> Region<'a, T> {
    pub fn iter_cells(self) -> impl Iterator<Item = (usize, usize, &'a T)> {
        let buf = self.buf;
        let (x0, x1) = (self.x0, self.x1);
        (self.y0..self.y1).flat_map(move |y| {
            (x0..x1).map(move |x| (x, y, &buf.data[y * buf.w + x]))
        })
    }
}

/// Split `h` rows into up to `n` contiguous bands of near-equal height.
pub fn row_bands(h: usize, n: usize) -> Vec<(usize, usize)> {
    if h == 0 || n == 0 {
        return Vec::new();
    }
    let per = (h / n).max(1);
    let mut bands = Vec::with_capacity(n);
    let mut y = 0;
    while y < h {
        let end = (y + per).min(h);
        bands.push((y, end));
        y = end;
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_get_agree() {
        let mut b = Buffer2d::new(3, 2, 0i32);
        b[(2, 1)] = 7;
        assert_eq!(*b.get(2, 1).unwrap(), 7);
        assert_eq!(b.get(3, 0), None);
        assert_eq!(b.get(-1, 0), None);
        assert_eq!(b.get(0, 2), None);
    }

    #[test]
    fn region_iterates_exactly_the_rectangle() {
        let mut b = Buffer2d::new(4, 4, 0usize);
        for y in 0..4 {
            for x in 0..4 {
                b[(x, y)] = y * 4 + x;
            }
        }
        let cells: Vec<usize> = b.region(1, 2, 3, 4).iter_cells().map(|(_, _, v)| *v).collect();
        assert_eq!(cells, vec![9, 10, 13, 14]);
    }

    #[test]
    fn row_bands_cover_all_rows_once() {
        for h in [0usize, 1, 5, 17] {
            for n in [1usize, 2, 3, 8] {
                let bands = row_bands(h, n);
                let total: usize = bands.iter().map(|(a, b)| b - a).sum();
                assert_eq!(total, h);
                for w in bands.windows(2) {
                    assert_eq!(w[0].1, w[1].0);
                }
            }
        }
    }
}
