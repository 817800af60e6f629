// -----------------------------------------------------------------------------
// Image file boundary: decode to [0,1] RGBA buffers, encode clamped
// -----------------------------------------------------------------------------

use std::path::Path;

use image::{GrayImage, RgbaImage};

use crate::engine::{Buffer2d, Color};
use crate::error::{Error, Result};

fn resource_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Resource {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

pub fn load_rgba(path: &Path) -> Result<Buffer2d<Color>> {
    let img = image::open(path)
        .map_err(|e| resource_error(path, e))?
        .to_rgba8();
    let mut buf = Buffer2d::new(img.width() as usize, img.height() as usize, Color::default());
    for (x, y, px) in img.enumerate_pixels() {
        buf[(x as usize, y as usize)] = Color::from_rgba8(px.0);
    }
    Ok(buf)
}

/// Loads a mask as 8-bit luma; zero means "excluded".
pub fn load_mask(path: &Path) -> Result<Buffer2d<u8>> {
    let img: GrayImage = image::open(path)
        .map_err(|e| resource_error(path, e))?
        .to_luma8();
    let mut buf = Buffer2d::new(img.width() as usize, img.height() as usize, 0u8);
    for (x, y, px) in img.enumerate_pixels() {
        buf[(x as usize, y as usize)] = px.0[0];
    }
    Ok(buf)
}

pub fn save_rgba(path: &Path, buf: &Buffer2d<Color>) -> Result<()> {
    let mut img = RgbaImage::new(buf.w() as u32, buf.h() as u32);
    for (x, y, &c) in buf.iter() {
        img.put_pixel(x as u32, y as u32, image::Rgba(c.to_rgba8()));
    }
    img.save(path).map_err(|e| resource_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_preserves_rgba8() {
        let mut buf = Buffer2d::new(2, 1, Color::opaque(1.0, 0.0, 0.0));
        buf[(1, 0)] = Color::new(0.0, 0.5, 1.0, 0.25);
        let path = std::env::temp_dir().join(format!("stringtrace-io-{}.png", std::process::id()));
        save_rgba(&path, &buf).unwrap();
        let loaded = load_rgba(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.w(), 2);
        assert_eq!(loaded.h(), 1);
        assert_eq!(loaded[(0, 0)].to_rgba8(), buf[(0, 0)].to_rgba8());
        assert_eq!(loaded[(1, 0)].to_rgba8(), buf[(1, 0)].to_rgba8());
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let path = Path::new("/nonexistent/stringtrace.png");
        match load_rgba(path) {
            Err(Error::Resource { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected resource error, got {:?}", other.map(|_| ())),
        }
    }
}
