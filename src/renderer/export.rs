//! PNG export of display images.

use std::path::Path;

use crate::util::{Error, Result};

/// Write RGBA8 pixels (row-major, top row first) as PNG.
pub fn write_png(path: impl AsRef<Path>, width: u32, height: u32, pixels: &[[u8; 4]]) -> Result<()> {
    let path = path.as_ref();
    let bytes: Vec<u8> = bytemuck::cast_slice(pixels).to_vec();
    let img = image::RgbaImage::from_raw(width, height, bytes)
        .ok_or_else(|| Error::invalid(format!("{} pixels do not fill {width}x{height}", pixels.len())))?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!(path = %path.display(), width, height, "saved png");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let pixels = vec![[255, 0, 0, 255]; 6];
        write_png(&path, 3, 2, &pixels).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_png(dir.path().join("bad.png"), 4, 4, &[[0; 4]; 3]).is_err());
    }
}
