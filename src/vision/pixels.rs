//! Pixel-range conversion and PNG persistence

use crate::{Error, Result};
use image::{ImageBuffer, Luma, Rgb};
use ndarray::{Array3, Array4, ArrayView3};
use std::path::Path;

/// Snap values to the 8-bit grid of `[0, rgb_range]`
///
/// `round(clamp(x · 255/rgb_range, 0, 255)) / (255/rgb_range)`
pub fn quantize(x: &Array4<f32>, rgb_range: f32) -> Array4<f32> {
    let factor = 255.0 / rgb_range;
    x.mapv(|v| (v * factor).clamp(0.0, 255.0).round() / factor)
}

fn to_u8(v: f32, factor: f32) -> u8 {
    (v * factor).clamp(0.0, 255.0).round() as u8
}

/// Write a `[C, H, W]` image with values in `[0, rgb_range]` as PNG
///
/// Supports one (grey) or three (RGB) channels.
pub fn save_png(img: ArrayView3<f32>, rgb_range: f32, path: &Path) -> Result<()> {
    let (c, h, w) = img.dim();
    let factor = 255.0 / rgb_range;
    let (width, height) = (w as u32, h as u32);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match c {
        3 => {
            let buf = ImageBuffer::from_fn(width, height, |x, y| {
                let (x, y) = (x as usize, y as usize);
                Rgb([
                    to_u8(img[[0, y, x]], factor),
                    to_u8(img[[1, y, x]], factor),
                    to_u8(img[[2, y, x]], factor),
                ])
            });
            buf.save(path)?;
        }
        1 => {
            let buf = ImageBuffer::from_fn(width, height, |x, y| {
                Luma([to_u8(img[[0, y as usize, x as usize]], factor)])
            });
            buf.save(path)?;
        }
        other => {
            return Err(Error::Image(format!(
                "cannot write {other}-channel image to {}",
                path.display()
            )))
        }
    }
    Ok(())
}

/// Save the first image of a batch
pub fn save_first(batch: &Array4<f32>, rgb_range: f32, path: &Path) -> Result<()> {
    if batch.shape()[0] == 0 {
        return Err(Error::Image("empty batch".to_string()));
    }
    save_png(batch.index_axis(ndarray::Axis(0), 0), rgb_range, path)
}

/// Read a PNG into `[C, H, W]` with values in `[0, rgb_range]`
pub fn load_png(path: &Path, n_colors: usize, rgb_range: f32) -> Result<Array3<f32>> {
    let decoded = image::open(path)?;
    let scale = rgb_range / 255.0;

    match n_colors {
        3 => {
            let rgb = decoded.to_rgb8();
            let (w, h) = rgb.dimensions();
            Ok(Array3::from_shape_fn((3, h as usize, w as usize), |(c, y, x)| {
                rgb.get_pixel(x as u32, y as u32)[c] as f32 * scale
            }))
        }
        1 => {
            let grey = decoded.to_luma8();
            let (w, h) = grey.dimensions();
            Ok(Array3::from_shape_fn((1, h as usize, w as usize), |(_, y, x)| {
                grey.get_pixel(x as u32, y as u32)[0] as f32 * scale
            }))
        }
        other => Err(Error::Image(format!("unsupported channel count {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    #[test]
    fn test_quantize_clamps_and_rounds() {
        let x = Array4::from_shape_vec((1, 1, 1, 4), vec![-3.0, 0.4, 100.6, 300.0]).unwrap();
        let q = quantize(&x, 255.0);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0, 101.0, 255.0]);
    }

    #[test]
    fn test_quantize_unit_range() {
        let x = Array4::from_elem((1, 1, 1, 1), 0.5);
        let q = quantize(&x, 1.0);
        // 127.5 rounds away from zero
        assert_abs_diff_eq!(q[[0, 0, 0, 0]], 128.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quantize_is_idempotent() {
        let x =
            Array4::from_shape_fn((1, 3, 4, 4), |(_, c, y, x)| (c * 37 + y * 11 + x) as f32 * 1.3);
        let once = quantize(&x, 255.0);
        assert_eq!(quantize(&once, 255.0), once);
    }

    #[test]
    fn test_png_round_trip_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img.png");
        let img = Array3::from_shape_fn((3, 2, 3), |(c, y, x)| (c * 60 + y * 20 + x * 5) as f32);

        save_png(img.view(), 255.0, &path).unwrap();
        let loaded = load_png(&path, 3, 255.0).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_png_round_trip_grey() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grey.png");
        let img = Array3::from_shape_fn((1, 2, 2), |(_, y, x)| (y * 2 + x) as f32 * 10.0);

        save_png(img.view(), 255.0, &path).unwrap();
        assert_eq!(load_png(&path, 1, 255.0).unwrap(), img);
    }

    #[test]
    fn test_save_rejects_two_channels() {
        let dir = TempDir::new().unwrap();
        let img = Array3::<f32>::zeros((2, 2, 2));
        assert!(save_png(img.view(), 255.0, &dir.path().join("x.png")).is_err());
    }

    #[test]
    fn test_save_first_of_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("first.png");
        let batch = Array4::from_elem((2, 3, 2, 2), 0.5);
        save_first(&batch, 1.0, &path).unwrap();
        assert!(path.exists());
    }
}
