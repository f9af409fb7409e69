//! Peak signal-to-noise ratio

use super::{border, luma_weights};
use crate::{Error, Result};
use ndarray::{s, Array4, Axis};

/// PSNR in dB between two `[N, C, H, W]` batches in `[0, rgb_range]`
///
/// Benchmark sets shave `scale` pixels and compare the Y channel; everything
/// else (training batches, ordinary test sets) shaves `scale + 6` pixels and
/// compares all channels. Identical inputs give `+inf`.
pub fn psnr(
    sr: &Array4<f32>,
    hr: &Array4<f32>,
    scale: usize,
    rgb_range: f32,
    benchmark: bool,
) -> Result<f32> {
    if sr.shape() != hr.shape() {
        return Err(Error::ShapeMismatch {
            expected: hr.shape().to_vec(),
            got: sr.shape().to_vec(),
        });
    }
    if hr.len() == 1 {
        return Ok(0.0);
    }

    let mut diff = (sr - hr) / rgb_range;
    if benchmark && diff.shape()[1] == 3 {
        let weights = luma_weights();
        let y = diff
            .axis_iter(Axis(1))
            .zip(weights)
            .map(|(channel, w)| &channel * w)
            .reduce(|acc, c| acc + c)
            .ok_or_else(|| Error::Metric("no channels".to_string()))?;
        diff = y.insert_axis(Axis(1));
    }

    let shave = border(scale, benchmark);
    let (_, _, h, w) = diff.dim();
    if h <= 2 * shave || w <= 2 * shave {
        return Err(Error::Metric(format!(
            "image {h}x{w} too small for a {shave}-pixel border"
        )));
    }

    let valid = diff.slice(s![.., .., shave..h - shave, shave..w - shave]);
    let mse = valid.mapv(|d| f64::from(d) * f64::from(d)).mean().unwrap_or(0.0);
    Ok((-10.0 * mse.log10()) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_psnr_known_mse() {
        // uniform error of 0.1 on a unit range: mse = 0.01, psnr = 20 dB
        let hr = Array4::<f32>::zeros((1, 3, 20, 20));
        let sr = Array4::<f32>::from_elem((1, 3, 20, 20), 0.1);
        let value = psnr(&sr, &hr, 2, 1.0, false).unwrap();
        assert_abs_diff_eq!(value, 20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_psnr_respects_rgb_range() {
        let hr = Array4::<f32>::zeros((1, 1, 20, 20));
        let sr = Array4::<f32>::from_elem((1, 1, 20, 20), 25.5);
        let value = psnr(&sr, &hr, 2, 255.0, false).unwrap();
        assert_abs_diff_eq!(value, 20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_psnr_ignores_border() {
        let hr = Array4::<f32>::zeros((1, 1, 20, 20));
        let mut sr = Array4::<f32>::from_elem((1, 1, 20, 20), 0.1);
        // corrupt the shaved border (scale 2 + 6 = 8 pixels)
        sr.slice_mut(s![.., .., 0..8, ..]).fill(1.0);
        let value = psnr(&sr, &hr, 2, 1.0, false).unwrap();
        assert_abs_diff_eq!(value, 20.0, epsilon = 1e-3);
    }

    #[test]
    fn test_psnr_benchmark_uses_luma() {
        let hr = Array4::<f32>::zeros((1, 3, 10, 10));
        let sr = Array4::<f32>::from_elem((1, 3, 10, 10), 0.1);
        let value = psnr(&sr, &hr, 2, 1.0, true).unwrap();
        // luma weights sum to 219.859/256
        let y: f64 = 0.1 * 219.859 / 256.0;
        let expected = -10.0 * (y * y).log10();
        assert_abs_diff_eq!(value as f64, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_psnr_identical_is_infinite() {
        let hr = Array4::<f32>::from_elem((1, 1, 20, 20), 0.5);
        assert!(psnr(&hr, &hr, 2, 1.0, false).unwrap().is_infinite());
    }

    #[test]
    fn test_psnr_shape_mismatch() {
        let a = Array4::<f32>::zeros((1, 1, 20, 20));
        let b = Array4::<f32>::zeros((1, 1, 20, 21));
        assert!(matches!(psnr(&a, &b, 2, 1.0, false), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_psnr_too_small_for_border() {
        let a = Array4::<f32>::zeros((1, 1, 16, 16));
        assert!(matches!(psnr(&a, &a, 2, 1.0, false), Err(Error::Metric(_))));
    }

    #[test]
    fn test_psnr_single_pixel_is_zero() {
        let a = Array4::<f32>::zeros((1, 1, 1, 1));
        assert_eq!(psnr(&a, &a, 2, 1.0, false).unwrap(), 0.0);
    }
}
