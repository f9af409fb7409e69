//! Structural similarity on the luma channel

use super::{border, luma_weights};
use crate::{Error, Result};
use ndarray::{s, Array2, Array4, ArrayView3, Axis};

const WINDOW: usize = 11;
const SIGMA: f64 = 1.5;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

fn gaussian_window() -> Array2<f64> {
    let center = (WINDOW / 2) as f64;
    let g: Vec<f64> = (0..WINDOW)
        .map(|i| (-((i as f64 - center).powi(2)) / (2.0 * SIGMA * SIGMA)).exp())
        .collect();
    let total: f64 = g.iter().sum();
    let mut window = Array2::from_shape_fn((WINDOW, WINDOW), |(y, x)| g[y] * g[x]);
    window /= total * total;
    window
}

/// Valid-mode 2-D correlation
fn filter_valid(img: &Array2<f64>, window: &Array2<f64>) -> Array2<f64> {
    let (h, w) = img.dim();
    let (kh, kw) = window.dim();
    Array2::from_shape_fn((h + 1 - kh, w + 1 - kw), |(y, x)| {
        (&img.slice(s![y..y + kh, x..x + kw]) * window).sum()
    })
}

/// Single-channel image on the 0..255 scale; RGB is reduced to BT.601 Y
fn to_luma(img: ArrayView3<f32>, rgb_range: f32) -> Array2<f64> {
    let to_255 = f64::from(255.0 / rgb_range);
    let quantized = img.mapv(|v| (f64::from(v) * to_255).clamp(0.0, 255.0).round());
    if quantized.shape()[0] == 3 {
        let weights = luma_weights();
        let mut y = Array2::from_elem((quantized.shape()[1], quantized.shape()[2]), 16.0);
        for (channel, w) in quantized.axis_iter(Axis(0)).zip(weights) {
            y.scaled_add(f64::from(w), &channel);
        }
        y
    } else {
        quantized.index_axis(Axis(0), 0).to_owned()
    }
}

fn ssim_plane(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let window = gaussian_window();
    let mu1 = filter_valid(a, &window);
    let mu2 = filter_valid(b, &window);
    let sigma1 = filter_valid(&(a * a), &window) - &mu1 * &mu1;
    let sigma2 = filter_valid(&(b * b), &window) - &mu2 * &mu2;
    let sigma12 = filter_valid(&(a * b), &window) - &mu1 * &mu2;

    let numerator = (&mu1 * &mu2 * 2.0 + C1) * (sigma12 * 2.0 + C2);
    let denominator = (&mu1 * &mu1 + &mu2 * &mu2 + C1) * (sigma1 + sigma2 + C2);
    (numerator / denominator).mean().unwrap_or(0.0)
}

/// Mean SSIM over a `[N, C, H, W]` batch in `[0, rgb_range]`
///
/// Uses the same border shave as [`psnr`](super::psnr) and an 11×11
/// Gaussian window (σ = 1.5) on the 8-bit luma plane.
pub fn ssim(
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
    let (n, _, h, w) = sr.dim();
    let shave = border(scale, benchmark);
    if h < 2 * shave + WINDOW || w < 2 * shave + WINDOW {
        return Err(Error::Metric(format!(
            "image {h}x{w} too small for SSIM with a {shave}-pixel border"
        )));
    }
    if n == 0 {
        return Err(Error::Metric("empty batch".to_string()));
    }

    let mut total = 0.0;
    for (a, b) in sr.axis_iter(Axis(0)).zip(hr.axis_iter(Axis(0))) {
        let a = to_luma(a, rgb_range);
        let b = to_luma(b, rgb_range);
        let a = a.slice(s![shave..h - shave, shave..w - shave]).to_owned();
        let b = b.slice(s![shave..h - shave, shave..w - shave]).to_owned();
        total += ssim_plane(&a, &b);
    }
    Ok((total / n as f64) as f32)
}
