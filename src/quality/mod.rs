//! Image quality metrics
//!
//! Full-reference metrics ([`psnr`], [`ssim`]) compare a super-resolved batch
//! against its ground truth. No-reference metrics such as NIQE depend on a
//! fitted natural-scene model and plug in through [`NoReferenceMetric`].

mod psnr;
mod ssim;

pub use psnr::psnr;
pub use ssim::ssim;

use crate::Result;
use ndarray::ArrayView3;

/// BT.601 luma coefficients for RGB on the 0..255 scale
pub(crate) fn luma_weights() -> [f32; 3] {
    [65.738 / 256.0, 129.057 / 256.0, 25.064 / 256.0]
}

/// Border excluded from full-reference metrics
pub(crate) fn border(scale: usize, benchmark: bool) -> usize {
    if benchmark {
        scale
    } else {
        scale + 6
    }
}

/// Quality score that needs no ground truth (e.g. NIQE)
pub trait NoReferenceMetric {
    /// Short name for reports
    fn name(&self) -> &str;

    /// Score a single `[C, H, W]` image with values in `[0, rgb_range]`
    fn score(&self, image: ArrayView3<f32>, rgb_range: f32) -> Result<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_rules() {
        assert_eq!(border(4, true), 4);
        assert_eq!(border(4, false), 10);
    }

    #[test]
    fn test_luma_weights_sum() {
        let total: f32 = luma_weights().iter().sum();
        assert!((total - 219.859 / 256.0).abs() < 1e-6);
    }
}
