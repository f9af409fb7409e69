//! Fixed-filter feature loss

use super::PerceptualLoss;
use crate::autograd::scalar_with_grad;
use crate::{Error, Result, Tensor};
use ndarray::{Array1, Array4};

type Kernel = [[f32; 3]; 3];

const SOBEL_X: Kernel = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: Kernel = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
const LAPLACIAN: Kernel = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];

/// L1 distance between edge responses of two images
///
/// Each channel is filtered with horizontal and vertical Sobel kernels and
/// a Laplacian over the valid 3x3 region, scaled by the pixel range:
///
/// ```text
/// L = mean_k |k ∗ hr - k ∗ sr| / rgb_range
/// ```
///
/// The ground truth is a constant target; gradients flow into the student
/// output only.
#[derive(Debug, Clone, Copy)]
pub struct EdgeFeatureLoss {
    rgb_range: f32,
}

impl EdgeFeatureLoss {
    pub fn new(rgb_range: f32) -> Self {
        Self { rgb_range }
    }

    const KERNELS: [Kernel; 3] = [SOBEL_X, SOBEL_Y, LAPLACIAN];

    /// Filter response at the top-left corner `(y, x)` of a 3x3 window
    fn respond(image: &Array4<f32>, kernel: &Kernel, at: [usize; 4]) -> f32 {
        let [b, c, y, x] = at;
        let mut acc = 0.0;
        for (ky, row) in kernel.iter().enumerate() {
            for (kx, k) in row.iter().enumerate() {
                acc += k * image[[b, c, y + ky, x + kx]];
            }
        }
        acc
    }
}

impl PerceptualLoss for EdgeFeatureLoss {
    fn compute(&self, hr: &Tensor, student_sr: &Tensor) -> Result<Tensor> {
        if hr.shape() != student_sr.shape() {
            return Err(Error::Loss {
                term: "perceptual".to_string(),
                reason: format!(
                    "shape {:?} does not match {:?}",
                    student_sr.shape(),
                    hr.shape()
                ),
            });
        }
        let target = hr.to_array4()?;
        let output = student_sr.to_array4()?;
        let (n, c, h, w) = output.dim();
        if h < 3 || w < 3 || n * c == 0 {
            return Err(Error::Loss {
                term: "perceptual".to_string(),
                reason: format!("image {h}x{w} is smaller than the 3x3 filters"),
            });
        }

        let (oh, ow) = (h - 2, w - 2);
        let count = (Self::KERNELS.len() * n * c * oh * ow) as f32;
        let norm = count * self.rgb_range;
        let mut total = 0.0f32;
        let mut grad = Array4::<f32>::zeros(output.dim());

        for kernel in &Self::KERNELS {
            for b in 0..n {
                for ch in 0..c {
                    for y in 0..oh {
                        for x in 0..ow {
                            let at = [b, ch, y, x];
                            let diff = Self::respond(&output, kernel, at)
                                - Self::respond(&target, kernel, at);
                            total += diff.abs();
                            let sign = if diff > 0.0 {
                                1.0
                            } else if diff < 0.0 {
                                -1.0
                            } else {
                                0.0
                            };
                            if sign != 0.0 {
                                for (ky, row) in kernel.iter().enumerate() {
                                    for (kx, k) in row.iter().enumerate() {
                                        grad[[b, ch, y + ky, x + kx]] += sign * k / norm;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let local: Array1<f32> = grad.iter().copied().collect();
        Ok(scalar_with_grad(total / norm, student_sr, local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, no_grad};
    use approx::assert_abs_diff_eq;

    fn image(value_at: impl Fn(usize, usize, usize) -> f32) -> Array4<f32> {
        Array4::from_shape_fn((1, 2, 5, 5), |(_, c, y, x)| value_at(c, y, x))
    }

    #[test]
    fn test_identical_images_have_zero_loss() {
        let a = Tensor::from_array4(image(|c, y, x| (c * 30 + y * 7 + x * x) as f32), false);
        let value = EdgeFeatureLoss::new(255.0).compute(&a, &a).unwrap().item();
        assert_abs_diff_eq!(value, 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_constant_offset_is_invisible() {
        // every kernel sums to zero
        let ramp = |c: usize, y: usize, x: usize| (c * 30 + y * 7 + x * x) as f32;
        let hr = Tensor::from_array4(image(ramp), false);
        let sr = Tensor::from_array4(image(|c, y, x| ramp(c, y, x) + 40.0), false);
        let value = EdgeFeatureLoss::new(255.0).compute(&hr, &sr).unwrap().item();
        assert_abs_diff_eq!(value, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_edges_are_penalised() {
        let hr = Tensor::from_array4(image(|_, _, x| if x < 2 { 0.0 } else { 255.0 }), false);
        let flat = Tensor::from_array4(image(|_, _, _| 128.0), false);
        let value = EdgeFeatureLoss::new(255.0).compute(&hr, &flat).unwrap().item();
        assert!(value > 0.5);
    }

    #[test]
    fn test_gradient_finite_difference() {
        let loss = EdgeFeatureLoss::new(1.0);
        let target = image(|c, y, x| ((c * 50 + y * 31 + x * 17) % 97) as f32);
        let hr = Tensor::from_array4(target, false);
        let start = image(|c, y, x| {
            ((c * 13 + y * 5 + x * 29) % 89) as f32 * 1.37 + (y * x) as f32 * 0.113
        });
        let values: Vec<f32> = start.iter().copied().collect();

        let sr = Tensor::from_shape_vec(&[1, 2, 5, 5], values.clone(), true).unwrap();
        backward(&loss.compute(&hr, &sr).unwrap(), None);
        let analytic = sr.grad().unwrap();
        assert!(hr.grad().is_none());

        let eps = 1e-2;
        for i in [0usize, 6, 12, 24, 31, 49] {
            let eval = |delta: f32| {
                let mut v = values.clone();
                v[i] += delta;
                let s = Tensor::from_shape_vec(&[1, 2, 5, 5], v, false).unwrap();
                no_grad(|| loss.compute(&hr, &s).unwrap().item())
            };
            let numeric = (eval(eps) - eval(-eps)) / (2.0 * eps);
            assert_abs_diff_eq!(analytic[i], numeric, epsilon = 2e-3);
        }
    }

    #[test]
    fn test_too_small_rejected() {
        let a = Tensor::from_array4(Array4::zeros((1, 1, 2, 2)), false);
        assert!(matches!(
            EdgeFeatureLoss::new(255.0).compute(&a, &a),
            Err(Error::Loss { .. })
        ));
    }
}
