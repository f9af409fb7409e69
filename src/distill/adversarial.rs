//! Pixel-space adversarial loss

use super::AdversarialLoss;
use crate::autograd::scalar_with_grad;
use crate::{Error, Result, Tensor};
use ndarray::{Array1, Array2, Array4};
use std::cell::RefCell;

/// Features per channel: value, horizontal and vertical forward difference
const FEATURES_PER_CHANNEL: usize = 3;

fn softplus(z: f32) -> f32 {
    if z > 20.0 {
        z
    } else {
        z.exp().ln_1p()
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// Per-pixel features of an `[N, C, H, W]` batch, one row per pixel
///
/// Differences at the right and bottom borders are zero.
fn pixel_features(images: &Array4<f32>, rgb_range: f32) -> Array2<f32> {
    let (n, c, h, w) = images.dim();
    let mut features = Array2::zeros((n * h * w, c * FEATURES_PER_CHANNEL));
    for b in 0..n {
        for y in 0..h {
            for x in 0..w {
                let row = (b * h + y) * w + x;
                for ch in 0..c {
                    let v = images[[b, ch, y, x]];
                    let dx = if x + 1 < w { images[[b, ch, y, x + 1]] - v } else { 0.0 };
                    let dy = if y + 1 < h { images[[b, ch, y + 1, x]] - v } else { 0.0 };
                    let col = ch * FEATURES_PER_CHANNEL;
                    features[[row, col]] = v / rgb_range;
                    features[[row, col + 1]] = dx / rgb_range;
                    features[[row, col + 2]] = dy / rgb_range;
                }
            }
        }
    }
    features
}

/// Logistic discriminator over local pixel features
///
/// `D(p) = σ(w · φ(p) + b)` where `φ` holds each channel's value and its
/// forward differences, scaled by the pixel range.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDiscriminator {
    weights: Array1<f32>,
    bias: f32,
}

impl PixelDiscriminator {
    /// Zero-initialised discriminator for `n_colors` channels
    pub fn new(n_colors: usize) -> Self {
        Self {
            weights: Array1::zeros(n_colors * FEATURES_PER_CHANNEL),
            bias: 0.0,
        }
    }

    fn logits(&self, features: &Array2<f32>) -> Array1<f32> {
        features.dot(&self.weights) + self.bias
    }

    /// Mean logistic loss over real (label 1) and fake (label 0) pixels
    pub fn loss(&self, real: &Array2<f32>, fake: &Array2<f32>) -> f32 {
        let real_loss = self.logits(real).mapv(|z| softplus(-z)).mean().unwrap_or(0.0);
        let fake_loss = self.logits(fake).mapv(softplus).mean().unwrap_or(0.0);
        real_loss + fake_loss
    }

    /// One gradient-descent step on [`Self::loss`]
    pub fn step(&mut self, real: &Array2<f32>, fake: &Array2<f32>, lr: f32) {
        // d softplus(-z)/dz = -σ(-z), d softplus(z)/dz = σ(z)
        let g_real = self.logits(real).mapv(|z| -sigmoid(-z)) / real.nrows().max(1) as f32;
        let g_fake = self.logits(fake).mapv(sigmoid) / fake.nrows().max(1) as f32;

        let grad_w = real.t().dot(&g_real) + fake.t().dot(&g_fake);
        let grad_b = g_real.sum() + g_fake.sum();
        self.weights.scaled_add(-lr, &grad_w);
        self.bias -= lr * grad_b;
    }

    /// Probability that each pixel is real
    pub fn predict(&self, features: &Array2<f32>) -> Array1<f32> {
        self.logits(features).mapv(sigmoid)
    }
}

/// Non-saturating GAN loss with a pixel discriminator
///
/// Each call first trains the discriminator for `d_steps` steps on the
/// ground truth against the detached student output, then returns
/// `mean(-log D(student))`, differentiable w.r.t. the student output.
/// The discriminator lives for the lifetime of the loss and is not part
/// of the checkpoint.
#[derive(Debug)]
pub struct PixelGanLoss {
    discriminator: RefCell<PixelDiscriminator>,
    rgb_range: f32,
    d_steps: usize,
    d_lr: f32,
}

impl PixelGanLoss {
    pub fn new(n_colors: usize, rgb_range: f32, d_steps: usize, d_lr: f32) -> Self {
        Self {
            discriminator: RefCell::new(PixelDiscriminator::new(n_colors)),
            rgb_range,
            d_steps,
            d_lr,
        }
    }

    /// Snapshot of the current discriminator
    pub fn discriminator(&self) -> PixelDiscriminator {
        self.discriminator.borrow().clone()
    }

    /// Gradient of `mean(softplus(-z))` w.r.t. the pixels behind `features`
    fn generator_grad(
        &self,
        logits: &Array1<f32>,
        shape: (usize, usize, usize, usize),
    ) -> Array1<f32> {
        let (n, c, h, w) = shape;
        let discriminator = self.discriminator.borrow();
        let weights = &discriminator.weights;
        let m = logits.len().max(1) as f32;
        let mut grad = Array4::<f32>::zeros(shape);

        for b in 0..n {
            for y in 0..h {
                for x in 0..w {
                    let row = (b * h + y) * w + x;
                    let g = -sigmoid(-logits[row]) / m / self.rgb_range;
                    for ch in 0..c {
                        let col = ch * FEATURES_PER_CHANNEL;
                        let (wv, wx, wy) = (weights[col], weights[col + 1], weights[col + 2]);
                        grad[[b, ch, y, x]] += g * wv;
                        if x + 1 < w {
                            grad[[b, ch, y, x + 1]] += g * wx;
                            grad[[b, ch, y, x]] -= g * wx;
                        }
                        if y + 1 < h {
                            grad[[b, ch, y + 1, x]] += g * wy;
                            grad[[b, ch, y, x]] -= g * wy;
                        }
                    }
                }
            }
        }
        grad.iter().copied().collect()
    }
}

impl AdversarialLoss for PixelGanLoss {
    fn compute(&self, student_sr: &Tensor, hr: &Tensor) -> Result<Tensor> {
        if student_sr.shape() != hr.shape() {
            return Err(Error::Loss {
                term: "adversarial".to_string(),
                reason: format!(
                    "shape {:?} does not match {:?}",
                    student_sr.shape(),
                    hr.shape()
                ),
            });
        }
        let fake_images = student_sr.to_array4()?;
        let real = pixel_features(&hr.to_array4()?, self.rgb_range);
        let fake = pixel_features(&fake_images, self.rgb_range);
        if fake.ncols() != self.discriminator.borrow().weights.len() {
            return Err(Error::Loss {
                term: "adversarial".to_string(),
                reason: format!(
                    "discriminator expects {} features per pixel, got {}",
                    self.discriminator.borrow().weights.len(),
                    fake.ncols()
                ),
            });
        }

        {
            let mut discriminator = self.discriminator.borrow_mut();
            for _ in 0..self.d_steps {
                discriminator.step(&real, &fake, self.d_lr);
            }
        }

        let logits = self.discriminator.borrow().logits(&fake);
        let value = logits.mapv(|z| softplus(-z)).mean().unwrap_or(0.0);
        let local = self.generator_grad(&logits, fake_images.dim());
        Ok(scalar_with_grad(value, student_sr, local))
    }
}
