//! Reference slimmable super-resolution network

use super::SlimNetwork;
use crate::autograd::{is_grad_enabled, BackwardOp, GradCell};
use crate::{Error, Result, Tensor};
use ndarray::{s, Array1, Array2, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;

/// Per-pixel two-layer mixer with sub-pixel upsampling
///
/// ```text
/// h   = relu(W_head[..k] · x + b_head[..k])     k = ⌈n_feats · width⌉
/// y   = W_tail[:, ..k] · h + b_tail             (C·s² channels)
/// out = pixel_shuffle(y, s) + nearest_upsample(x, s)
/// ```
///
/// Every width shares the leading `k` hidden channels, so narrower passes
/// are strict sub-networks of the full-width pass.
pub struct SlimMixer {
    n_colors: usize,
    n_feats: usize,
    scale: usize,
    params: Vec<Tensor>,
}

const HEAD_W: usize = 0;
const HEAD_B: usize = 1;
const TAIL_W: usize = 2;
const TAIL_B: usize = 3;

impl SlimMixer {
    /// Create a network with uniformly initialised weights
    pub fn new(n_colors: usize, n_feats: usize, scale: usize, seed: u64) -> Result<Self> {
        if n_colors == 0 || n_feats == 0 || scale == 0 {
            return Err(Error::InvalidParameter(format!(
                "SlimMixer dimensions must be positive \
                 (colors={n_colors}, feats={n_feats}, scale={scale})"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let out = n_colors * scale * scale;

        let mut uniform = |shape: &[usize], fan_in: usize| -> Result<Tensor> {
            let bound = 1.0 / (fan_in as f32).sqrt();
            let numel = shape.iter().product();
            let data = (0..numel).map(|_| rng.gen_range(-bound..bound)).collect();
            Tensor::from_shape_vec(shape, data, true)
        };

        let params = vec![
            uniform(&[n_feats, n_colors], n_colors)?,
            uniform(&[n_feats], n_colors)?,
            uniform(&[out, n_feats], n_feats)?,
            uniform(&[out], n_feats)?,
        ];

        Ok(Self {
            n_colors,
            n_feats,
            scale,
            params,
        })
    }

    /// Hidden channels used at `width_mult`
    pub fn active_width(&self, width_mult: f32) -> usize {
        ((self.n_feats as f32 * width_mult).ceil() as usize).clamp(1, self.n_feats)
    }

    fn matrix(&self, index: usize) -> Result<Array2<f32>> {
        let param = &self.params[index];
        let (rows, cols) = match param.shape() {
            &[r, c] => (r, c),
            other => {
                return Err(Error::ShapeMismatch {
                    expected: vec![0, 0],
                    got: other.to_vec(),
                })
            }
        };
        param
            .data()
            .to_owned()
            .into_shape_with_order((rows, cols))
            .map_err(|e| Error::InvalidParameter(e.to_string()))
    }
}

impl SlimNetwork for SlimMixer {
    fn forward(&self, input: &Tensor, width_mult: f32) -> Result<Tensor> {
        let x = input.to_array4()?;
        let (n, c, h, w) = x.dim();
        if c != self.n_colors {
            return Err(Error::ShapeMismatch {
                expected: vec![n, self.n_colors, h, w],
                got: x.shape().to_vec(),
            });
        }
        let k = self.active_width(width_mult);
        let s = self.scale;
        let pixels = n * h * w;

        // [C, N·H·W] with pixel index (n, y, x)
        let cols = x
            .view()
            .permuted_axes([1, 0, 2, 3])
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((c, pixels))
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;

        let head_w = self.matrix(HEAD_W)?.slice(s![..k, ..]).to_owned();
        let head_b = self.params[HEAD_B].data().slice(s![..k]).to_owned();
        let tail_w = self.matrix(TAIL_W)?.slice(s![.., ..k]).to_owned();
        let tail_b = self.params[TAIL_B].data().clone();

        let pre = head_w.dot(&cols) + &head_b.insert_axis(Axis(1));
        let hidden = pre.mapv(|v| v.max(0.0));
        let y = tail_w.dot(&hidden) + &tail_b.insert_axis(Axis(1));

        let out = Array4::from_shape_fn((n, c, h * s, w * s), |(b, ch, oy, ox)| {
            let (py, px) = (oy / s, ox / s);
            let sub = ch * s * s + (oy % s) * s + (ox % s);
            y[[sub, (b * h + py) * w + px]] + x[[b, ch, py, px]]
        });

        let requires_grad = is_grad_enabled()
            && (input.requires_grad() || self.params.iter().any(Tensor::requires_grad));
        let mut result = Tensor::from_array4(out, requires_grad);

        if requires_grad {
            result.set_backward_op(Rc::new(MixerBackward {
                input: input.clone(),
                params: self.params.clone(),
                cols,
                pre,
                hidden,
                head_w,
                tail_w,
                dims: (n, c, h, w),
                n_feats: self.n_feats,
                scale: s,
                result_grad: result.grad_cell(),
            }));
        }

        Ok(result)
    }

    fn scale(&self) -> usize {
        self.scale
    }

    fn parameter_names(&self) -> Vec<String> {
        ["head.weight", "head.bias", "tail.weight", "tail.bias"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn parameters(&self) -> &[Tensor] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Tensor] {
        &mut self.params
    }
}

struct MixerBackward {
    input: Tensor,
    params: Vec<Tensor>,
    cols: Array2<f32>,
    pre: Array2<f32>,
    hidden: Array2<f32>,
    head_w: Array2<f32>,
    tail_w: Array2<f32>,
    dims: (usize, usize, usize, usize),
    n_feats: usize,
    scale: usize,
    result_grad: GradCell,
}

impl MixerBackward {
    /// Embed a gradient for the active slice into a full-size flat buffer
    fn widen(full: (usize, usize), grad: &Array2<f32>, rows: bool) -> Array1<f32> {
        let mut out = Array2::<f32>::zeros(full);
        let k = if rows { grad.nrows() } else { grad.ncols() };
        if rows {
            out.slice_mut(s![..k, ..]).assign(grad);
        } else {
            out.slice_mut(s![.., ..k]).assign(grad);
        }
        out.iter().copied().collect()
    }
}

impl BackwardOp for MixerBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        let (n, c, h, w) = self.dims;
        let s = self.scale;
        let (hs, ws) = (h * s, w * s);
        let at = |b: usize, ch: usize, oy: usize, ox: usize| {
            grad[((b * c + ch) * hs + oy) * ws + ox]
        };

        // Undo the pixel shuffle: [C·s², N·H·W]
        let grad_y = Array2::from_shape_fn((c * s * s, n * h * w), |(sub, p)| {
            let (ch, i, j) = (sub / (s * s), (sub / s) % s, sub % s);
            let (b, py, px) = (p / (h * w), (p / w) % h, p % w);
            at(b, ch, py * s + i, px * s + j)
        });

        let k = self.hidden.nrows();
        let out_ch = c * s * s;

        if self.params[TAIL_W].requires_grad() {
            let g = grad_y.dot(&self.hidden.t());
            self.params[TAIL_W].accumulate_grad(Self::widen((out_ch, self.n_feats), &g, false));
        }
        if self.params[TAIL_B].requires_grad() {
            self.params[TAIL_B].accumulate_grad(grad_y.sum_axis(Axis(1)));
        }

        let mut grad_pre = self.tail_w.t().dot(&grad_y);
        grad_pre.zip_mut_with(&self.pre, |g, &z| {
            if z <= 0.0 {
                *g = 0.0;
            }
        });

        if self.params[HEAD_W].requires_grad() {
            let g = grad_pre.dot(&self.cols.t());
            self.params[HEAD_W].accumulate_grad(Self::widen((self.n_feats, c), &g, true));
        }
        if self.params[HEAD_B].requires_grad() {
            let mut g = Array1::zeros(self.n_feats);
            g.slice_mut(s![..k]).assign(&grad_pre.sum_axis(Axis(1)));
            self.params[HEAD_B].accumulate_grad(g);
        }

        if self.input.requires_grad() {
            let grad_cols = self.head_w.t().dot(&grad_pre);
            let grad_input = Array4::from_shape_fn((n, c, h, w), |(b, ch, py, px)| {
                let mut g = grad_cols[[ch, (b * h + py) * w + px]];
                for i in 0..s {
                    for j in 0..s {
                        g += at(b, ch, py * s + i, px * s + j);
                    }
                }
                g
            });
            self.input.accumulate_grad(grad_input.iter().copied().collect());
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        let mut inputs = vec![self.input.clone()];
        inputs.extend(self.params.iter().cloned());
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, no_grad, sum};
    use approx::assert_abs_diff_eq;

    fn batch(n: usize, c: usize, h: usize, w: usize) -> Tensor {
        let x = Array4::from_shape_fn((n, c, h, w), |(b, ch, y, x)| {
            0.1 + ((b * 7 + ch * 5 + y * 3 + x) % 11) as f32 / 11.0
        });
        Tensor::from_array4(x, false)
    }

    #[test]
    fn test_output_shape() {
        let net = SlimMixer::new(3, 8, 2, 0).unwrap();
        let y = net.forward(&batch(2, 3, 4, 5), 1.0).unwrap();
        assert_eq!(y.shape(), &[2, 3, 8, 10]);
    }

    #[test]
    fn test_active_width() {
        let net = SlimMixer::new(3, 8, 2, 0).unwrap();
        assert_eq!(net.active_width(1.0), 8);
        assert_eq!(net.active_width(0.5), 4);
        assert_eq!(net.active_width(0.3), 3);
        assert_eq!(net.active_width(0.01), 1);
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let net = SlimMixer::new(3, 8, 2, 0).unwrap();
        assert!(net.forward(&batch(1, 1, 4, 4), 1.0).is_err());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = SlimMixer::new(3, 4, 2, 7).unwrap();
        let b = SlimMixer::new(3, 4, 2, 7).unwrap();
        assert_eq!(a.parameters()[0].data(), b.parameters()[0].data());
    }

    #[test]
    fn test_zero_tail_gives_nearest_upsample() {
        let mut net = SlimMixer::new(1, 4, 2, 0).unwrap();
        net.parameters_mut()[TAIL_W].data_mut().fill(0.0);
        net.parameters_mut()[TAIL_B].data_mut().fill(0.0);
        let x = batch(1, 1, 2, 2);
        let y = net.forward(&x, 1.0).unwrap().to_array4().unwrap();
        let x = x.to_array4().unwrap();
        assert_eq!(y[[0, 0, 3, 1]], x[[0, 0, 1, 0]]);
    }

    #[test]
    fn test_narrow_width_ignores_trailing_channels() {
        let mut net = SlimMixer::new(3, 8, 2, 1).unwrap();
        let x = batch(1, 3, 3, 3);
        let before = net.forward(&x, 0.5).unwrap();
        // perturb a hidden unit beyond the active half
        let tail = net.parameters_mut()[TAIL_W].data_mut();
        for row in 0..12 {
            tail[row * 8 + 7] += 1.0;
        }
        let after = net.forward(&x, 0.5).unwrap();
        assert_eq!(before.data(), after.data());
        assert_ne!(net.forward(&x, 1.0).unwrap().data(), before.data());
    }

    #[test]
    fn test_no_grad_skips_graph() {
        let net = SlimMixer::new(3, 4, 2, 0).unwrap();
        let y = no_grad(|| net.forward(&batch(1, 3, 2, 2), 1.0).unwrap());
        assert!(!y.requires_grad());
        assert!(y.backward_op().is_none());
    }

    /// Network whose hidden pre-activations stay positive for `batch` inputs
    fn active_fixture() -> SlimMixer {
        let mut net = SlimMixer::new(2, 4, 2, 3).unwrap();
        net.parameters_mut()[HEAD_B].data_mut().fill(2.0);
        net
    }

    /// Compare analytic parameter gradients of sum(forward) with central differences
    fn check_gradients(width_mult: f32) {
        let net = active_fixture();
        let x = batch(2, 2, 3, 2);

        let y = net.forward(&x, width_mult).unwrap();
        let loss = sum(&y);
        backward(&loss, None);

        let eps = 1e-2;
        for index in 0..4 {
            let analytic = net.parameters()[index].grad().unwrap();
            for i in 0..net.parameters()[index].len() {
                let mut plus = active_fixture();
                plus.parameters_mut()[index].data_mut()[i] += eps;
                let mut minus = active_fixture();
                minus.parameters_mut()[index].data_mut()[i] -= eps;

                let f_plus = no_grad(|| plus.forward(&x, width_mult).unwrap().data().sum());
                let f_minus = no_grad(|| minus.forward(&x, width_mult).unwrap().data().sum());
                let numeric = (f_plus - f_minus) / (2.0 * eps);

                assert_abs_diff_eq!(analytic[i], numeric, epsilon = 5e-2);
            }
        }
    }

    #[test]
    fn test_inactive_relu_blocks_head_gradient() {
        let mut net = SlimMixer::new(2, 4, 2, 3).unwrap();
        net.parameters_mut()[HEAD_B].data_mut().fill(-5.0);
        let loss = sum(&net.forward(&batch(1, 2, 2, 2), 1.0).unwrap());
        backward(&loss, None);
        for g in net.parameters()[HEAD_W].grad().unwrap().iter() {
            assert_eq!(*g, 0.0);
        }
        assert!(net.parameters()[TAIL_B].grad().unwrap().iter().all(|g| *g == 4.0));
    }

    #[test]
    fn test_gradients_full_width() {
        check_gradients(1.0);
    }

    #[test]
    fn test_gradients_half_width() {
        check_gradients(0.5);
    }

    #[test]
    fn test_input_gradient_includes_skip() {
        let mut net = SlimMixer::new(1, 2, 2, 0).unwrap();
        for p in net.parameters_mut() {
            p.data_mut().fill(0.0);
        }
        let x = Tensor::from_array4(Array4::from_elem((1, 1, 2, 2), 0.5), true);
        let loss = sum(&net.forward(&x, 1.0).unwrap());
        backward(&loss, None);
        // each input pixel feeds an s×s block through the skip path
        for g in x.grad().unwrap().iter() {
            assert_abs_diff_eq!(*g, 4.0, epsilon = 1e-6);
        }
    }
}
