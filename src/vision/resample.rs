//! Spatial resampling for `[N, C, H, W]` batches

use crate::{Error, Result};
use ndarray::{Array3, Array4, Axis};

/// Keys cubic convolution coefficient
const CUBIC_A: f32 = -0.75;

/// Cubic convolution weights for taps at offsets -1, 0, 1, 2 from the
/// floor of the source coordinate, `t` being the fractional part.
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let x0 = t + 1.0;
    let w0 = ((a * x0 - 5.0 * a) * x0 + 8.0 * a) * x0 - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let x2 = 1.0 - t;
    let w2 = ((a + 2.0) * x2 - (a + 3.0)) * x2 * x2 + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}

fn resize_axis_bicubic(x: &Array4<f32>, axis: Axis, out_len: usize) -> Array4<f32> {
    let in_len = x.len_of(axis);
    let ratio = in_len as f32 / out_len as f32;

    let mut out_shape = x.raw_dim();
    out_shape[axis.index()] = out_len;
    let mut out = Array4::zeros(out_shape);

    let last = in_len as isize - 1;
    for o in 0..out_len {
        // half-pixel centres
        let src = (o as f32 + 0.5) * ratio - 0.5;
        let base = src.floor();
        let weights = cubic_weights(src - base);

        let lane_shape = out.index_axis(axis, o).raw_dim();
        let mut lane = Array3::<f32>::zeros(lane_shape);
        for (k, w) in weights.iter().enumerate() {
            let idx = (base as isize + k as isize - 1).clamp(0, last) as usize;
            lane.scaled_add(*w, &x.index_axis(axis, idx));
        }
        out.index_axis_mut(axis, o).assign(&lane);
    }
    out
}

/// Bicubic upsampling by an integer factor
pub fn upsample_bicubic(x: &Array4<f32>, scale: usize) -> Result<Array4<f32>> {
    if scale == 0 {
        return Err(Error::InvalidParameter("scale must be positive".to_string()));
    }
    if scale == 1 {
        return Ok(x.clone());
    }
    let (_, _, h, w) = x.dim();
    if h == 0 || w == 0 {
        return Err(Error::ShapeMismatch {
            expected: vec![x.dim().0, x.dim().1, 1, 1],
            got: x.shape().to_vec(),
        });
    }
    let rows = resize_axis_bicubic(x, Axis(2), h * scale);
    Ok(resize_axis_bicubic(&rows, Axis(3), w * scale))
}

/// Nearest-neighbour upsampling by an integer factor
pub fn upsample_nearest(x: &Array4<f32>, scale: usize) -> Array4<f32> {
    let (n, c, h, w) = x.dim();
    Array4::from_shape_fn((n, c, h * scale, w * scale), |(n, c, y, x_)| {
        x[[n, c, y / scale, x_ / scale]]
    })
}
