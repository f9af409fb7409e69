//! Image batch utilities
//!
//! All images are `[N, C, H, W]` `f32` arrays with values in `[0, rgb_range]`.

mod pixels;
mod resample;
mod transform;

pub use pixels::{load_png, quantize, save_first, save_png};
pub use resample::{upsample_bicubic, upsample_nearest};
pub use transform::{apply_chain, self_ensemble, undo_chain, Transform, ENSEMBLE_VARIANTS};
