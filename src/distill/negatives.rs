//! Negative sampling for the contrastive term

use crate::vision::upsample_bicubic;
use crate::{Error, Result};
use ndarray::{Array4, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick `neg_num` low-resolution images and upsample them bicubically
///
/// The first `neg_num` images of the batch are taken in a random order
/// (a permutation of `0..neg_num`), then brought to the output resolution.
pub fn sample_negatives<R: Rng + ?Sized>(
    lr: &Array4<f32>,
    neg_num: usize,
    scale: usize,
    rng: &mut R,
) -> Result<Array4<f32>> {
    let batch = lr.shape()[0];
    if neg_num == 0 {
        return Err(Error::InvalidParameter(
            "negative sampling needs neg_num > 0".to_string(),
        ));
    }
    if neg_num > batch {
        return Err(Error::Loss {
            term: "contrastive".to_string(),
            reason: format!("neg_num {neg_num} exceeds batch size {batch}"),
        });
    }

    let mut order: Vec<usize> = (0..neg_num).collect();
    order.shuffle(rng);

    let picked = lr.select(Axis(0), &order);
    upsample_bicubic(&picked, scale)
}
