//! Paired low/high-resolution data
//!
//! A [`DataLoader`] hands the trainer one epoch of [`Batch`]es at a time and
//! exposes the held-out [`TestSet`]s the evaluator walks.
//!
//! # Example
//!
//! ```
//! use destilar::data::{DataLoader, InMemoryLoader, Sample};
//! use ndarray::Array3;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let samples: Vec<Sample> = (0..5)
//!     .map(|i| {
//!         Sample::new(Array3::zeros((3, 4, 4)), Array3::zeros((3, 8, 8)), format!("{i:04}"))
//!             .unwrap()
//!     })
//!     .collect();
//! let mut loader = InMemoryLoader::new(samples, 2);
//!
//! let batches = loader.train_batches(&mut StdRng::seed_from_u64(0)).unwrap();
//! assert_eq!(batches.len(), 2); // last incomplete batch dropped
//! ```

mod folder;
mod memory;

pub use folder::FolderLoader;
pub use memory::InMemoryLoader;

use crate::vision::Transform;
use crate::{Error, Result};
use ndarray::{stack, Array3, Array4, Axis};
use rand::{Rng, RngCore};

/// One (low-resolution, high-resolution) image pair, `C×H×W`
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub lr: Array3<f32>,
    pub hr: Array3<f32>,
    pub id: String,
}

impl Sample {
    /// Pair two images; channel counts must agree
    pub fn new(lr: Array3<f32>, hr: Array3<f32>, id: impl Into<String>) -> Result<Self> {
        if lr.shape()[0] != hr.shape()[0] {
            return Err(Error::ShapeMismatch {
                expected: vec![lr.shape()[0]],
                got: vec![hr.shape()[0]],
            });
        }
        Ok(Self {
            lr,
            hr,
            id: id.into(),
        })
    }

    /// Low-resolution image as a batch of one
    pub fn lr_batch(&self) -> Array4<f32> {
        self.lr.clone().insert_axis(Axis(0))
    }

    /// High-resolution image as a batch of one
    pub fn hr_batch(&self) -> Array4<f32> {
        self.hr.clone().insert_axis(Axis(0))
    }

    /// Crop an aligned patch: `lr_patch` pixels in LR space, `lr_patch·scale` in HR space
    pub fn random_crop<R: Rng + ?Sized>(
        &self,
        lr_patch: usize,
        scale: usize,
        rng: &mut R,
    ) -> Result<Sample> {
        let (_, lh, lw) = self.lr.dim();
        let (_, hh, hw) = self.hr.dim();
        let hr_patch = lr_patch * scale;
        if lr_patch == 0 || lh < lr_patch || lw < lr_patch || hh < hr_patch || hw < hr_patch {
            return Err(Error::InvalidParameter(format!(
                "{}: image {lh}x{lw} too small for a {lr_patch} pixel patch",
                self.id
            )));
        }

        let iy = rng.gen_range(0..=lh - lr_patch);
        let ix = rng.gen_range(0..=lw - lr_patch);
        let (ty, tx) = (iy * scale, ix * scale);

        let lr = self
            .lr
            .slice(ndarray::s![.., iy..iy + lr_patch, ix..ix + lr_patch])
            .to_owned();
        let hr = self
            .hr
            .slice(ndarray::s![.., ty..ty + hr_patch, tx..tx + hr_patch])
            .to_owned();
        Sample::new(lr, hr, self.id.clone())
    }

    /// Random horizontal flip, vertical flip and transpose, each with p = 0.5
    pub fn augment<R: Rng + ?Sized>(self, rng: &mut R) -> Sample {
        let mut lr = self.lr.insert_axis(Axis(0));
        let mut hr = self.hr.insert_axis(Axis(0));
        for t in [Transform::FlipW, Transform::FlipH, Transform::Transpose] {
            if rng.gen_bool(0.5) {
                lr = t.apply(&lr);
                hr = t.apply(&hr);
            }
        }
        Sample {
            lr: lr.index_axis_move(Axis(0), 0),
            hr: hr.index_axis_move(Axis(0), 0),
            id: self.id,
        }
    }
}

/// A stacked training batch, `N×C×H×W`
#[derive(Debug, Clone)]
pub struct Batch {
    pub lr: Array4<f32>,
    pub hr: Array4<f32>,
    pub ids: Vec<String>,
}

impl Batch {
    /// Stack equally sized samples
    pub fn stack(samples: &[Sample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::InvalidParameter("cannot stack an empty batch".to_string()));
        }
        let shape_err = |e: ndarray::ShapeError| Error::InvalidParameter(format!("batch: {e}"));
        let lr_views: Vec<_> = samples.iter().map(|s| s.lr.view()).collect();
        let hr_views: Vec<_> = samples.iter().map(|s| s.hr.view()).collect();
        Ok(Self {
            lr: stack(Axis(0), &lr_views).map_err(shape_err)?,
            hr: stack(Axis(0), &hr_views).map_err(shape_err)?,
            ids: samples.iter().map(|s| s.id.clone()).collect(),
        })
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.lr.shape()[0]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A held-out dataset evaluated whole-image
#[derive(Debug, Clone)]
pub struct TestSet {
    pub name: String,
    /// Benchmark sets are scored on the Y channel with a `scale` border
    pub benchmark: bool,
    pub samples: Vec<Sample>,
}

impl TestSet {
    pub fn new(name: impl Into<String>, benchmark: bool, samples: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            benchmark,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Source of training batches and test sets
pub trait DataLoader {
    /// One epoch of batches; incomplete trailing batches are dropped
    fn train_batches(&mut self, rng: &mut dyn RngCore) -> Result<Vec<Batch>>;

    /// Number of training images
    fn train_len(&self) -> usize;

    /// Batch size
    fn batch_size(&self) -> usize;

    /// Held-out datasets in configuration order
    fn test_sets(&self) -> &[TestSet];
}

/// Split a shuffled index order into full batches
pub(crate) fn batch_order(
    len: usize,
    batch_size: usize,
    rng: &mut dyn RngCore,
    shuffle: bool,
) -> Vec<Vec<usize>> {
    use rand::seq::SliceRandom;

    let mut order: Vec<usize> = (0..len).collect();
    if shuffle {
        order.shuffle(rng);
    }
    if batch_size == 0 {
        return Vec::new();
    }
    order
        .chunks_exact(batch_size)
        .map(<[usize]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(c: usize, h: usize, w: usize) -> Array3<f32> {
        Array3::from_shape_fn((c, h, w), |(k, y, x)| (k * 1000 + y * 100 + x) as f32)
    }

    #[test]
    fn test_sample_channel_mismatch() {
        let result = Sample::new(Array3::zeros((1, 2, 2)), Array3::zeros((3, 4, 4)), "a");
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_random_crop_is_aligned() {
        let lr = ramp(1, 6, 6);
        let hr = Array3::from_shape_fn((1, 12, 12), |(_, y, x)| lr[[0, y / 2, x / 2]]);
        let sample = Sample::new(lr, hr, "img").unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            let patch = sample.random_crop(3, 2, &mut rng).unwrap();
            assert_eq!(patch.lr.dim(), (1, 3, 3));
            assert_eq!(patch.hr.dim(), (1, 6, 6));
            for y in 0..6 {
                for x in 0..6 {
                    assert_eq!(patch.hr[[0, y, x]], patch.lr[[0, y / 2, x / 2]]);
                }
            }
        }
    }

    #[test]
    fn test_random_crop_too_large() {
        let sample = Sample::new(ramp(1, 2, 2), ramp(1, 4, 4), "small").unwrap();
        let result = sample.random_crop(3, 2, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_augment_keeps_pair_aligned() {
        let lr = ramp(1, 4, 4);
        let hr = Array3::from_shape_fn((1, 8, 8), |(_, y, x)| lr[[0, y / 2, x / 2]]);
        let sample = Sample::new(lr, hr, "img").unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..8 {
            let out = sample.clone().augment(&mut rng);
            for y in 0..8 {
                for x in 0..8 {
                    assert_eq!(out.hr[[0, y, x]], out.lr[[0, y / 2, x / 2]]);
                }
            }
        }
    }

    #[test]
    fn test_batch_stack() {
        let samples = vec![
            Sample::new(ramp(3, 2, 2), ramp(3, 4, 4), "a").unwrap(),
            Sample::new(ramp(3, 2, 2), ramp(3, 4, 4), "b").unwrap(),
        ];
        let batch = Batch::stack(&samples).unwrap();
        assert_eq!(batch.lr.shape(), &[2, 3, 2, 2]);
        assert_eq!(batch.hr.shape(), &[2, 3, 4, 4]);
        assert_eq!(batch.ids, vec!["a", "b"]);
    }

    #[test]
    fn test_batch_stack_ragged_fails() {
        let samples = vec![
            Sample::new(ramp(1, 2, 2), ramp(1, 4, 4), "a").unwrap(),
            Sample::new(ramp(1, 3, 3), ramp(1, 6, 6), "b").unwrap(),
        ];
        assert!(Batch::stack(&samples).is_err());
    }

    #[test]
    fn test_batch_order_drops_last() {
        let order = batch_order(7, 3, &mut StdRng::seed_from_u64(0), true);
        assert_eq!(order.len(), 2);
        let mut seen: Vec<usize> = order.concat();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_batch_order_unshuffled() {
        let order = batch_order(4, 2, &mut StdRng::seed_from_u64(0), false);
        assert_eq!(order, vec![vec![0, 1], vec![2, 3]]);
    }
}
