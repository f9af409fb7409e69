//! Paired PNG folders
//!
//! ```text
//! root/
//!   HR/0001.png
//!   LR_bicubic/X4/0001.png      (or 0001x4.png)
//! ```

use super::{batch_order, Batch, DataLoader, Sample, TestSet};
use crate::vision::load_png;
use crate::{Error, Result};
use rand::RngCore;
use std::path::{Path, PathBuf};

/// Loader reading `HR/` and `LR_bicubic/X{scale}/` image pairs
///
/// Training images are held in memory and cropped to random aligned
/// patches every epoch, then flipped and transposed at random.
#[derive(Debug)]
pub struct FolderLoader {
    train: Vec<Sample>,
    scale: usize,
    patch_size: usize,
    batch_size: usize,
    augment: bool,
    test_sets: Vec<TestSet>,
}

impl FolderLoader {
    /// Read the training pairs under `root`
    ///
    /// `patch_size` is measured in HR pixels and must be divisible by `scale`.
    pub fn open(
        root: &Path,
        scale: usize,
        patch_size: usize,
        batch_size: usize,
        n_colors: usize,
        rgb_range: f32,
    ) -> Result<Self> {
        if scale == 0 || patch_size % scale != 0 || patch_size == 0 {
            return Err(Error::InvalidParameter(format!(
                "patch size {patch_size} must be a positive multiple of scale {scale}"
            )));
        }
        let train = read_pairs(root, scale, n_colors, rgb_range)?;
        if train.is_empty() {
            return Err(Error::ConfigError(format!(
                "no training images under {}",
                root.join("HR").display()
            )));
        }
        Ok(Self {
            train,
            scale,
            patch_size,
            batch_size,
            augment: true,
            test_sets: Vec::new(),
        })
    }

    /// Loader with no training images, for evaluation-only runs
    pub fn test_only(scale: usize) -> Self {
        Self {
            train: Vec::new(),
            scale,
            patch_size: scale,
            batch_size: 1,
            augment: false,
            test_sets: Vec::new(),
        }
    }

    /// Turn flip/transpose augmentation on or off
    pub fn with_augment(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    /// Add a whole-image test set read from `root`
    pub fn with_test_set(
        mut self,
        name: &str,
        root: &Path,
        benchmark: bool,
        n_colors: usize,
        rgb_range: f32,
    ) -> Result<Self> {
        let samples = read_pairs(root, self.scale, n_colors, rgb_range)?;
        self.test_sets.push(TestSet::new(name, benchmark, samples));
        Ok(self)
    }
}

impl DataLoader for FolderLoader {
    fn train_batches(&mut self, rng: &mut dyn RngCore) -> Result<Vec<Batch>> {
        let lr_patch = self.patch_size / self.scale;
        let mut batches = Vec::new();
        for indices in batch_order(self.train.len(), self.batch_size, rng, true) {
            let mut samples = Vec::with_capacity(indices.len());
            for i in indices {
                let mut patch = self.train[i].random_crop(lr_patch, self.scale, rng)?;
                if self.augment {
                    patch = patch.augment(rng);
                }
                samples.push(patch);
            }
            batches.push(Batch::stack(&samples)?);
        }
        Ok(batches)
    }

    fn train_len(&self) -> usize {
        self.train.len()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn test_sets(&self) -> &[TestSet] {
        &self.test_sets
    }
}

/// Directory of low-resolution images for `scale`
pub fn lr_dir(root: &Path, scale: usize) -> PathBuf {
    root.join("LR_bicubic").join(format!("X{scale}"))
}

fn read_pairs(root: &Path, scale: usize, n_colors: usize, rgb_range: f32) -> Result<Vec<Sample>> {
    let hr_dir = root.join("HR");
    let lr_dir = lr_dir(root, scale);

    let mut hr_files: Vec<PathBuf> = std::fs::read_dir(&hr_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        })
        .collect();
    hr_files.sort();

    let mut samples = Vec::with_capacity(hr_files.len());
    for hr_path in hr_files {
        let stem = hr_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Image(format!("bad file name {}", hr_path.display())))?
            .to_string();

        let lr_path = [
            lr_dir.join(format!("{stem}.png")),
            lr_dir.join(format!("{stem}x{scale}.png")),
        ]
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| {
            Error::Image(format!(
                "no low-resolution image for {stem} in {}",
                lr_dir.display()
            ))
        })?;

        let hr = load_png(&hr_path, n_colors, rgb_range)?;
        let lr = load_png(&lr_path, n_colors, rgb_range)?;
        let (lh, lw) = (lr.shape()[1], lr.shape()[2]);
        let (hh, hw) = (hr.shape()[1], hr.shape()[2]);
        if hh < lh * scale || hw < lw * scale {
            return Err(Error::ShapeMismatch {
                expected: vec![lh * scale, lw * scale],
                got: vec![hh, hw],
            });
        }
        // HR may carry a few extra border pixels
        let hr = hr
            .slice(ndarray::s![.., ..lh * scale, ..lw * scale])
            .to_owned();
        samples.push(Sample::new(lr, hr, stem)?);
    }
    Ok(samples)
}
