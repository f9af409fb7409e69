//! Collaborator loss traits and the pixel-space contrastive loss

use super::{L1Loss, LossFn, MSELoss};
use crate::autograd::{ratio, weighted_sum};
use crate::{Error, Result, Tensor};
use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};

/// Pulls the student toward the teacher and away from negatives
pub trait ContrastiveLoss {
    /// Scalar loss for `teacher_sr`, `student_sr` and upsampled negatives
    fn compute(&self, teacher_sr: &Tensor, student_sr: &Tensor, negatives: &Tensor)
        -> Result<Tensor>;
}

/// Adversarial generator loss
pub trait AdversarialLoss {
    /// Scalar loss for the student output against the ground truth
    fn compute(&self, student_sr: &Tensor, hr: &Tensor) -> Result<Tensor>;
}

/// Feature-space perceptual loss
pub trait PerceptualLoss {
    /// Scalar loss between the ground truth and the student output
    fn compute(&self, hr: &Tensor, student_sr: &Tensor) -> Result<Tensor>;
}

/// Distance used inside the contrastive ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Mean absolute difference
    #[default]
    L1,
    /// Mean squared difference
    L2,
}

impl Distance {
    fn loss(self) -> &'static dyn LossFn {
        match self {
            Distance::L1 => &L1Loss,
            Distance::L2 => &MSELoss,
        }
    }
}

const RATIO_EPS: f32 = 1e-7;

/// Contrastive ratio computed directly on pixels
///
/// ```text
/// L = d(teacher, student) / (mean_j d(student, negative_j) + 1e-7)
/// ```
///
/// Each negative is compared against every image of the student batch.
/// With `detach_teacher` the numerator sends no gradient into the teacher
/// output.
#[derive(Debug, Clone, Copy)]
pub struct PixelContrastLoss {
    pub distance: Distance,
    pub detach_teacher: bool,
}

impl PixelContrastLoss {
    pub fn new(distance: Distance, detach_teacher: bool) -> Self {
        Self {
            distance,
            detach_teacher,
        }
    }
}

impl ContrastiveLoss for PixelContrastLoss {
    fn compute(
        &self,
        teacher_sr: &Tensor,
        student_sr: &Tensor,
        negatives: &Tensor,
    ) -> Result<Tensor> {
        let d = self.distance.loss();
        let teacher = if self.detach_teacher {
            teacher_sr.detach()
        } else {
            teacher_sr.clone()
        };
        let positive = d.forward(&teacher, student_sr)?;

        let student_shape = student_sr.shape();
        let negatives = negatives.to_array4()?;
        if negatives.shape()[1..] != student_shape[1..] {
            return Err(Error::Loss {
                term: "contrastive".to_string(),
                reason: format!(
                    "negatives {:?} do not match student output {:?}",
                    negatives.shape(),
                    student_shape
                ),
            });
        }
        let count = negatives.shape()[0];
        if count == 0 {
            return Err(Error::Loss {
                term: "contrastive".to_string(),
                reason: "no negative samples".to_string(),
            });
        }

        let batch = student_shape[0];
        let mut distances = Vec::with_capacity(count);
        for negative in negatives.axis_iter(Axis(0)) {
            let tiled = Array4::from_shape_fn(
                (batch, negative.shape()[0], negative.shape()[1], negative.shape()[2]),
                |(_, c, y, x)| negative[[c, y, x]],
            );
            distances.push(d.forward(student_sr, &Tensor::from_array4(tiled, false))?);
        }

        let weight = 1.0 / count as f32;
        let terms: Vec<(&Tensor, f32)> = distances.iter().map(|t| (t, weight)).collect();
        let negative = weighted_sum(&terms).ok_or_else(|| Error::Loss {
            term: "contrastive".to_string(),
            reason: "no negative distances".to_string(),
        })?;

        Ok(ratio(&positive, &negative, RATIO_EPS))
    }
}
