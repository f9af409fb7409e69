//! Distillation objective
//!
//! The student (reduced-width) output is trained against the ground truth,
//! the teacher (full-width) output and a set of negatives drawn from the
//! low-resolution batch.
//!
//! ## Terms
//!
//! - **Reconstruction**: L1 between student output and ground truth
//! - **Teacher**: L1 between teacher output and ground truth, dropped from
//!   the cutoff epoch on
//! - **Contrastive**: ratio of teacher-student distance to student-negative
//!   distance, enabled when negatives are requested
//! - **Adversarial / Perceptual**: pluggable, enabled by positive weights;
//!   [`PixelGanLoss`] and [`EdgeFeatureLoss`] are the built-in choices
//!
//! ## Example
//!
//! ```
//! use destilar::distill::{LossComposer, LossWeights, TermKind};
//!
//! let weights = LossWeights {
//!     t_lambda: 1.0,
//!     contra_lambda: 0.5,
//!     ad_lambda: 0.0,
//!     percep_lambda: 0.0,
//! };
//! let mut composer = LossComposer::new(weights, 0, 10, 4);
//! assert!(!composer.is_enabled(TermKind::Contrastive));
//! assert_eq!(composer.begin_epoch(10), 0.0);
//! ```

mod adversarial;
mod composer;
mod contrast;
mod loss;
mod negatives;
mod perceptual;


pub use adversarial::{PixelDiscriminator, PixelGanLoss};
pub use composer::{LossBundle, LossComposer, LossTerm, LossWeights, StepInputs, TermKind};
pub use contrast::{AdversarialLoss, ContrastiveLoss, Distance, PerceptualLoss, PixelContrastLoss};
pub use loss::{L1Loss, LossFn, MSELoss};
pub use negatives::sample_negatives;
pub use perceptual::EdgeFeatureLoss;
