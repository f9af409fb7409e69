//! Weighted multi-term distillation objective

use super::{
    sample_negatives, AdversarialLoss, ContrastiveLoss, Distance, L1Loss, LossFn, PerceptualLoss,
    PixelContrastLoss,
};
use crate::autograd::weighted_sum;
use crate::monitor::{Metric, ScalarSink};
use crate::{Error, Result, Tensor};
use ndarray::Array4;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The five loss signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// L1 between student output and ground truth
    Reconstruction,
    /// Contrastive ratio against upsampled negatives
    Contrastive,
    /// L1 between teacher output and ground truth
    Teacher,
    /// Adversarial loss on the student output
    Adversarial,
    /// Perceptual loss on the student output
    Perceptual,
}

impl TermKind {
    /// Scalar tag this term is logged under
    pub fn metric(self) -> Metric {
        match self {
            TermKind::Reconstruction => Metric::L1Loss,
            TermKind::Contrastive => Metric::ContrastLoss,
            TermKind::Teacher => Metric::TeacherL1Loss,
            TermKind::Adversarial => Metric::AdLoss,
            TermKind::Perceptual => Metric::PercepLoss,
        }
    }

    /// Short name
    pub fn name(self) -> &'static str {
        match self {
            TermKind::Reconstruction => "reconstruction",
            TermKind::Contrastive => "contrastive",
            TermKind::Teacher => "teacher",
            TermKind::Adversarial => "adversarial",
            TermKind::Perceptual => "perceptual",
        }
    }
}

/// An enabled term and its current weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossTerm {
    pub kind: TermKind,
    pub weight: f32,
}

/// Loss coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// Teacher reconstruction weight (until the cutoff epoch)
    pub t_lambda: f32,
    /// Contrastive weight
    pub contra_lambda: f32,
    /// Adversarial weight; the term is enabled only when positive
    pub ad_lambda: f32,
    /// Perceptual weight; the term is enabled only when positive
    pub percep_lambda: f32,
}

/// Tensors one training step feeds the objective
pub struct StepInputs<'a> {
    /// Low-resolution batch, source of negatives
    pub lr: &'a Array4<f32>,
    /// Ground truth
    pub hr: &'a Tensor,
    /// Full-width output
    pub teacher_sr: &'a Tensor,
    /// Reduced-width output
    pub student_sr: &'a Tensor,
}

/// Per-step loss values and the differentiable total
pub struct LossBundle {
    /// Weighted sum, ready for `backward`
    pub total: Tensor,
    values: Vec<(TermKind, f32)>,
}

impl LossBundle {
    /// Value of a computed term
    pub fn get(&self, kind: TermKind) -> Option<f32> {
        self.values
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| *v)
    }

    /// Every computed term in evaluation order
    pub fn values(&self) -> &[(TermKind, f32)] {
        &self.values
    }

    /// Scalar value of the total
    pub fn total_value(&self) -> f32 {
        self.total.item()
    }
}

/// Builds the training objective from an inspectable set of terms
///
/// The enabled set is fixed at construction: reconstruction and teacher
/// terms always, contrastive when `neg_num > 0`, adversarial and perceptual
/// when their weights are positive. Disabled terms are never computed.
///
/// ```text
/// loss = recon + contra_λ·contra + t_λ·teacher + ad_λ·ad + percep_λ·percep
/// ```
pub struct LossComposer {
    terms: Vec<LossTerm>,
    neg_num: usize,
    scale: usize,
    teacher_cutoff: usize,
    teacher_removed: bool,
    contrastive: Box<dyn ContrastiveLoss>,
    adversarial: Option<Box<dyn AdversarialLoss>>,
    perceptual: Option<Box<dyn PerceptualLoss>>,
}

impl LossComposer {
    /// Create a composer with a pixel-space L1 contrastive loss
    pub fn new(weights: LossWeights, neg_num: usize, teacher_cutoff: usize, scale: usize) -> Self {
        let mut terms = vec![LossTerm {
            kind: TermKind::Reconstruction,
            weight: 1.0,
        }];
        if neg_num > 0 {
            terms.push(LossTerm {
                kind: TermKind::Contrastive,
                weight: weights.contra_lambda,
            });
        }
        terms.push(LossTerm {
            kind: TermKind::Teacher,
            weight: weights.t_lambda,
        });
        if weights.ad_lambda > 0.0 {
            terms.push(LossTerm {
                kind: TermKind::Adversarial,
                weight: weights.ad_lambda,
            });
        }
        if weights.percep_lambda > 0.0 {
            terms.push(LossTerm {
                kind: TermKind::Perceptual,
                weight: weights.percep_lambda,
            });
        }

        Self {
            terms,
            neg_num,
            scale,
            teacher_cutoff,
            teacher_removed: false,
            contrastive: Box::new(PixelContrastLoss::new(Distance::L1, false)),
            adversarial: None,
            perceptual: None,
        }
    }

    /// Replace the contrastive loss
    pub fn with_contrastive(mut self, loss: Box<dyn ContrastiveLoss>) -> Self {
        self.contrastive = loss;
        self
    }

    /// Supply the adversarial loss
    pub fn with_adversarial(mut self, loss: Box<dyn AdversarialLoss>) -> Self {
        self.adversarial = Some(loss);
        self
    }

    /// Supply the perceptual loss
    pub fn with_perceptual(mut self, loss: Box<dyn PerceptualLoss>) -> Self {
        self.perceptual = Some(loss);
        self
    }

    /// Check that every enabled term has an implementation
    pub fn validate(&self) -> Result<()> {
        for term in &self.terms {
            let missing = match term.kind {
                TermKind::Adversarial => self.adversarial.is_none(),
                TermKind::Perceptual => self.perceptual.is_none(),
                _ => false,
            };
            if missing {
                return Err(Error::ConfigError(format!(
                    "{} weight is {} but no {} loss was supplied",
                    term.kind.name(),
                    term.weight,
                    term.kind.name()
                )));
            }
        }
        Ok(())
    }

    /// Enabled terms with their current weights
    pub fn terms(&self) -> &[LossTerm] {
        &self.terms
    }

    /// Whether `kind` is part of the objective
    pub fn is_enabled(&self, kind: TermKind) -> bool {
        self.terms.iter().any(|t| t.kind == kind)
    }

    /// Current teacher weight
    pub fn teacher_weight(&self) -> f32 {
        self.terms
            .iter()
            .find(|t| t.kind == TermKind::Teacher)
            .map_or(0.0, |t| t.weight)
    }

    /// Apply the epoch schedule; returns the teacher weight for `epoch`
    ///
    /// From the cutoff epoch on the teacher weight is zero, and it stays
    /// zero even if an earlier epoch is passed later.
    pub fn begin_epoch(&mut self, epoch: usize) -> f32 {
        if epoch >= self.teacher_cutoff && !self.teacher_removed {
            self.teacher_removed = true;
            for term in self.terms.iter_mut().filter(|t| t.kind == TermKind::Teacher) {
                term.weight = 0.0;
            }
        }
        self.teacher_weight()
    }

    /// Compute every enabled term, report it at `step`, and combine
    ///
    /// Collaborator errors propagate unchanged.
    pub fn compute<R: Rng + ?Sized>(
        &self,
        inputs: &StepInputs<'_>,
        rng: &mut R,
        sink: &mut dyn ScalarSink,
        step: u64,
    ) -> Result<LossBundle> {
        let mut values = Vec::with_capacity(self.terms.len());
        let mut weighted: Vec<(Tensor, f32)> = Vec::with_capacity(self.terms.len());

        for term in &self.terms {
            let loss = match term.kind {
                TermKind::Reconstruction => L1Loss.forward(inputs.student_sr, inputs.hr)?,
                TermKind::Teacher => L1Loss.forward(inputs.teacher_sr, inputs.hr)?,
                TermKind::Contrastive => {
                    let negatives = sample_negatives(inputs.lr, self.neg_num, self.scale, rng)?;
                    self.contrastive.compute(
                        inputs.teacher_sr,
                        inputs.student_sr,
                        &Tensor::from_array4(negatives, false),
                    )?
                }
                TermKind::Adversarial => self
                    .adversarial
                    .as_ref()
                    .ok_or_else(|| missing(term.kind))?
                    .compute(inputs.student_sr, inputs.hr)?,
                TermKind::Perceptual => self
                    .perceptual
                    .as_ref()
                    .ok_or_else(|| missing(term.kind))?
                    .compute(inputs.hr, inputs.student_sr)?,
            };

            let value = loss.item();
            sink.add_scalar(term.kind.metric(), f64::from(value), step);
            values.push((term.kind, value));
            if term.weight != 0.0 {
                weighted.push((loss, term.weight));
            }
        }

        let refs: Vec<(&Tensor, f32)> = weighted.iter().map(|(t, w)| (t, *w)).collect();
        let total = weighted_sum(&refs).ok_or_else(|| Error::Loss {
            term: "total".to_string(),
            reason: "no weighted terms".to_string(),
        })?;
        sink.add_scalar(Metric::TotalLoss, f64::from(total.item()), step);

        Ok(LossBundle { total, values })
    }
}

fn missing(kind: TermKind) -> Error {
    Error::Loss {
        term: kind.name().to_string(),
        reason: "no implementation supplied".to_string(),
    }
}
