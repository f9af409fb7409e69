//! Inference-only evaluation over held-out datasets

use super::layout::sr_image_name;
use super::Verbosity;
use crate::autograd::no_grad;
use crate::data::TestSet;
use crate::model::{SlimModel, SlimNetwork};
use crate::monitor::{Metric, ScalarSink};
use crate::quality::{psnr, ssim, NoReferenceMetric};
use crate::vision::{quantize, save_first, self_ensemble};
use crate::{Error, Result, Tensor};
use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Which datasets an evaluation pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalScope {
    /// Stop after the first dataset and score it
    #[default]
    FirstDataset,
    /// Evaluate every dataset and score their mean PSNR
    AllDatasets,
}

/// Mean metrics for one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetReport {
    pub name: String,
    pub psnr: f32,
    pub ssim: f32,
    /// Absent when no no-reference metric is configured
    pub niqe: Option<f32>,
    pub samples: usize,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Per-dataset means, in evaluation order
    pub datasets: Vec<DatasetReport>,
    /// The value checkpoint selection compares
    pub score: f32,
    pub elapsed_secs: f64,
}

/// Runs the student over test sets and aggregates quality metrics
pub struct Evaluator {
    scale: usize,
    rgb_range: f32,
    self_ensemble: bool,
    scope: EvalScope,
    save_dir: Option<PathBuf>,
    niqe: Option<Box<dyn NoReferenceMetric>>,
    verbosity: Verbosity,
}

impl Evaluator {
    pub fn new(scale: usize, rgb_range: f32) -> Self {
        Self {
            scale,
            rgb_range,
            self_ensemble: false,
            scope: EvalScope::FirstDataset,
            save_dir: None,
            niqe: None,
            verbosity: Verbosity::Normal,
        }
    }

    /// Average the 8 flip/transpose variants of every input
    pub fn with_self_ensemble(mut self, enabled: bool) -> Self {
        self.self_ensemble = enabled;
        self
    }

    pub fn with_scope(mut self, scope: EvalScope) -> Self {
        self.scope = scope;
        self
    }

    /// Write every quantized output as `{id}_x{scale}_w{width}_SR.png` under `dir`
    pub fn save_results_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn with_niqe(mut self, metric: Box<dyn NoReferenceMetric>) -> Self {
        self.niqe = Some(metric);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn self_ensemble(&self) -> bool {
        self.self_ensemble
    }

    pub fn scope(&self) -> EvalScope {
        self.scope
    }

    /// Super-resolve one low-resolution batch at `width_mult`
    pub fn infer<N: SlimNetwork>(
        &self,
        model: &SlimModel<N>,
        lr: &Array4<f32>,
        width_mult: f32,
    ) -> Result<Array4<f32>> {
        no_grad(|| {
            let forward = |x: &Array4<f32>| -> Result<Array4<f32>> {
                model
                    .forward_scaled(&Tensor::from_array4(x.clone(), false), width_mult)?
                    .to_array4()
            };
            if self.self_ensemble {
                self_ensemble(lr, forward)
            } else {
                forward(lr)
            }
        })
    }

    /// Evaluate `sets` and report scalars at `step`
    ///
    /// With [`EvalScope::FirstDataset`] only the first dataset is visited and
    /// its PSNR is the score. Any metric failure aborts the whole pass.
    pub fn evaluate<N: SlimNetwork>(
        &self,
        model: &SlimModel<N>,
        width_mult: f32,
        sets: &[TestSet],
        sink: &mut dyn ScalarSink,
        step: u64,
    ) -> Result<EvalReport> {
        if sets.is_empty() {
            return Err(Error::ConfigError("no test datasets configured".to_string()));
        }
        let started = Instant::now();
        let visit = match self.scope {
            EvalScope::FirstDataset => 1,
            EvalScope::AllDatasets => sets.len(),
        };

        let mut datasets = Vec::with_capacity(visit);
        for set in &sets[..visit] {
            let report = self.evaluate_set(model, width_mult, set)?;
            self.verbosity.log(
                Verbosity::Normal,
                &format!(
                    "{}\t{}\tPSNR: {:.3}\tNIQE: {}\tSSIM: {:.4}",
                    width_mult,
                    report.name,
                    report.psnr,
                    report.niqe.map_or("-".to_string(), |v| format!("{v:.3}")),
                    report.ssim
                ),
            );
            let name = report.name.as_str();
            sink.add_dataset_scalar(Metric::TestPsnr, f64::from(report.psnr), step, name);
            sink.add_dataset_scalar(Metric::TestSsim, f64::from(report.ssim), step, name);
            if let Some(niqe) = report.niqe {
                sink.add_dataset_scalar(Metric::TestNiqe, f64::from(niqe), step, name);
            }
            datasets.push(report);
        }

        let score = datasets.iter().map(|d| d.psnr).sum::<f32>() / datasets.len() as f32;
        Ok(EvalReport {
            datasets,
            score,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn evaluate_set<N: SlimNetwork>(
        &self,
        model: &SlimModel<N>,
        width_mult: f32,
        set: &TestSet,
    ) -> Result<DatasetReport> {
        if set.is_empty() {
            return Err(Error::ConfigError(format!("test set {} is empty", set.name)));
        }

        let (mut psnr_sum, mut ssim_sum, mut niqe_sum) = (0.0f64, 0.0f64, 0.0f64);
        for sample in &set.samples {
            let sr = self.infer(model, &sample.lr_batch(), width_mult)?;
            let sr = quantize(&sr, self.rgb_range);
            let hr = sample.hr_batch();

            if let Some(dir) = &self.save_dir {
                let name = sr_image_name(&sample.id, self.scale, width_mult);
                save_first(&sr, self.rgb_range, &dir.join(name))?;
            }

            psnr_sum += f64::from(psnr(&sr, &hr, self.scale, self.rgb_range, set.benchmark)?);
            ssim_sum += f64::from(ssim(&sr, &hr, self.scale, self.rgb_range, set.benchmark)?);
            if let Some(metric) = &self.niqe {
                niqe_sum += f64::from(metric.score(sr.index_axis(Axis(0), 0), self.rgb_range)?);
            }
        }

        let n = set.len() as f64;
        Ok(DatasetReport {
            name: set.name.clone(),
            psnr: (psnr_sum / n) as f32,
            ssim: (ssim_sum / n) as f32,
            niqe: self.niqe.as_ref().map(|_| (niqe_sum / n) as f32),
            samples: set.len(),
        })
    }
}
