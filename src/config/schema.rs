//! YAML schema definitions for declarative distillation runs

use crate::distill::{Distance, LossWeights};
use crate::optim::LrSchedule;
use crate::train::EvalScope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete distillation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistillSpec {
    /// Network configuration
    pub model: ModelSpec,

    /// Training and test data
    pub data: DataConfig,

    /// Optimizer configuration
    pub optimizer: OptimSpec,

    /// Learning rate schedule
    #[serde(default)]
    pub schedule: LrSchedule,

    /// Loss weights and distillation knobs
    #[serde(default)]
    pub loss: LossSpec,

    /// Epoch loop and evaluation settings
    #[serde(default)]
    pub training: TrainingParams,

    /// Checkpoint location and teacher weights
    #[serde(default)]
    pub checkpoint: CheckpointSpec,

    /// Image and scalar log roots
    #[serde(default)]
    pub output: OutputSpec,
}

/// Slimmable network description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Architecture name, used for output directories
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Upscale factor
    pub scale: usize,

    /// Hidden width at `width_mult = 1`
    #[serde(default = "default_n_feats")]
    pub n_feats: usize,

    /// Image channels
    #[serde(default = "default_n_colors")]
    pub n_colors: usize,

    /// Pixel value range
    #[serde(default = "default_rgb_range")]
    pub rgb_range: f32,

    /// Width multiplier of the student pass
    #[serde(default = "default_stu_width_mult")]
    pub stu_width_mult: f32,

    /// Seed for weight initialisation
    #[serde(default)]
    pub init_seed: u64,
}

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training root holding `HR/` and `LR_bicubic/X{scale}/`
    pub train: PathBuf,

    /// Batch size
    pub batch_size: usize,

    /// HR patch edge in pixels
    #[serde(default = "default_patch_size")]
    pub patch_size: usize,

    /// Random flips and transposes on training patches
    #[serde(default = "default_true")]
    pub augment: bool,

    /// Evaluation datasets, in reporting order
    #[serde(default)]
    pub test: Vec<TestDataSpec>,
}

/// One evaluation dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDataSpec {
    pub name: String,
    pub path: PathBuf,

    /// Score on the Y channel with a `scale` border
    #[serde(default)]
    pub benchmark: bool,
}

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSpec {
    /// Optimizer name: "adam" | "sgd"
    pub name: String,

    /// Initial learning rate
    pub lr: f32,

    /// Optimizer-specific parameters (beta1, beta2, eps, momentum)
    #[serde(flatten)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Loss composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    /// Teacher L1 weight
    #[serde(default = "default_one")]
    pub t_lambda: f32,

    /// Contrastive weight
    #[serde(default)]
    pub contra_lambda: f32,

    /// Adversarial weight
    #[serde(default)]
    pub ad_lambda: f32,

    /// Perceptual weight
    #[serde(default)]
    pub percep_lambda: f32,

    /// Negatives per step; 0 disables the contrastive term
    #[serde(default)]
    pub neg_num: usize,

    /// Epoch from which the teacher weight is zero
    #[serde(default = "default_t_l_remove")]
    pub t_l_remove: usize,

    /// Stop contrastive gradients into the teacher output
    #[serde(default)]
    pub contrast_t_detach: bool,

    /// Distance inside the contrastive ratio
    #[serde(default)]
    pub d_func: Distance,

    /// Discriminator updates per training step
    #[serde(default = "default_gan_k")]
    pub gan_k: usize,

    /// Discriminator learning rate
    #[serde(default = "default_gan_lr")]
    pub gan_lr: f32,
}

impl Default for LossSpec {
    fn default() -> Self {
        Self {
            t_lambda: 1.0,
            contra_lambda: 0.0,
            ad_lambda: 0.0,
            percep_lambda: 0.0,
            neg_num: 0,
            t_l_remove: default_t_l_remove(),
            contrast_t_detach: false,
            d_func: Distance::L1,
            gan_k: default_gan_k(),
            gan_lr: default_gan_lr(),
        }
    }
}

impl LossSpec {
    pub fn weights(&self) -> LossWeights {
        LossWeights {
            t_lambda: self.t_lambda,
            contra_lambda: self.contra_lambda,
            ad_lambda: self.ad_lambda,
            percep_lambda: self.percep_lambda,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Number of epochs
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Progress line and snapshot cadence, in batches
    #[serde(default = "default_print_every")]
    pub print_every: usize,

    /// Seed for batch order, crops and negatives
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// 8-way self-ensemble at evaluation
    #[serde(default)]
    pub self_ensemble: bool,

    /// Write evaluation outputs as PNG
    #[serde(default)]
    pub save_results: bool,

    /// Score every test dataset instead of the first
    #[serde(default)]
    pub evaluate_all_datasets: bool,

    /// Write `result_*` images at every progress line
    #[serde(default = "default_true")]
    pub save_snapshots: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            print_every: default_print_every(),
            seed: default_seed(),
            self_ensemble: false,
            save_results: false,
            evaluate_all_datasets: false,
            save_snapshots: true,
        }
    }
}

impl TrainingParams {
    pub fn eval_scope(&self) -> EvalScope {
        if self.evaluate_all_datasets {
            EvalScope::AllDatasets
        } else {
            EvalScope::FirstDataset
        }
    }
}

/// Where checkpoints live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSpec {
    /// Checkpoint directory
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,

    /// File stem of the student checkpoint
    #[serde(default = "default_model_filename")]
    pub model_filename: String,

    /// Pretrained full-width weights used when no checkpoint exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<PathBuf>,
}

impl Default for CheckpointSpec {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
            model_filename: default_model_filename(),
            teacher: None,
        }
    }
}

/// Output roots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Root of snapshot and result images
    #[serde(default = "default_output_root")]
    pub root: PathBuf,

    /// Root of scalar logs
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            log_root: default_log_root(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

fn default_model_name() -> String {
    "slim_mixer".to_string()
}

fn default_n_feats() -> usize {
    64
}

fn default_n_colors() -> usize {
    3
}

fn default_rgb_range() -> f32 {
    255.0
}

fn default_stu_width_mult() -> f32 {
    0.25
}

fn default_patch_size() -> usize {
    96
}

fn default_t_l_remove() -> usize {
    200
}

fn default_gan_k() -> usize {
    1
}

fn default_gan_lr() -> f32 {
    1e-4
}

fn default_epochs() -> usize {
    300
}

fn default_print_every() -> usize {
    100
}

fn default_seed() -> u64 {
    1
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("./checkpoints")
}

fn default_model_filename() -> String {
    "student".to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./output")
}

fn default_log_root() -> PathBuf {
    PathBuf::from("./log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let yaml = r#"
model:
  scale: 4

data:
  train: ./DIV2K
  batch_size: 16

optimizer:
  name: adam
  lr: 0.0001
"#;

        let spec: DistillSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.scale, 4);
        assert_eq!(spec.model.n_feats, 64);
        assert_eq!(spec.model.stu_width_mult, 0.25);
        assert_eq!(spec.data.patch_size, 96);
        assert!(spec.data.test.is_empty());
        assert_eq!(spec.loss, LossSpec::default());
        assert_eq!(spec.schedule, LrSchedule::Cosine { min_lr: 0.0 });
        assert_eq!(spec.training.epochs, 300);
        assert_eq!(spec.checkpoint.teacher, None);
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
model:
  name: edsr_slim
  scale: 2
  n_feats: 32
  n_colors: 3
  rgb_range: 1.0
  stu_width_mult: 0.5
  init_seed: 7

data:
  train: ./DIV2K
  batch_size: 8
  patch_size: 48
  augment: false
  test:
    - name: Set5
      path: ./benchmark/Set5
      benchmark: true
    - name: DIV2K_val
      path: ./DIV2K_val

optimizer:
  name: sgd
  lr: 0.01
  momentum: 0.9

schedule:
  kind: step
  step_size: 100
  gamma: 0.5

loss:
  t_lambda: 0.5
  contra_lambda: 0.1
  neg_num: 4
  t_l_remove: 50
  contrast_t_detach: true
  d_func: l2

training:
  epochs: 10
  print_every: 20
  seed: 3
  self_ensemble: true
  save_results: true
  evaluate_all_datasets: true

checkpoint:
  dir: ./ckpt
  model_filename: x2_w050
  teacher: ./teacher.safetensors
"#;

        let spec: DistillSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.name, "edsr_slim");
        assert_eq!(spec.data.test.len(), 2);
        assert!(spec.data.test[0].benchmark);
        assert!(!spec.data.test[1].benchmark);
        assert_eq!(spec.optimizer.params["momentum"], serde_json::json!(0.9));
        assert_eq!(spec.schedule, LrSchedule::Step { step_size: 100, gamma: 0.5 });
        assert_eq!(spec.loss.d_func, Distance::L2);
        assert!(spec.loss.contrast_t_detach);
        assert_eq!(spec.training.eval_scope(), EvalScope::AllDatasets);
        assert_eq!(spec.checkpoint.teacher, Some(PathBuf::from("./teacher.safetensors")));
        assert_eq!(spec.output, OutputSpec::default());
    }

    #[test]
    fn test_loss_weights_mapping() {
        let loss = LossSpec {
            t_lambda: 0.3,
            contra_lambda: 0.2,
            ad_lambda: 0.1,
            percep_lambda: 0.05,
            ..LossSpec::default()
        };
        let weights = loss.weights();
        assert_eq!(weights.t_lambda, 0.3);
        assert_eq!(weights.contra_lambda, 0.2);
        assert_eq!(weights.ad_lambda, 0.1);
        assert_eq!(weights.percep_lambda, 0.05);
    }

    #[test]
    fn test_default_scope_is_first_dataset() {
        assert_eq!(TrainingParams::default().eval_scope(), EvalScope::FirstDataset);
    }
}
