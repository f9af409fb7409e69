//! End-to-end distillation runs driven by YAML configuration.
//!
//! Builds small PNG datasets on disk, trains for a couple of epochs and
//! checks the files and scalars a run leaves behind.

use destilar::config::{load_config, test_from_spec, train_from_spec};
use destilar::monitor::{Metric, MetricRecord};
use destilar::train::Verbosity;
use destilar::vision::save_png;
use destilar::Error;
use ndarray::Array3;
use std::path::Path;
use tempfile::TempDir;

const SCALE: usize = 2;

fn write_pair(root: &Path, name: &str, lr_size: usize, seed: usize) {
    let hr = Array3::from_shape_fn((3, lr_size * SCALE, lr_size * SCALE), |(c, y, x)| {
        ((c * 53 + y * 11 + x * 7 + seed * 29) % 256) as f32
    });
    let lr = Array3::from_shape_fn((3, lr_size, lr_size), |(c, y, x)| {
        hr[[c, y * SCALE, x * SCALE]]
    });
    save_png(hr.view(), 255.0, &root.join("HR").join(format!("{name}.png"))).unwrap();
    save_png(
        lr.view(),
        255.0,
        &root
            .join("LR_bicubic")
            .join(format!("X{SCALE}"))
            .join(format!("{name}x{SCALE}.png")),
    )
    .unwrap();
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            write_pair(&dir.path().join("train"), &format!("{i:04}"), 12, i);
        }
        for i in 0..2 {
            write_pair(&dir.path().join("Set5"), &format!("img{i}"), 10, i + 10);
        }
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, extra_training: &str) -> std::path::PathBuf {
        let root = self.path().display();
        let yaml = format!(
            r#"
model:
  name: slim_mixer
  scale: {SCALE}
  n_feats: 8
  stu_width_mult: 0.5
  init_seed: 4

data:
  train: {root}/train
  batch_size: 2
  patch_size: 20
  test:
    - name: Set5
      path: {root}/Set5
      benchmark: true

optimizer:
  name: adam
  lr: 0.001

schedule:
  kind: constant

loss:
  t_lambda: 1.0
  contra_lambda: 0.1
  neg_num: 2
  t_l_remove: 1

training:
  epochs: 2
  print_every: 1
{extra_training}

checkpoint:
  dir: {root}/checkpoints
  model_filename: x2_w050

output:
  root: {root}/output
  log_root: {root}/log
"#
        );
        let path = self.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }
}

fn read_scalars(path: &Path) -> Vec<MetricRecord> {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_training_run_writes_checkpoint_scalars_and_snapshots() {
    let ws = Workspace::new();
    let spec = load_config(ws.config("")).unwrap();

    let summary = train_from_spec(&spec, Verbosity::Quiet).unwrap();
    assert_eq!(summary.epochs.len(), 2);
    assert_eq!(summary.global_step, 4);
    assert!(summary.epochs.iter().all(|e| e.batches == 2));
    assert_eq!(summary.best_epoch.map(|e| e <= 1), Some(true));
    assert!(summary.epochs[0].checkpoint_saved);

    // teacher term switched off from epoch 1
    assert_eq!(summary.epochs[0].t_lambda, 1.0);
    assert_eq!(summary.epochs[1].t_lambda, 0.0);

    assert!(ws.path().join("checkpoints/x2_w050.safetensors").is_file());
    let out = ws.path().join("output/slim_mixer/x2_w050");
    // snapshots are named by the zero-based batch index within the epoch
    for kind in ["hr", "t_sr", "s_sr"] {
        assert!(out.join(format!("result_0_x2_{kind}.png")).is_file());
        assert!(out.join(format!("result_1_x2_{kind}.png")).is_file());
    }

    let records = read_scalars(&ws.path().join("log/x2_w050/scalars.json"));
    let count = |metric: Metric| records.iter().filter(|r| r.metric == metric).count();
    assert_eq!(count(Metric::TotalLoss), 4);
    assert_eq!(count(Metric::L1Loss), 4);
    assert_eq!(count(Metric::ContrastLoss), 4);
    assert_eq!(count(Metric::TeacherL1Loss), 4);
    assert_eq!(count(Metric::AdLoss), 0);
    assert_eq!(count(Metric::LearningRate), 2);
    assert_eq!(count(Metric::TestPsnr), 2);

    let steps: Vec<u64> = records
        .iter()
        .filter(|r| r.metric == Metric::L1Loss)
        .map(|r| r.step)
        .collect();
    assert_eq!(steps, vec![1, 2, 3, 4]);
    assert!(records
        .iter()
        .filter(|r| r.metric == Metric::TestPsnr)
        .all(|r| r.tags.get("dataset").map(String::as_str) == Some("Set5")));
}

#[test]
fn test_adversarial_and_perceptual_terms_are_trained() {
    let ws = Workspace::new();
    let mut spec = load_config(ws.config("")).unwrap();
    spec.loss.ad_lambda = 0.01;
    spec.loss.percep_lambda = 0.1;
    spec.loss.gan_k = 2;
    spec.loss.gan_lr = 0.05;
    spec.training.epochs = 1;

    let summary = train_from_spec(&spec, Verbosity::Quiet).unwrap();
    assert_eq!(summary.global_step, 2);
    assert!(summary.epochs[0].eval.score.is_finite());

    let records = read_scalars(&ws.path().join("log/x2_w050/scalars.json"));
    let values = |metric: Metric| -> Vec<f64> {
        records.iter().filter(|r| r.metric == metric).map(|r| r.value).collect()
    };
    let ad = values(Metric::AdLoss);
    let percep = values(Metric::PercepLoss);
    assert_eq!(ad.len(), 2);
    assert_eq!(percep.len(), 2);
    assert!(ad.iter().chain(&percep).all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_second_run_resumes_after_last_epoch() {
    let ws = Workspace::new();
    let spec = load_config(ws.config("")).unwrap();
    let first = train_from_spec(&spec, Verbosity::Quiet).unwrap();

    let mut longer = spec.clone();
    longer.training.epochs = 3;
    let second = train_from_spec(&longer, Verbosity::Quiet).unwrap();

    // only epochs after the checkpointed one are run
    let best = first.best_epoch.unwrap();
    let resumed: Vec<usize> = second.epochs.iter().map(|e| e.epoch).collect();
    assert_eq!(resumed, ((best + 1)..3).collect::<Vec<_>>());
    assert!(second.best_score >= first.best_score);
}

#[test]
fn test_evaluation_matches_saved_best() {
    let ws = Workspace::new();
    let spec = load_config(ws.config("  save_results: true")).unwrap();
    let summary = train_from_spec(&spec, Verbosity::Quiet).unwrap();

    let report = test_from_spec(&spec, Verbosity::Quiet).unwrap();
    assert_eq!(report.datasets.len(), 1);
    assert_eq!(report.datasets[0].name, "Set5");
    assert!((report.score - summary.best_score).abs() < 1e-4);

    let out = ws.path().join("output/slim_mixer/x2_w050");
    assert!(out.join("img0_x2_w0.5_SR.png").is_file());
    assert!(out.join("img1_x2_w0.5_SR.png").is_file());
}

#[test]
fn test_evaluation_without_checkpoint_fails() {
    let ws = Workspace::new();
    let spec = load_config(ws.config("")).unwrap();
    let result = test_from_spec(&spec, Verbosity::Quiet);
    assert!(matches!(result, Err(Error::NoCheckpointAvailable { .. })));
}

#[test]
fn test_missing_test_dataset_rejected_at_load() {
    let ws = Workspace::new();
    let path = ws.config("");
    std::fs::remove_dir_all(ws.path().join("Set5")).unwrap();
    assert!(matches!(load_config(path), Err(Error::ConfigError(_))));
}
