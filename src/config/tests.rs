//! Integration tests for config module

use super::*;
use crate::distill::{Distance, TermKind};
use crate::optim::LrSchedule;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_end_to_end_config_loading() {
    let yaml = r#"
model:
  name: slim_mixer
  scale: 4
  n_feats: 32
  stu_width_mult: 0.5

data:
  train: ./DIV2K
  batch_size: 8
  patch_size: 96
  test:
    - name: Set5
      path: ./benchmark/Set5
      benchmark: true
    - name: Urban100
      path: ./benchmark/Urban100
      benchmark: true

optimizer:
  name: adam
  lr: 0.0002
  beta1: 0.9
  beta2: 0.99

schedule:
  kind: cosine
  min_lr: 0.000001

loss:
  t_lambda: 1.0
  contra_lambda: 0.5
  neg_num: 6
  t_l_remove: 100
  d_func: l2

training:
  epochs: 20
  evaluate_all_datasets: true

checkpoint:
  dir: ./ckpt
  model_filename: x4_w050
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let spec = train::load_config(temp_file.path()).unwrap();
    assert_eq!(spec.data.test.len(), 2);
    assert_eq!(spec.schedule, LrSchedule::Cosine { min_lr: 1e-6 });

    let composer = build_composer(&spec);
    let kinds: Vec<TermKind> = composer.terms().iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TermKind::Reconstruction, TermKind::Contrastive, TermKind::Teacher]
    );
    assert_eq!(spec.loss.d_func, Distance::L2);

    let layout = build_layout(&spec);
    assert!(layout.checkpoint().ends_with("x4_w050.safetensors"));

    let settings = build_settings(&spec, crate::train::Verbosity::Quiet);
    assert_eq!(settings.epochs, 20);
    assert_eq!(settings.stu_width_mult, 0.5);
}

#[test]
fn test_minimal_config_defaults() {
    let yaml = r#"
model:
  scale: 2

data:
  train: ./DIV2K
  batch_size: 16
  test:
    - name: Set5
      path: ./Set5

optimizer:
  name: sgd
  lr: 0.01
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let spec = train::load_config(temp_file.path()).unwrap();
    assert_eq!(spec.training.epochs, 300);
    assert_eq!(spec.loss.neg_num, 0);
    assert!(!spec.data.test[0].benchmark);
    assert!(!build_composer(&spec).is_enabled(TermKind::Contrastive));
}

#[test]
fn test_overrides_then_validation() {
    let yaml = r#"
model:
  scale: 2

data:
  train: ./DIV2K
  batch_size: 4
  test:
    - name: Set5
      path: ./Set5

optimizer:
  name: adam
  lr: 0.0001

loss:
  neg_num: 4
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let mut spec = train::read_config(temp_file.path()).unwrap();
    assert!(validate_config(&spec).is_ok());

    let args = TrainArgs {
        config: temp_file.path().to_path_buf(),
        epochs: Some(3),
        batch_size: Some(2),
        lr: None,
        seed: Some(11),
        dry_run: false,
    };
    apply_overrides(&mut spec, &args);
    assert_eq!(spec.training.epochs, 3);
    assert_eq!(spec.training.seed, 11);
    assert_eq!(spec.optimizer.lr, 0.0001);

    // four negatives no longer fit a batch of two
    assert!(matches!(
        validate_config(&spec),
        Err(ValidationError::TooManyNegatives { .. })
    ));
}

#[test]
fn test_test_overrides_only_enable() {
    let yaml = r#"
model:
  scale: 2

data:
  train: ./DIV2K
  batch_size: 4
  test:
    - name: Set5
      path: ./Set5

optimizer:
  name: adam
  lr: 0.0001

training:
  save_results: true
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();
    let mut spec = train::load_config(temp_file.path()).unwrap();

    let args = TestArgs {
        config: temp_file.path().to_path_buf(),
        width_mult: Some(0.75),
        self_ensemble: true,
        save_results: false,
        all_datasets: false,
    };
    apply_test_overrides(&mut spec, &args);
    assert_eq!(spec.model.stu_width_mult, 0.75);
    assert!(spec.training.self_ensemble);
    assert!(spec.training.save_results);
    assert!(!spec.training.evaluate_all_datasets);
}
