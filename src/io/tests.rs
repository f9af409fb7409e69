//! Tests for checkpoint I/O

use super::*;
use crate::model::StateDict;
use crate::optim::{Adam, Optimizer, OptimizerState};
use crate::train::TrainingState;
use crate::{Error, Tensor};
use ndarray::Array1;
use safetensors::tensor::{Dtype, TensorView};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn sample_model() -> StateDict {
    let mut model = StateDict::new();
    model.insert(
        "head.weight".to_string(),
        Tensor::from_shape_vec(&[2, 3], vec![0.1, -0.2, 0.3, 0.4, 0.5, -0.6], false).unwrap(),
    );
    model.insert("head.bias".to_string(), Tensor::from_vec(vec![1e-7, 3.5], false));
    model
}

fn sample_state() -> TrainingState {
    TrainingState {
        epoch: Some(7),
        best_score: 31.428_57,
        best_epoch: Some(5),
        global_step: 1234,
    }
}

#[test]
fn test_checkpoint_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.safetensors");

    let mut buffers = BTreeMap::new();
    buffers.insert("m.0".to_string(), Array1::from(vec![0.25, -0.5]));
    buffers.insert("v.0".to_string(), Array1::from(vec![1.0, 2.0]));
    let optimizer = OptimizerState {
        kind: "adam".to_string(),
        step: 42,
        lr: 1e-4,
        buffers,
    };

    let ckpt = Checkpoint::new(sample_state(), sample_model(), Some(optimizer.clone()));
    save_checkpoint(&ckpt, &path).unwrap();
    let loaded = load_checkpoint(&path).unwrap();

    assert_eq!(loaded.state, sample_state());
    assert_eq!(loaded.optimizer, Some(optimizer));
    assert_eq!(loaded.model.len(), 2);
    for (name, tensor) in sample_model() {
        let restored = &loaded.model[&name];
        assert_eq!(restored.shape(), tensor.shape());
        assert_eq!(restored.data(), tensor.data());
    }
}

#[test]
fn test_fresh_state_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.safetensors");

    let ckpt = Checkpoint::new(TrainingState::default(), sample_model(), None);
    save_checkpoint(&ckpt, &path).unwrap();
    let loaded = load_checkpoint(&path).unwrap();

    assert_eq!(loaded.state, TrainingState::default());
    assert!(loaded.optimizer.is_none());
}

#[test]
fn test_save_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/deeper/run.safetensors");

    save_checkpoint(&Checkpoint::new(sample_state(), sample_model(), None), &path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_save_overwrites_previous_checkpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.safetensors");

    save_checkpoint(&Checkpoint::new(sample_state(), sample_model(), None), &path).unwrap();
    let mut newer = sample_state();
    newer.best_score = 32.0;
    save_checkpoint(&Checkpoint::new(newer, sample_model(), None), &path).unwrap();

    assert_eq!(load_checkpoint(&path).unwrap().state.best_score, 32.0);
    // only the checkpoint itself remains, no temporary files
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_optimizer_state_survives_checkpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opt.safetensors");

    let mut params = vec![Tensor::from_vec(vec![1.0, -1.0], true)];
    let mut adam = Adam::default_params(0.01);
    params[0].set_grad(Array1::from(vec![0.5, 0.5]));
    adam.step(&mut params);

    save_checkpoint(&Checkpoint::new(sample_state(), sample_model(), Some(adam.state())), &path)
        .unwrap();
    let restored = load_checkpoint(&path).unwrap().optimizer.unwrap();

    let mut resumed = Adam::default_params(0.01);
    resumed.load_state(&restored).unwrap();
    assert_eq!(resumed.state(), adam.state());
}

#[test]
fn test_load_weights_strips_prefix_and_optimizer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.safetensors");

    let mut buffers = BTreeMap::new();
    buffers.insert("velocity.0".to_string(), Array1::from(vec![1.0]));
    let optimizer = OptimizerState {
        kind: "sgd".to_string(),
        step: 1,
        lr: 0.1,
        buffers,
    };
    save_checkpoint(&Checkpoint::new(sample_state(), sample_model(), Some(optimizer)), &path)
        .unwrap();

    let weights = load_weights(&path).unwrap();
    let names: Vec<&str> = weights.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["head.bias", "head.weight"]);
}

#[test]
fn test_load_weights_accepts_bare_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("teacher.safetensors");

    let values: Vec<f32> = vec![1.0, 2.0, 3.0];
    let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
    let view = TensorView::new(Dtype::F32, vec![3], &bytes).unwrap();
    let encoded = safetensors::serialize(vec![("tail.bias", view)], None).unwrap();
    std::fs::write(&path, encoded).unwrap();

    let weights = load_weights(&path).unwrap();
    assert_eq!(weights["tail.bias"].data().to_vec(), values);
}

#[test]
fn test_load_checkpoint_rejects_plain_weights() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("teacher.safetensors");

    let bytes: Vec<u8> = bytemuck::cast_slice(&[1.0f32]).to_vec();
    let view = TensorView::new(Dtype::F32, vec![1], &bytes).unwrap();
    std::fs::write(&path, safetensors::serialize(vec![("w", view)], None).unwrap()).unwrap();

    assert!(matches!(load_checkpoint(&path), Err(Error::Serialization(_))));
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = load_checkpoint(dir.path().join("absent.safetensors"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_load_garbage_is_serialization_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.safetensors");
    std::fs::write(&path, b"not a checkpoint").unwrap();
    assert!(matches!(load_weights(&path), Err(Error::Serialization(_))));
}
