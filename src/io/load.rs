//! Checkpoint loading

use super::checkpoint::{keys, Checkpoint, CHECKPOINT_FORMAT, MODEL_PREFIX, OPTIMIZER_PREFIX};
use crate::model::StateDict;
use crate::optim::OptimizerState;
use crate::train::TrainingState;
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

/// Load a full checkpoint written by [`save_checkpoint`](super::save_checkpoint)
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let data = std::fs::read(path.as_ref())?;
    let (_, header) = SafeTensors::read_metadata(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;
    let meta = header.metadata().clone().unwrap_or_default();

    if meta.get(keys::FORMAT).map(String::as_str) != Some(CHECKPOINT_FORMAT) {
        return Err(Error::Serialization(format!(
            "{} is not a training checkpoint",
            path.as_ref().display()
        )));
    }

    let state = TrainingState {
        epoch: optional(&meta, keys::EPOCH)?,
        best_score: required(&meta, keys::BEST_SCORE)?,
        best_epoch: optional(&meta, keys::BEST_EPOCH)?,
        global_step: required(&meta, keys::GLOBAL_STEP)?,
    };

    let tensors = read_tensors(&data)?;
    let mut model = StateDict::new();
    let mut buffers = BTreeMap::new();
    for (name, tensor) in tensors {
        if let Some(param) = name.strip_prefix(MODEL_PREFIX) {
            model.insert(param.to_string(), tensor);
        } else if let Some(key) = name.strip_prefix(OPTIMIZER_PREFIX) {
            buffers.insert(key.to_string(), tensor.data().clone());
        }
    }

    let optimizer = match meta.get(keys::OPTIMIZER_KIND) {
        Some(kind) => Some(OptimizerState {
            kind: kind.clone(),
            step: required(&meta, keys::OPTIMIZER_STEP)?,
            lr: required(&meta, keys::OPTIMIZER_LR)?,
            buffers,
        }),
        None => None,
    };

    Ok(Checkpoint {
        state,
        model,
        optimizer,
    })
}

/// Load only model weights, e.g. a teacher baseline
///
/// Accepts both checkpoints (keeping `model.*`, dropping `optimizer.*`) and
/// plain safetensors weight files with bare parameter names.
pub fn load_weights(path: impl AsRef<Path>) -> Result<StateDict> {
    let data = std::fs::read(path.as_ref())?;
    let tensors = read_tensors(&data)?;
    let prefixed = tensors.keys().any(|k| k.starts_with(MODEL_PREFIX));

    Ok(tensors
        .into_iter()
        .filter_map(|(name, tensor)| {
            if name.starts_with(OPTIMIZER_PREFIX) {
                None
            } else if prefixed {
                name.strip_prefix(MODEL_PREFIX)
                    .map(|param| (param.to_string(), tensor))
            } else {
                Some((name, tensor))
            }
        })
        .collect())
}

fn read_tensors(data: &[u8]) -> Result<BTreeMap<String, Tensor>> {
    let safetensors = SafeTensors::deserialize(data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut out = BTreeMap::new();
    for (name, view) in safetensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization(format!(
                "tensor {name} has dtype {:?}, expected F32",
                view.dtype()
            )));
        }
        // file offsets carry no alignment guarantee
        let values: Vec<f32> = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let tensor = if view.shape().is_empty() {
            Tensor::new(Array1::from(values), false)
        } else {
            Tensor::from_shape_vec(view.shape(), values, false)?
        };
        out.insert(name, tensor);
    }
    Ok(out)
}

fn optional<T: FromStr>(meta: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    meta.get(key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| Error::Serialization(format!("bad checkpoint field {key}: {raw}")))
        })
        .transpose()
}

fn required<T: FromStr>(meta: &HashMap<String, String>, key: &str) -> Result<T> {
    optional(meta, key)?
        .ok_or_else(|| Error::Serialization(format!("checkpoint is missing {key}")))
}
