//! Checkpoint saving

use super::checkpoint::{keys, Checkpoint, CHECKPOINT_FORMAT, MODEL_PREFIX, OPTIMIZER_PREFIX};
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Save a checkpoint as safetensors
///
/// The file is written next to `path` under a temporary name and renamed
/// into place, so readers see either the old or the new checkpoint. The
/// parent directory is created if needed.
///
/// # Example
///
/// ```no_run
/// use destilar::io::{save_checkpoint, Checkpoint};
/// use destilar::model::{SlimMixer, SlimNetwork};
/// use destilar::train::TrainingState;
///
/// let net = SlimMixer::new(3, 16, 2, 0).unwrap();
/// let ckpt = Checkpoint::new(TrainingState::default(), net.state_dict(), None);
/// save_checkpoint(&ckpt, "checkpoint/run.safetensors").unwrap();
/// ```
pub fn save_checkpoint(checkpoint: &Checkpoint, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let bytes = serialize_checkpoint(checkpoint)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

/// Encode a checkpoint into safetensors bytes
pub fn serialize_checkpoint(checkpoint: &Checkpoint) -> Result<Vec<u8>> {
    // Collect tensor data with proper lifetime management
    let mut tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = checkpoint
        .model
        .iter()
        .map(|(name, tensor)| {
            let values = tensor.data().to_vec();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            (format!("{MODEL_PREFIX}{name}"), bytes, tensor.shape().to_vec())
        })
        .collect();

    let mut metadata = HashMap::new();
    metadata.insert(keys::FORMAT.to_string(), CHECKPOINT_FORMAT.to_string());
    if let Some(epoch) = checkpoint.state.epoch {
        metadata.insert(keys::EPOCH.to_string(), epoch.to_string());
    }
    metadata.insert(
        keys::BEST_SCORE.to_string(),
        checkpoint.state.best_score.to_string(),
    );
    if let Some(best) = checkpoint.state.best_epoch {
        metadata.insert(keys::BEST_EPOCH.to_string(), best.to_string());
    }
    metadata.insert(
        keys::GLOBAL_STEP.to_string(),
        checkpoint.state.global_step.to_string(),
    );

    if let Some(opt) = &checkpoint.optimizer {
        metadata.insert(keys::OPTIMIZER_KIND.to_string(), opt.kind.clone());
        metadata.insert(keys::OPTIMIZER_STEP.to_string(), opt.step.to_string());
        metadata.insert(keys::OPTIMIZER_LR.to_string(), opt.lr.to_string());
        for (key, buf) in &opt.buffers {
            let values = buf.to_vec();
            let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
            tensor_data.push((format!("{OPTIMIZER_PREFIX}{key}"), bytes, vec![buf.len()]));
        }
    }

    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("tensor {name}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    safetensors::serialize(views, Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))
}
