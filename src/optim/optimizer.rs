//! Optimizer trait and persisted optimizer state

use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Snapshot of an optimizer's internal buffers
///
/// Buffers are keyed `"{buffer}.{param_index}"`, e.g. `m.0`, `v.3`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerState {
    /// Optimizer name (`adam`, `sgd`)
    pub kind: String,
    /// Number of steps taken
    pub step: u64,
    /// Learning rate at snapshot time
    pub lr: f32,
    /// Per-parameter buffers
    pub buffers: BTreeMap<String, Array1<f32>>,
}

impl OptimizerState {
    pub(crate) fn collect(
        kind: &str,
        step: u64,
        lr: f32,
        named: &[(&str, &[Option<Array1<f32>>])],
    ) -> Self {
        let mut buffers = BTreeMap::new();
        for (prefix, slots) in named {
            for (i, slot) in slots.iter().enumerate() {
                if let Some(buf) = slot {
                    buffers.insert(format!("{prefix}.{i}"), buf.clone());
                }
            }
        }
        Self {
            kind: kind.to_string(),
            step,
            lr,
            buffers,
        }
    }

    /// Rebuild one positional buffer list (`m`, `v`, ...) from the keyed map
    pub(crate) fn slots(&self, prefix: &str) -> Result<Vec<Option<Array1<f32>>>> {
        let mut slots: Vec<Option<Array1<f32>>> = Vec::new();
        for (key, buf) in &self.buffers {
            let Some((p, idx)) = key.split_once('.') else {
                continue;
            };
            if p != prefix {
                continue;
            }
            let idx: usize = idx
                .parse()
                .map_err(|_| Error::Serialization(format!("bad optimizer buffer key: {key}")))?;
            if slots.len() <= idx {
                slots.resize(idx + 1, None);
            }
            slots[idx] = Some(buf.clone());
        }
        Ok(slots)
    }

    pub(crate) fn expect_kind(&self, kind: &str) -> Result<()> {
        if self.kind != kind {
            return Err(Error::InvalidParameter(format!(
                "optimizer state is for '{}', not '{kind}'",
                self.kind
            )));
        }
        Ok(())
    }
}

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Short name used in checkpoints
    fn name(&self) -> &str;

    /// Export internal buffers
    fn state(&self) -> OptimizerState;

    /// Restore internal buffers from a checkpoint
    fn load_state(&mut self, state: &OptimizerState) -> Result<()>;
}
