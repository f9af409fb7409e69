//! Checkpoint record

use crate::model::StateDict;
use crate::optim::OptimizerState;
use crate::train::TrainingState;

/// Value of the `format` metadata entry
pub const CHECKPOINT_FORMAT: &str = "destilar-checkpoint";

/// Tensor name prefix for model parameters
pub const MODEL_PREFIX: &str = "model.";

/// Tensor name prefix for optimizer buffers
pub const OPTIMIZER_PREFIX: &str = "optimizer.";

pub(crate) mod keys {
    pub const FORMAT: &str = "format";
    pub const EPOCH: &str = "epoch";
    pub const BEST_SCORE: &str = "best_score";
    pub const BEST_EPOCH: &str = "best_epoch";
    pub const GLOBAL_STEP: &str = "global_step";
    pub const OPTIMIZER_KIND: &str = "optimizer.kind";
    pub const OPTIMIZER_STEP: &str = "optimizer.step";
    pub const OPTIMIZER_LR: &str = "optimizer.lr";
}

/// Everything needed to resume a run
///
/// Stored as one safetensors file: parameters under `model.*`, optimizer
/// buffers under `optimizer.*`, scalars in the header metadata.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// Epoch, best score and step counter
    pub state: TrainingState,
    /// Model parameters
    pub model: StateDict,
    /// Optimizer buffers, if an optimizer has stepped
    pub optimizer: Option<OptimizerState>,
}

impl Checkpoint {
    /// Bundle a snapshot
    pub fn new(state: TrainingState, model: StateDict, optimizer: Option<OptimizerState>) -> Self {
        Self {
            state,
            model,
            optimizer,
        }
    }
}
