//! Teacher/student facade over one shared network

use super::{LoadReport, SlimNetwork};
use crate::io::{load_checkpoint, load_weights, save_checkpoint, Checkpoint};
use crate::optim::OptimizerState;
use crate::train::TrainingState;
use crate::{Error, Result, Tensor};
use std::path::Path;

/// What [`SlimModel::load`] restored
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// A student checkpoint was found: weights and bookkeeping restored
    Resumed {
        state: TrainingState,
        optimizer: Option<OptimizerState>,
        report: LoadReport,
    },
    /// Only teacher weights were found; training starts fresh from them
    TeacherBaseline { report: LoadReport },
}

/// One network, two capacities
///
/// `forward_full` is the teacher pass and `forward_scaled` the student pass.
/// Both read the same parameters, so the teacher output costs no extra
/// weights and the student's gradients train the shared slice.
pub struct SlimModel<N> {
    network: N,
}

impl<N: SlimNetwork> SlimModel<N> {
    /// Wrap a network
    pub fn new(network: N) -> Self {
        Self { network }
    }

    /// Full-width (teacher) forward pass
    pub fn forward_full(&self, lr: &Tensor) -> Result<Tensor> {
        self.network.forward(lr, 1.0)
    }

    /// Reduced-width (student) forward pass
    pub fn forward_scaled(&self, lr: &Tensor, width_mult: f32) -> Result<Tensor> {
        if !(width_mult > 0.0 && width_mult <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "width multiplier must be in (0, 1], got {width_mult}"
            )));
        }
        self.network.forward(lr, width_mult)
    }

    /// Restore from a student checkpoint, else from teacher weights
    ///
    /// Fails with [`Error::NoCheckpointAvailable`] when neither file exists;
    /// the network then keeps its initial weights.
    pub fn load(&mut self, checkpoint: &Path, teacher: Option<&Path>) -> Result<LoadOutcome> {
        if checkpoint.is_file() {
            let ckpt = load_checkpoint(checkpoint)?;
            let report = self.network.load_state_dict(&ckpt.model)?;
            return Ok(LoadOutcome::Resumed {
                state: ckpt.state,
                optimizer: ckpt.optimizer,
                report,
            });
        }

        match teacher {
            Some(path) if path.is_file() => {
                let weights = load_weights(path)?;
                let report = self.network.load_state_dict(&weights)?;
                Ok(LoadOutcome::TeacherBaseline { report })
            }
            _ => Err(Error::NoCheckpointAvailable {
                checkpoint: checkpoint.to_path_buf(),
                teacher: teacher.map(Path::to_path_buf),
            }),
        }
    }

    /// Persist parameters, optimizer buffers and training state
    pub fn save(
        &self,
        path: &Path,
        state: &TrainingState,
        optimizer: Option<OptimizerState>,
    ) -> Result<()> {
        let ckpt = Checkpoint::new(state.clone(), self.network.state_dict(), optimizer);
        save_checkpoint(&ckpt, path)
    }

    /// Upscale factor of the wrapped network
    pub fn scale(&self) -> usize {
        self.network.scale()
    }

    /// Borrow the network
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Mutably borrow the network
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Trainable parameters, for optimizer steps
    pub fn parameters_mut(&mut self) -> &mut [Tensor] {
        self.network.parameters_mut()
    }

    /// Clear accumulated gradients
    pub fn zero_grad(&self) {
        for param in self.network.parameters() {
            param.zero_grad();
        }
    }
}
