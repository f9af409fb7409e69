//! Learning rate schedules
//!
//! A schedule is a pure function of `(epoch, total_epochs, initial_lr)`;
//! the training loop evaluates it at the start of every epoch.

use super::Optimizer;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Epoch-level learning rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LrSchedule {
    /// Keep the initial rate
    Constant,

    /// Cosine annealing from the initial rate down to `min_lr`
    ///
    /// lr_e = min + 0.5 · (init - min) · (1 + cos(π · e / E))
    Cosine {
        #[serde(default)]
        min_lr: f32,
    },

    /// Multiply by `gamma` every `step_size` epochs
    Step { step_size: usize, gamma: f32 },
}

impl Default for LrSchedule {
    fn default() -> Self {
        LrSchedule::Cosine { min_lr: 0.0 }
    }
}

impl LrSchedule {
    /// Learning rate for `epoch` out of `total_epochs`
    pub fn lr_at(&self, epoch: usize, total_epochs: usize, init_lr: f32) -> f32 {
        match *self {
            LrSchedule::Constant => init_lr,
            LrSchedule::Cosine { min_lr } => {
                if total_epochs == 0 || epoch >= total_epochs {
                    return min_lr;
                }
                let progress = epoch as f32 / total_epochs as f32;
                min_lr + 0.5 * (init_lr - min_lr) * (1.0 + (PI * progress).cos())
            }
            LrSchedule::Step { step_size, gamma } => {
                let decays = epoch.checked_div(step_size).unwrap_or(0);
                init_lr * gamma.powi(decays as i32)
            }
        }
    }

    /// Compute the epoch's rate and install it on the optimizer
    pub fn apply(
        &self,
        optimizer: &mut dyn Optimizer,
        epoch: usize,
        total_epochs: usize,
        init_lr: f32,
    ) -> f32 {
        let lr = self.lr_at(epoch, total_epochs, init_lr);
        optimizer.set_lr(lr);
        lr
    }
}
