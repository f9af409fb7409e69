//! Stochastic Gradient Descent optimizer

use super::{Optimizer, OptimizerState};
use crate::{Result, Tensor};
use ndarray::Array1;

/// SGD optimizer with optional momentum
pub struct SGD {
    lr: f32,
    momentum: f32,
    steps: u64,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            steps: 0,
            velocities: Vec::new(),
        }
    }

    fn ensure_velocities(&mut self, params: &[Tensor]) {
        if self.velocities.len() < params.len() {
            self.velocities.resize(params.len(), None);
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_velocities(params);
        self.steps += 1;

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                if self.momentum > 0.0 {
                    // v = momentum * v - lr * grad
                    let velocity = if let Some(v) = &self.velocities[i] {
                        v * self.momentum - &grad * self.lr
                    } else {
                        &grad * (-self.lr)
                    };

                    *param.data_mut() += &velocity;
                    self.velocities[i] = Some(velocity);
                } else {
                    *param.data_mut() -= &(&grad * self.lr);
                }
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &str {
        "sgd"
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::collect("sgd", self.steps, self.lr, &[("velocity", &self.velocities)])
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        state.expect_kind("sgd")?;
        self.steps = state.step;
        self.velocities = state.slots("velocity")?;
        Ok(())
    }
}
