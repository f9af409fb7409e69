//! Optimizers for training neural networks

mod adam;
mod optimizer;
mod scheduler;
mod sgd;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerState};
pub use scheduler::LrSchedule;
pub use sgd::SGD;
