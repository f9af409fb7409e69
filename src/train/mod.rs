//! Distillation training loop
//!
//! This module provides:
//! - [`DistillTrainer`]: epoch driver (schedule, steps, evaluation, checkpoint selection)
//! - [`Evaluator`]: inference-only evaluation with optional self-ensemble
//! - [`TrainingState`]: bookkeeping persisted into checkpoints
//! - [`OutputLayout`]: checkpoint, image and log paths
//!
//! # Example
//!
//! ```no_run
//! use destilar::data::InMemoryLoader;
//! use destilar::distill::{LossComposer, LossWeights};
//! use destilar::model::{SlimMixer, SlimModel};
//! use destilar::monitor::ScalarLog;
//! use destilar::optim::Adam;
//! use destilar::train::{DistillTrainer, Evaluator, OutputLayout, TrainerSettings};
//!
//! let model = SlimModel::new(SlimMixer::new(3, 32, 2, 0).unwrap());
//! let weights = LossWeights {
//!     t_lambda: 1.0,
//!     contra_lambda: 0.1,
//!     ad_lambda: 0.0,
//!     percep_lambda: 0.0,
//! };
//! let composer = LossComposer::new(weights, 2, 50, 2);
//! let evaluator = Evaluator::new(2, 255.0).with_self_ensemble(true);
//! let layout = OutputLayout::new("checkpoints", "slim_mixer", "x2");
//!
//! let mut trainer = DistillTrainer::new(
//!     model,
//!     Box::new(Adam::default_params(1e-4)),
//!     composer,
//!     evaluator,
//!     layout,
//!     TrainerSettings::default(),
//! )
//! .unwrap();
//! trainer.resume(None).unwrap();
//!
//! # let mut loader = InMemoryLoader::new(vec![], 4);
//! let summary = trainer.train(&mut loader, &mut ScalarLog::new()).unwrap();
//! println!("best {:.3} @ {:?}", summary.best_score, summary.best_epoch);
//! ```

mod evaluator;
mod layout;
mod state;
mod trainer;


pub use evaluator::{DatasetReport, EvalReport, EvalScope, Evaluator};
pub use layout::{sr_image_name, OutputLayout};
pub use state::TrainingState;
pub use trainer::{DistillTrainer, EpochReport, StartPoint, TrainSummary, TrainerSettings};

/// Console output level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Print `msg` if this level admits messages of level `required`
    pub fn log(self, required: Verbosity, msg: &str) {
        if self != Verbosity::Quiet && (self == required || required == Verbosity::Normal) {
            println!("{msg}");
        }
    }
}
