//! Declarative YAML configuration
//!
//! A whole distillation run is described by one YAML file.
//!
//! # Example
//!
//! ```yaml
//! model:
//!   scale: 4
//!   n_feats: 64
//!   stu_width_mult: 0.25
//!
//! data:
//!   train: ./DIV2K
//!   batch_size: 16
//!   patch_size: 192
//!   test:
//!     - name: Set5
//!       path: ./benchmark/Set5
//!       benchmark: true
//!
//! optimizer:
//!   name: adam
//!   lr: 1e-4
//!
//! loss:
//!   t_lambda: 1.0
//!   contra_lambda: 0.1
//!   neg_num: 8
//!   t_l_remove: 200
//!
//! checkpoint:
//!   dir: ./checkpoints
//!   model_filename: x4_w025
//!   teacher: ./pretrained/x4.safetensors
//! ```

mod builder;
mod cli;
mod schema;
mod train;
mod validate;

#[cfg(test)]
mod tests;


pub use builder::{
    build_composer, build_evaluator, build_layout, build_loader, build_model, build_optimizer,
    build_settings, build_test_loader,
};
pub use cli::{
    apply_overrides, apply_test_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat,
    TestArgs, TrainArgs, ValidateArgs,
};
pub use schema::{
    CheckpointSpec, DataConfig, DistillSpec, LossSpec, ModelSpec, OptimSpec, OutputSpec,
    TestDataSpec, TrainingParams,
};
pub use train::{load_config, read_config, test_from_spec, train_from_spec, train_from_yaml};
pub use validate::{validate_config, ValidationError};
