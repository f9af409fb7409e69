//! # Destilar: Slim-Network Distillation for Super-Resolution
//!
//! Destilar trains the reduced-width pass of a width-slimmable
//! super-resolution network against its own full-width pass. One set of
//! weights serves both: the full-width output is the teacher, the
//! reduced-width output the student.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation
//! - **optim**: Optimizers (SGD, Adam) and learning-rate schedules
//! - **vision**: Flips/transposes, self-ensemble, bicubic resampling, PNG I/O
//! - **quality**: PSNR, SSIM and no-reference metrics
//! - **model**: Slimmable network trait, teacher/student facade, reference network
//! - **io**: Checkpoint persistence (safetensors)
//! - **distill**: Loss terms and the per-step loss composer
//! - **data**: Batches, test sets and loaders
//! - **train**: Epoch driver, evaluator, output layout
//! - **monitor**: Scalar sinks and metric stores
//! - **config**: Declarative YAML configuration and CLI

pub mod autograd;
pub mod config;
pub mod data;
pub mod distill;
pub mod io;
pub mod model;
pub mod monitor;
pub mod optim;
pub mod quality;
pub mod train;
pub mod vision;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
