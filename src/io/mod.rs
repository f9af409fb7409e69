//! Checkpoint I/O
//!
//! A checkpoint is a single safetensors file holding model parameters,
//! optimizer buffers and the training bookkeeping (epoch, best score,
//! best epoch, global step) as header metadata.

mod checkpoint;
mod load;
mod save;

#[cfg(test)]
mod tests;

pub use checkpoint::{Checkpoint, CHECKPOINT_FORMAT, MODEL_PREFIX, OPTIMIZER_PREFIX};
pub use load::{load_checkpoint, load_weights};
pub use save::{save_checkpoint, serialize_checkpoint};
