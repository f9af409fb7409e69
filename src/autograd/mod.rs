//! Tape-based autograd engine
//!
//! Provides reverse-mode automatic differentiation over flat `f32` tensors.
//! The loss aggregator and the super-resolution networks build their graphs
//! from these primitives; [`backward`] walks the graph once in reverse
//! topological order.

mod backward;
mod context;
mod ops;
mod tensor;


pub use backward::{backward, BackwardOp};
pub use context::{is_grad_enabled, no_grad, NoGradGuard};
pub use ops::*;
pub use tensor::{GradCell, Tensor};
