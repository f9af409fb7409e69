//! Backward operation trait and graph traversal

use super::Tensor;
use ndarray::Array1;
use std::collections::HashSet;

/// Trait for backward pass operations
///
/// An operation only moves the gradient of its own output into its direct
/// inputs; [`backward`] decides the order, so a tensor consumed by several
/// operations is propagated once, after all of its consumers.
pub trait BackwardOp {
    /// Push the output gradient into the inputs' gradient cells
    fn backward(&self);

    /// Tensors this operation reads from
    fn inputs(&self) -> Vec<Tensor>;
}

/// Perform the backward pass from `tensor`
///
/// Seeds the output gradient (ones when `grad_output` is `None`) and runs
/// every reachable backward operation in reverse topological order.
pub fn backward(tensor: &Tensor, grad_output: Option<Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    topo_visit(tensor, &mut visited, &mut order);

    for node in order.iter().rev() {
        if let Some(op) = node.backward_op() {
            op.backward();
        }
    }
}

fn topo_visit(tensor: &Tensor, visited: &mut HashSet<usize>, order: &mut Vec<Tensor>) {
    if !visited.insert(tensor.id()) {
        return;
    }
    if let Some(op) = tensor.backward_op() {
        for input in op.inputs() {
            topo_visit(&input, visited, order);
        }
    }
    order.push(tensor.clone());
}
