//! Autograd operations with backward passes

use super::{is_grad_enabled, BackwardOp, GradCell, Tensor};
use ndarray::Array1;
use std::rc::Rc;

fn tracks(inputs: &[&Tensor]) -> bool {
    is_grad_enabled() && inputs.iter().any(|t| t.requires_grad())
}

/// Add two tensors of equal length
///
/// # Panics
///
/// Panics if the lengths differ.
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "add: tensors must have same length");
    let requires_grad = tracks(&[a, b]);
    let mut result = Tensor::new(a.data() + b.data(), requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let requires_grad = tracks(&[a]);
    let mut result = Tensor::new(a.data() * factor, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * factor
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sum all elements into a scalar
pub fn sum(a: &Tensor) -> Tensor {
    let requires_grad = tracks(&[a]);
    let mut result = Tensor::scalar(a.data().sum(), requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let upstream = grad.first().copied().unwrap_or(0.0);
                self.a
                    .accumulate_grad(Array1::from_elem(self.a.len(), upstream));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Weighted sum of scalar terms: `Σ wᵢ · tᵢ`
///
/// Terms with weight exactly 1 are added without a scaling node.
pub fn weighted_sum(terms: &[(&Tensor, f32)]) -> Option<Tensor> {
    terms
        .iter()
        .map(|(t, w)| if *w == 1.0 { (*t).clone() } else { scale(t, *w) })
        .reduce(|acc, t| add(&acc, &t))
}

/// Ratio of two scalars: `a / (b + eps)`
pub fn ratio(a: &Tensor, b: &Tensor, eps: f32) -> Tensor {
    let denom = b.item() + eps;
    let requires_grad = tracks(&[a, b]);
    let mut result = Tensor::scalar(a.item() / denom, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(RatioBackward {
            a: a.clone(),
            b: b.clone(),
            denom,
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct RatioBackward {
    a: Tensor,
    b: Tensor,
    denom: f32,
    result_grad: GradCell,
}

impl BackwardOp for RatioBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let upstream = grad.first().copied().unwrap_or(0.0);
            if self.a.requires_grad() {
                self.a
                    .accumulate_grad(Array1::from_elem(1, upstream / self.denom));
            }
            if self.b.requires_grad() {
                // ∂(a/d)/∂b = -a/d²
                let g = -upstream * self.a.item() / (self.denom * self.denom);
                self.b.accumulate_grad(Array1::from_elem(1, g));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scalar function of `input` whose gradient was computed with the value
///
/// Backward adds `upstream · local` to `input`. Used by losses that are
/// cheaper to differentiate by hand than to build from primitive ops.
pub fn scalar_with_grad(value: f32, input: &Tensor, local: Array1<f32>) -> Tensor {
    assert_eq!(
        local.len(),
        input.len(),
        "scalar_with_grad: gradient must match input length"
    );
    let requires_grad = tracks(&[input]);
    let mut result = Tensor::scalar(value, requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(ScalarWithGradBackward {
            input: input.clone(),
            local,
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct ScalarWithGradBackward {
    input: Tensor,
    local: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for ScalarWithGradBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let upstream = grad.first().copied().unwrap_or(0.0);
            self.input.accumulate_grad(&self.local * upstream);
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}
