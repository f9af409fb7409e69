//! Pixel reconstruction losses

use crate::autograd::{is_grad_enabled, BackwardOp, GradCell};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Trait for loss functions
pub trait LossFn {
    /// Compute a scalar loss, recording the backward pass when tracking
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor>;

    /// Name of the loss function
    fn name(&self) -> &str;
}

fn check_shapes(name: &str, predictions: &Tensor, targets: &Tensor) -> Result<()> {
    if predictions.shape() != targets.shape() {
        return Err(Error::Loss {
            term: name.to_string(),
            reason: format!(
                "shape {:?} does not match {:?}",
                predictions.shape(),
                targets.shape()
            ),
        });
    }
    if predictions.is_empty() {
        return Err(Error::Loss {
            term: name.to_string(),
            reason: "empty input".to_string(),
        });
    }
    Ok(())
}

/// Mean Absolute Error Loss
///
/// L = mean(|predictions - targets|)
///
/// # Example
///
/// ```
/// use destilar::distill::{L1Loss, LossFn};
/// use destilar::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 2.0], false);
///
/// let loss = L1Loss.forward(&pred, &target).unwrap();
/// assert!((loss.item() - 2.0 / 3.0).abs() < 1e-6);
/// ```
pub struct L1Loss;

impl LossFn for L1Loss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        check_shapes(self.name(), predictions, targets)?;

        let diff = predictions.data() - targets.data();
        let n = diff.len() as f32;
        let l1 = diff.mapv(f32::abs).sum() / n;

        // d|x|/dx = sign(x), with 0 at the kink
        let local = diff.mapv(|d| if d > 0.0 { 1.0 / n } else if d < 0.0 { -1.0 / n } else { 0.0 });
        Ok(difference_loss(l1, local, predictions, targets))
    }

    fn name(&self) -> &str {
        "L1"
    }
}

/// Mean Squared Error Loss
///
/// L = mean((predictions - targets)²)
pub struct MSELoss;

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        check_shapes(self.name(), predictions, targets)?;

        let diff = predictions.data() - targets.data();
        let n = diff.len() as f32;
        let mse = diff.mapv(|d| d * d).sum() / n;

        // d(MSE)/d(pred) = 2 * (pred - target) / n
        let local = &diff * (2.0 / n);
        Ok(difference_loss(mse, local, predictions, targets))
    }

    fn name(&self) -> &str {
        "MSE"
    }
}

/// Scalar loss of `predictions - targets` whose gradient w.r.t. predictions
/// is `local` (and its negation w.r.t. targets)
fn difference_loss(
    value: f32,
    local: Array1<f32>,
    predictions: &Tensor,
    targets: &Tensor,
) -> Tensor {
    let requires_grad =
        is_grad_enabled() && (predictions.requires_grad() || targets.requires_grad());
    let mut loss = Tensor::scalar(value, requires_grad);

    if requires_grad {
        loss.set_backward_op(Rc::new(DifferenceLossBackward {
            predictions: predictions.clone(),
            targets: targets.clone(),
            local,
            result_grad: loss.grad_cell(),
        }));
    }

    loss
}

struct DifferenceLossBackward {
    predictions: Tensor,
    targets: Tensor,
    local: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for DifferenceLossBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let upstream = grad.first().copied().unwrap_or(0.0);
            if self.predictions.requires_grad() {
                self.predictions.accumulate_grad(&self.local * upstream);
            }
            if self.targets.requires_grad() {
                self.targets.accumulate_grad(&self.local * (-upstream));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.predictions.clone(), self.targets.clone()]
    }
}
