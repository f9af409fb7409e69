//! Tensor type with gradient tracking

use super::BackwardOp;
use crate::{Error, Result};
use ndarray::{Array1, Array4};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared gradient slot; clones of a tensor point at the same cell.
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Tensor with automatic differentiation support
///
/// Data is stored flat in row-major order next to its logical shape, so
/// image batches keep their `[N, C, H, W]` layout while every operation
/// works on a single contiguous buffer.
#[derive(Clone)]
pub struct Tensor {
    data: Array1<f32>,
    shape: Vec<usize>,
    grad: GradCell,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a 1-D tensor
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        let shape = vec![data.len()];
        Self {
            data,
            shape,
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor with an explicit shape
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>, requires_grad: bool) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape.to_vec();
        Ok(tensor)
    }

    /// Wrap an `[N, C, H, W]` image batch
    pub fn from_array4(array: Array4<f32>, requires_grad: bool) -> Self {
        let shape = array.shape().to_vec();
        let data: Vec<f32> = array.iter().copied().collect();
        let mut tensor = Self::from_vec(data, requires_grad);
        tensor.shape = shape;
        tensor
    }

    /// Single-element tensor
    pub fn scalar(value: f32, requires_grad: bool) -> Self {
        Self::from_vec(vec![value], requires_grad)
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize], requires_grad: bool) -> Self {
        let numel: usize = shape.iter().product();
        let mut tensor = Self::new(Array1::zeros(numel), requires_grad);
        tensor.shape = shape.to_vec();
        tensor
    }

    /// Get reference to data
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Get mutable reference to data
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Copy the data out as an `[N, C, H, W]` array
    pub fn to_array4(&self) -> Result<Array4<f32>> {
        match self.shape.as_slice() {
            &[n, c, h, w] => Array4::from_shape_vec((n, c, h, w), self.data.to_vec()).map_err(
                |_| Error::ShapeMismatch {
                    expected: self.shape.clone(),
                    got: vec![self.data.len()],
                },
            ),
            other => Err(Error::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: other.to_vec(),
            }),
        }
    }

    /// Value of a single-element tensor
    pub fn item(&self) -> f32 {
        self.data.first().copied().unwrap_or(0.0)
    }

    /// Get gradient (if computed)
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Set gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Accumulate gradient (for when tensor is used multiple times)
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut grad_ref = self.grad.borrow_mut();
        if let Some(existing) = grad_ref.as_mut() {
            *existing += &grad;
        } else {
            *grad_ref = Some(grad);
        }
    }

    /// Zero out gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Check if requires gradient
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Get reference to gradient cell (for backward operations)
    pub fn grad_cell(&self) -> GradCell {
        self.grad.clone()
    }

    /// Set backward operation
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    /// Get backward operation
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }

    /// Same values, cut from the graph
    pub fn detach(&self) -> Tensor {
        let mut detached = Tensor::new(self.data.clone(), false);
        detached.shape = self.shape.clone();
        detached
    }

    /// Graph identity; clones of one tensor share it.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.grad) as *const () as usize
    }

    /// Get size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("data", &self.data)
            .field("grad", &self.grad.borrow())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}
