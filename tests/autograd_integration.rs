//! Integration tests for autograd core functionality.
//!
//! Exercises the tape through the public API the loss composer relies on:
//! shared subgraphs, weighted sums, ratios and no-grad evaluation.

use approx::assert_abs_diff_eq;
use destilar::autograd::{add, is_grad_enabled, no_grad, ratio, scale, sum, weighted_sum};
use destilar::{backward, Tensor};
use ndarray::Array4;

#[test]
fn test_tensor_shape_survives_array_roundtrip() {
    let array = Array4::from_shape_fn((1, 3, 2, 4), |(_, c, y, x)| (c * 8 + y * 4 + x) as f32);
    let t = Tensor::from_array4(array.clone(), false);
    assert_eq!(t.shape(), &[1, 3, 2, 4]);
    assert_eq!(t.to_array4().unwrap(), array);
}

#[test]
fn test_from_shape_vec_rejects_wrong_length() {
    assert!(Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0], false).is_err());
}

#[test]
fn test_backward_initializes_grad() {
    let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
    backward(&t, None);

    let grad = t.grad().expect("should have grad after backward");
    assert_eq!(grad.len(), 3);
    for g in grad.iter() {
        assert_abs_diff_eq!(*g, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_shared_input_accumulates() {
    // y = sum(x + x) → dy/dx = 2
    let x = Tensor::from_vec(vec![0.5, -1.0], true);
    let y = sum(&add(&x, &x));
    backward(&y, None);

    let grad = x.grad().unwrap();
    assert_abs_diff_eq!(grad[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(grad[1], 2.0, epsilon = 1e-6);
}

#[test]
fn test_weighted_sum_gradients_follow_weights() {
    let a = Tensor::scalar(3.0, true);
    let b = Tensor::scalar(5.0, true);
    let c = Tensor::scalar(7.0, false);

    let total = weighted_sum(&[(&a, 1.0), (&b, 0.25), (&c, 2.0)]).unwrap();
    assert_abs_diff_eq!(total.item(), 3.0 + 1.25 + 14.0, epsilon = 1e-5);

    backward(&total, None);
    assert_abs_diff_eq!(a.grad().unwrap()[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(b.grad().unwrap()[0], 0.25, epsilon = 1e-6);
    assert!(c.grad().is_none());
}

#[test]
fn test_weighted_sum_of_nothing() {
    assert!(weighted_sum(&[]).is_none());
}

#[test]
fn test_ratio_matches_finite_difference() {
    let eps = 1e-7;
    let a0 = 2.0f32;
    let b0 = 4.0f32;
    let a = Tensor::scalar(a0, true);
    let b = Tensor::scalar(b0, true);

    let r = ratio(&a, &b, eps);
    backward(&r, None);

    let h = 1e-2f32;
    let f = |a: f32, b: f32| a / (b + eps);
    let da = (f(a0 + h, b0) - f(a0 - h, b0)) / (2.0 * h);
    let db = (f(a0, b0 + h) - f(a0, b0 - h)) / (2.0 * h);
    assert_abs_diff_eq!(a.grad().unwrap()[0], da, epsilon = 1e-3);
    assert_abs_diff_eq!(b.grad().unwrap()[0], db, epsilon = 1e-3);
}

#[test]
fn test_chain_through_scale_and_sum() {
    // y = 3 * sum(x) → dy/dx = 3
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
    let y = scale(&sum(&x), 3.0);
    assert_abs_diff_eq!(y.item(), 30.0, epsilon = 1e-5);

    backward(&y, None);
    for g in x.grad().unwrap().iter() {
        assert_abs_diff_eq!(*g, 3.0, epsilon = 1e-6);
    }
}

#[test]
fn test_detached_branch_gets_no_grad() {
    let x = Tensor::from_vec(vec![1.0, 2.0], true);
    let y = sum(&add(&x, &x.detach()));
    backward(&y, None);

    // only the attached branch contributes
    for g in x.grad().unwrap().iter() {
        assert_abs_diff_eq!(*g, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_no_grad_builds_no_graph() {
    let x = Tensor::from_vec(vec![1.0, 2.0], true);
    let y = no_grad(|| {
        assert!(!is_grad_enabled());
        sum(&scale(&x, 2.0))
    });
    assert!(is_grad_enabled());
    assert!(!y.requires_grad());
    assert!(y.backward_op().is_none());
    assert_abs_diff_eq!(y.item(), 6.0, epsilon = 1e-6);
}

#[test]
fn test_zero_grad_clears() {
    let x = Tensor::from_vec(vec![1.0], true);
    backward(&sum(&x), None);
    assert!(x.grad().is_some());
    x.zero_grad();
    assert!(x.grad().is_none());
}
