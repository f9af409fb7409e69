//! Geometric transforms and test-time self-ensembling

use crate::{Error, Result};
use ndarray::{Array4, Axis};

/// Self-inverse geometric transform on an `[N, C, H, W]` batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Mirror left-right (`v`)
    FlipW,
    /// Mirror top-bottom (`h`)
    FlipH,
    /// Swap height and width (`t`)
    Transpose,
}

impl Transform {
    /// Apply the transform, returning a standard-layout array
    pub fn apply(self, x: &Array4<f32>) -> Array4<f32> {
        match self {
            Transform::FlipW => flipped(x, Axis(3)),
            Transform::FlipH => flipped(x, Axis(2)),
            Transform::Transpose => x
                .view()
                .permuted_axes([0, 1, 3, 2])
                .as_standard_layout()
                .into_owned(),
        }
    }

    /// One-letter code (`v`, `h`, `t`)
    pub fn code(self) -> char {
        match self {
            Transform::FlipW => 'v',
            Transform::FlipH => 'h',
            Transform::Transpose => 't',
        }
    }
}

fn flipped(x: &Array4<f32>, axis: Axis) -> Array4<f32> {
    let mut view = x.view();
    view.invert_axis(axis);
    view.as_standard_layout().into_owned()
}

/// The eight flip/transpose variants, as forward transform chains
///
/// Order matches iterative expansion: start from the identity, then for each
/// of `v`, `h`, `t` append the transformed copy of every variant so far.
/// Undoing a variant applies its chain in reverse.
pub const ENSEMBLE_VARIANTS: [&[Transform]; 8] = [
    &[],
    &[Transform::FlipW],
    &[Transform::FlipH],
    &[Transform::FlipW, Transform::FlipH],
    &[Transform::Transpose],
    &[Transform::FlipW, Transform::Transpose],
    &[Transform::FlipH, Transform::Transpose],
    &[Transform::FlipW, Transform::FlipH, Transform::Transpose],
];

/// Apply a chain of transforms in order
pub fn apply_chain(x: &Array4<f32>, chain: &[Transform]) -> Array4<f32> {
    chain.iter().fold(x.clone(), |acc, t| t.apply(&acc))
}

/// Undo a chain of transforms
pub fn undo_chain(x: &Array4<f32>, chain: &[Transform]) -> Array4<f32> {
    chain.iter().rev().fold(x.clone(), |acc, t| t.apply(&acc))
}

/// Run `forward` on all eight variants and average the re-aligned outputs
///
/// Each output is mapped back to the original orientation before the
/// pixel-wise mean, so a flip/transpose-equivariant `forward` yields its
/// plain single-pass output.
pub fn self_ensemble<F>(input: &Array4<f32>, mut forward: F) -> Result<Array4<f32>>
where
    F: FnMut(&Array4<f32>) -> Result<Array4<f32>>,
{
    let mut sum: Option<Array4<f32>> = None;

    for chain in ENSEMBLE_VARIANTS {
        let output = forward(&apply_chain(input, chain))?;
        let aligned = undo_chain(&output, chain);

        sum = Some(match sum {
            None => aligned,
            Some(acc) => {
                if acc.shape() != aligned.shape() {
                    return Err(Error::ShapeMismatch {
                        expected: acc.shape().to_vec(),
                        got: aligned.shape().to_vec(),
                    });
                }
                acc + &aligned
            }
        });
    }

    let sum = sum.ok_or_else(|| Error::InvalidParameter("empty ensemble".to_string()))?;
    Ok(sum / ENSEMBLE_VARIANTS.len() as f32)
}
