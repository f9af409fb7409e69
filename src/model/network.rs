//! Width-slimmable network abstraction

use crate::{Error, Result, Tensor};
use std::collections::BTreeMap;

/// Named parameter snapshot, ordered by name
pub type StateDict = BTreeMap<String, Tensor>;

/// Outcome of a partial state load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters copied from the snapshot
    pub loaded: Vec<String>,
    /// Model parameters the snapshot did not provide
    pub missing: Vec<String>,
    /// Snapshot entries the model does not have
    pub unexpected: Vec<String>,
}

impl LoadReport {
    /// True when every model parameter was restored and nothing was left over
    pub fn is_exact(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loaded {} parameters, {} missing, {} unexpected",
            self.loaded.len(),
            self.missing.len(),
            self.unexpected.len()
        )?;
        for name in &self.missing {
            write!(f, "\n  missing: {name}")?;
        }
        for name in &self.unexpected {
            write!(f, "\n  unexpected: {name}")?;
        }
        Ok(())
    }
}

/// A network whose channel width can be reduced at call time
///
/// One parameter set serves every width: a forward pass at `width_mult < 1`
/// uses a leading slice of each hidden layer, so the full-width (teacher)
/// and reduced-width (student) passes read and train the same weights.
pub trait SlimNetwork {
    /// Run the network at `width_mult ∈ (0, 1]` of its hidden width
    ///
    /// `input` is an `[N, C, H, W]` low-resolution batch; the result is the
    /// `[N, C, H·s, W·s]` super-resolved batch for upscale factor `s`.
    fn forward(&self, input: &Tensor, width_mult: f32) -> Result<Tensor>;

    /// Upscale factor
    fn scale(&self) -> usize;

    /// Parameter names, index-aligned with [`parameters`](Self::parameters)
    fn parameter_names(&self) -> Vec<String>;

    /// Trainable parameters
    fn parameters(&self) -> &[Tensor];

    /// Trainable parameters, for optimizer updates
    fn parameters_mut(&mut self) -> &mut [Tensor];

    /// Detached copy of every parameter
    fn state_dict(&self) -> StateDict {
        self.parameter_names()
            .into_iter()
            .zip(self.parameters())
            .map(|(name, param)| (name, param.detach()))
            .collect()
    }

    /// Copy matching entries from `state` into the parameters
    ///
    /// Missing and unexpected names are reported, not rejected. A name that
    /// matches with a different element count is an error and leaves the
    /// model untouched.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<LoadReport> {
        let names = self.parameter_names();

        for (name, param) in names.iter().zip(self.parameters()) {
            if let Some(src) = state.get(name) {
                if src.len() != param.len() {
                    return Err(Error::ShapeMismatch {
                        expected: param.shape().to_vec(),
                        got: src.shape().to_vec(),
                    });
                }
            }
        }

        let mut report = LoadReport::default();
        for (name, param) in names.iter().zip(self.parameters_mut()) {
            match state.get(name) {
                Some(src) => {
                    param.data_mut().assign(src.data());
                    report.loaded.push(name.clone());
                }
                None => report.missing.push(name.clone()),
            }
        }
        report.unexpected = state
            .keys()
            .filter(|key| !names.contains(key))
            .cloned()
            .collect();
        Ok(report)
    }

    /// Total number of scalar weights
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(Tensor::len).sum()
    }
}
