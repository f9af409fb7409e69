//! Shared-weight teacher/student models

mod facade;
mod mixer;
mod network;

pub use facade::{LoadOutcome, SlimModel};
pub use mixer::SlimMixer;
pub use network::{LoadReport, SlimNetwork, StateDict};
