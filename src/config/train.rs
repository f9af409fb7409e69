//! Single-command training and testing from YAML configuration

use super::builder::{
    build_composer, build_evaluator, build_layout, build_loader, build_model, build_optimizer,
    build_settings, build_test_loader,
};
use super::schema::DistillSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use crate::model::{SlimMixer, SlimModel};
use crate::monitor::{JsonFileStore, ScalarLog};
use crate::train::{DistillTrainer, EvalReport, StartPoint, TrainSummary, Verbosity};
use std::fs;
use std::path::Path;

/// Train a student from a YAML configuration file
///
/// This is the main entry point for declarative training. It:
/// 1. Loads, parses and validates the YAML config
/// 2. Builds the network, optimizer, loss composer and evaluator
/// 3. Resumes from the checkpoint or teacher weights when present
/// 4. Runs the epoch loop and flushes the scalar log
///
/// # Example
///
/// ```no_run
/// use destilar::config::train_from_yaml;
/// use destilar::train::Verbosity;
///
/// let summary = train_from_yaml("config.yaml", Verbosity::Normal)?;
/// println!("best PSNR {:.3}", summary.best_score);
/// # Ok::<(), destilar::Error>(())
/// ```
pub fn train_from_yaml<P: AsRef<Path>>(
    config_path: P,
    verbosity: Verbosity,
) -> Result<TrainSummary> {
    let spec = load_config(config_path)?;
    train_from_spec(&spec, verbosity)
}

/// Train from an already validated configuration
pub fn train_from_spec(spec: &DistillSpec, verbosity: Verbosity) -> Result<TrainSummary> {
    let mut loader = build_loader(spec)?;
    let mut trainer = build_trainer(spec, verbosity)?;
    trainer.resume(spec.checkpoint.teacher.as_deref())?;

    let store = JsonFileStore::open(trainer.layout().scalars_file())?;
    let mut log = ScalarLog::with_store(Box::new(store));
    let outcome = trainer.train(&mut loader, &mut log);
    log.flush()?;
    outcome
}

/// Evaluate the saved student (or teacher baseline) without training
///
/// Fails with [`Error::NoCheckpointAvailable`] when there is nothing to load.
pub fn test_from_spec(spec: &DistillSpec, verbosity: Verbosity) -> Result<EvalReport> {
    let loader = build_test_loader(spec)?;
    let mut trainer = build_trainer(spec, verbosity)?;
    if trainer.resume(spec.checkpoint.teacher.as_deref())? == StartPoint::Scratch {
        return Err(Error::NoCheckpointAvailable {
            checkpoint: trainer.layout().checkpoint(),
            teacher: spec.checkpoint.teacher.clone(),
        });
    }

    let store = JsonFileStore::open(trainer.layout().scalars_file())?;
    let mut log = ScalarLog::with_store(Box::new(store));
    let outcome = trainer.test(&loader, &mut log);
    log.flush()?;
    outcome
}

fn build_trainer(spec: &DistillSpec, verbosity: Verbosity) -> Result<DistillTrainer<SlimMixer>> {
    let model: SlimModel<SlimMixer> = build_model(spec)?;
    let layout = build_layout(spec);
    let evaluator = build_evaluator(spec, &layout, verbosity);
    DistillTrainer::new(
        model,
        build_optimizer(&spec.optimizer)?,
        build_composer(spec),
        evaluator,
        layout,
        build_settings(spec, verbosity),
    )
}

/// Parse a YAML config file without validating it
///
/// Lets callers apply command-line overrides before [`validate_config`].
pub fn read_config<P: AsRef<Path>>(config_path: P) -> Result<DistillSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}

/// Load and validate a distillation spec from YAML (without running training)
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<DistillSpec> {
    let spec = read_config(config_path)?;
    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
    Ok(spec)
}
