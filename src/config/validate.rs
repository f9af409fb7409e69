//! Configuration validation

use super::schema::DistillSpec;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Test dataset path does not exist: {0}")]
    TestDataNotFound(String),

    #[error("No test datasets configured")]
    NoTestData,

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid scale: {0} (must be > 0)")]
    InvalidScale(usize),

    #[error("Invalid patch size: {patch} (must be a positive multiple of scale {scale})")]
    InvalidPatchSize { patch: usize, scale: usize },

    #[error("Invalid student width multiplier: {0} (must be in (0, 1])")]
    InvalidWidthMult(f32),

    #[error("Invalid hidden width: {0} (must be > 0)")]
    InvalidFeatures(usize),

    #[error("Invalid channel count: {0} (must be 1 or 3)")]
    InvalidColors(usize),

    #[error("Invalid rgb range: {0} (must be > 0.0)")]
    InvalidRgbRange(f32),

    #[error("Too many negatives: {neg_num} (batch size is {batch_size})")]
    TooManyNegatives { neg_num: usize, batch_size: usize },

    #[error("Invalid print interval: {0} (must be > 0)")]
    InvalidPrintEvery(usize),

    #[error("Invalid loss weight {name}: {value} (must be finite and >= 0.0)")]
    InvalidLossWeight { name: &'static str, value: f32 },

    #[error("Invalid optimizer: {0} (must be one of: adam, sgd)")]
    InvalidOptimizer(String),

    #[error("Invalid discriminator settings: gan_k {gan_k}, gan_lr {gan_lr} (both must be > 0)")]
    InvalidGanSettings { gan_k: usize, gan_lr: f32 },

    #[error("Patch size {patch} is below {min}, the smallest the perceptual filters accept")]
    PatchTooSmall { patch: usize, min: usize },
}

/// The edge filters need a 3x3 window
const MIN_PERCEPTUAL_PATCH: usize = 3;

/// Validate a distillation configuration
///
/// Checks:
/// - Test dataset paths exist
/// - Numeric values are in valid ranges
/// - Enums match allowed values
pub fn validate_config(spec: &DistillSpec) -> Result<(), ValidationError> {
    if spec.data.test.is_empty() {
        return Err(ValidationError::NoTestData);
    }

    // Skip in tests where files may not exist
    #[cfg(not(test))]
    for test in &spec.data.test {
        if !test.path.exists() {
            return Err(ValidationError::TestDataNotFound(
                test.path.display().to_string(),
            ));
        }
    }

    let model = &spec.model;
    if model.scale == 0 {
        return Err(ValidationError::InvalidScale(model.scale));
    }
    if model.n_feats == 0 {
        return Err(ValidationError::InvalidFeatures(model.n_feats));
    }
    if model.n_colors != 1 && model.n_colors != 3 {
        return Err(ValidationError::InvalidColors(model.n_colors));
    }
    if !model.rgb_range.is_finite() || model.rgb_range <= 0.0 {
        return Err(ValidationError::InvalidRgbRange(model.rgb_range));
    }
    if model.stu_width_mult.is_nan() || model.stu_width_mult <= 0.0 || model.stu_width_mult > 1.0 {
        return Err(ValidationError::InvalidWidthMult(model.stu_width_mult));
    }

    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }
    if spec.data.patch_size == 0 || spec.data.patch_size % model.scale != 0 {
        return Err(ValidationError::InvalidPatchSize {
            patch: spec.data.patch_size,
            scale: model.scale,
        });
    }

    if !spec.optimizer.lr.is_finite() || spec.optimizer.lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(spec.optimizer.lr));
    }
    let valid_optimizers = ["adam", "sgd"];
    if !valid_optimizers.contains(&spec.optimizer.name.to_lowercase().as_str()) {
        return Err(ValidationError::InvalidOptimizer(
            spec.optimizer.name.clone(),
        ));
    }

    if spec.training.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(spec.training.epochs));
    }
    if spec.training.print_every == 0 {
        return Err(ValidationError::InvalidPrintEvery(spec.training.print_every));
    }

    let loss = &spec.loss;
    if loss.neg_num > spec.data.batch_size {
        return Err(ValidationError::TooManyNegatives {
            neg_num: loss.neg_num,
            batch_size: spec.data.batch_size,
        });
    }
    let weights = [
        ("t_lambda", loss.t_lambda),
        ("contra_lambda", loss.contra_lambda),
        ("ad_lambda", loss.ad_lambda),
        ("percep_lambda", loss.percep_lambda),
    ];
    for (name, value) in weights {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidLossWeight { name, value });
        }
    }
    let gan_valid = loss.gan_k > 0 && loss.gan_lr.is_finite() && loss.gan_lr > 0.0;
    if loss.ad_lambda > 0.0 && !gan_valid {
        return Err(ValidationError::InvalidGanSettings {
            gan_k: loss.gan_k,
            gan_lr: loss.gan_lr,
        });
    }
    if loss.percep_lambda > 0.0 && spec.data.patch_size < MIN_PERCEPTUAL_PATCH {
        return Err(ValidationError::PatchTooSmall {
            patch: spec.data.patch_size,
            min: MIN_PERCEPTUAL_PATCH,
        });
    }

    Ok(())
}
