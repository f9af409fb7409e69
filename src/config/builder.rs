//! Build training components from configuration

use super::schema::{DistillSpec, OptimSpec};
use crate::data::FolderLoader;
use crate::distill::{EdgeFeatureLoss, LossComposer, PixelContrastLoss, PixelGanLoss};
use crate::error::{Error, Result};
use crate::model::{SlimMixer, SlimModel};
use crate::optim::{Adam, Optimizer, SGD};
use crate::train::{Evaluator, OutputLayout, TrainerSettings, Verbosity};

fn param_f32(spec: &OptimSpec, key: &str, default: f32) -> f32 {
    spec.params
        .get(key)
        .and_then(|v| v.as_f64())
        .map_or(default, |v| v as f32)
}

/// Build optimizer from configuration
pub fn build_optimizer(spec: &OptimSpec) -> Result<Box<dyn Optimizer>> {
    match spec.name.to_lowercase().as_str() {
        "sgd" => {
            let momentum = param_f32(spec, "momentum", 0.0);
            Ok(Box::new(SGD::new(spec.lr, momentum)))
        }
        "adam" => {
            let beta1 = param_f32(spec, "beta1", 0.9);
            let beta2 = param_f32(spec, "beta2", 0.999);
            let eps = param_f32(spec, "eps", 1e-8);
            Ok(Box::new(Adam::new(spec.lr, beta1, beta2, eps)))
        }
        name => Err(Error::ConfigError(format!(
            "Unknown optimizer: {name}. Supported: sgd, adam"
        ))),
    }
}

/// Build the reference slimmable network
pub fn build_model(spec: &DistillSpec) -> Result<SlimModel<SlimMixer>> {
    let m = &spec.model;
    let network = SlimMixer::new(m.n_colors, m.n_feats, m.scale, m.init_seed)?;
    Ok(SlimModel::new(network))
}

/// Build the loss composer
///
/// The contrastive term is pixel-space; a positive `ad_lambda` attaches a
/// [`PixelGanLoss`] and a positive `percep_lambda` an [`EdgeFeatureLoss`].
pub fn build_composer(spec: &DistillSpec) -> LossComposer {
    let loss = &spec.loss;
    let m = &spec.model;
    let mut composer = LossComposer::new(loss.weights(), loss.neg_num, loss.t_l_remove, m.scale)
        .with_contrastive(Box::new(PixelContrastLoss::new(
            loss.d_func,
            loss.contrast_t_detach,
        )));
    if loss.ad_lambda > 0.0 {
        composer = composer.with_adversarial(Box::new(PixelGanLoss::new(
            m.n_colors,
            m.rgb_range,
            loss.gan_k,
            loss.gan_lr,
        )));
    }
    if loss.percep_lambda > 0.0 {
        composer = composer.with_perceptual(Box::new(EdgeFeatureLoss::new(m.rgb_range)));
    }
    composer
}

/// Checkpoint, image and log locations
pub fn build_layout(spec: &DistillSpec) -> OutputLayout {
    OutputLayout::new(
        spec.checkpoint.dir.clone(),
        spec.model.name.clone(),
        spec.checkpoint.model_filename.clone(),
    )
    .with_roots(spec.output.root.clone(), spec.output.log_root.clone())
}

/// Evaluator honouring the ensemble, result-saving and scope flags
pub fn build_evaluator(
    spec: &DistillSpec,
    layout: &OutputLayout,
    verbosity: Verbosity,
) -> Evaluator {
    let mut evaluator = Evaluator::new(spec.model.scale, spec.model.rgb_range)
        .with_self_ensemble(spec.training.self_ensemble)
        .with_scope(spec.training.eval_scope())
        .with_verbosity(verbosity);
    if spec.training.save_results {
        evaluator = evaluator.save_results_to(layout.output_dir());
    }
    evaluator
}

pub fn build_settings(spec: &DistillSpec, verbosity: Verbosity) -> TrainerSettings {
    TrainerSettings {
        epochs: spec.training.epochs,
        lr: spec.optimizer.lr,
        schedule: spec.schedule,
        stu_width_mult: spec.model.stu_width_mult,
        print_every: spec.training.print_every,
        rgb_range: spec.model.rgb_range,
        seed: spec.training.seed,
        save_snapshots: spec.training.save_snapshots,
        verbosity,
    }
}

/// Training loader with every configured test set attached
pub fn build_loader(spec: &DistillSpec) -> Result<FolderLoader> {
    let m = &spec.model;
    let loader = FolderLoader::open(
        &spec.data.train,
        m.scale,
        spec.data.patch_size,
        spec.data.batch_size,
        m.n_colors,
        m.rgb_range,
    )?
    .with_augment(spec.data.augment);
    attach_test_sets(loader, spec)
}

/// Loader holding only the test sets
pub fn build_test_loader(spec: &DistillSpec) -> Result<FolderLoader> {
    attach_test_sets(FolderLoader::test_only(spec.model.scale), spec)
}

fn attach_test_sets(mut loader: FolderLoader, spec: &DistillSpec) -> Result<FolderLoader> {
    for test in &spec.data.test {
        loader = loader.with_test_set(
            &test.name,
            &test.path,
            test.benchmark,
            spec.model.n_colors,
            spec.model.rgb_range,
        )?;
    }
    Ok(loader)
}
