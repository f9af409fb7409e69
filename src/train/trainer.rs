//! Epoch driver for width distillation

use super::{EvalReport, Evaluator, OutputLayout, TrainingState, Verbosity};
use crate::autograd::backward;
use crate::data::DataLoader;
use crate::distill::{LossComposer, StepInputs};
use crate::model::{LoadOutcome, SlimModel, SlimNetwork};
use crate::monitor::{Metric, ScalarSink};
use crate::optim::{LrSchedule, Optimizer};
use crate::quality::psnr;
use crate::vision::{quantize, save_first};
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Instant;

/// Run-level knobs for [`DistillTrainer`]
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    /// Total epochs, counted from 0
    pub epochs: usize,
    /// Initial learning rate
    pub lr: f32,
    pub schedule: LrSchedule,
    /// Width multiplier of the student pass
    pub stu_width_mult: f32,
    /// Progress and snapshot cadence, in batches
    pub print_every: usize,
    pub rgb_range: f32,
    /// Seed for batch order, crops and negative sampling
    pub seed: u64,
    /// Write `result_*` images at every progress line
    pub save_snapshots: bool,
    pub verbosity: Verbosity,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            epochs: 100,
            lr: 1e-4,
            schedule: LrSchedule::default(),
            stu_width_mult: 0.25,
            print_every: 100,
            rgb_range: 255.0,
            seed: 42,
            save_snapshots: true,
            verbosity: Verbosity::Normal,
        }
    }
}

/// How a run was initialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoint {
    /// Continued from a student checkpoint
    Resumed { epoch: Option<usize> },
    /// Fresh bookkeeping on top of teacher weights
    TeacherBaseline,
    /// Nothing to load; initial weights
    Scratch,
}

/// Outcome of one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub lr: f32,
    /// Teacher loss weight in effect
    pub t_lambda: f32,
    pub batches: usize,
    /// Mean training PSNR of the student output
    pub train_psnr: f32,
    /// Mean training PSNR of the teacher output
    pub teacher_psnr: f32,
    pub eval: EvalReport,
    /// A checkpoint was written after this epoch
    pub checkpoint_saved: bool,
    pub elapsed_secs: f64,
}

/// Outcome of [`DistillTrainer::train`]
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub epochs: Vec<EpochReport>,
    pub best_score: f32,
    pub best_epoch: Option<usize>,
    pub global_step: u64,
    pub elapsed_secs: f64,
}

/// Trains the reduced-width pass of a slimmable network against its own
/// full-width pass
///
/// Each epoch applies the teacher cutoff and the learning-rate schedule,
/// steps through every batch, evaluates the student, and persists a
/// checkpoint only when the evaluation score strictly beats the best so far.
pub struct DistillTrainer<N: SlimNetwork> {
    model: SlimModel<N>,
    optimizer: Box<dyn Optimizer>,
    composer: LossComposer,
    evaluator: Evaluator,
    layout: OutputLayout,
    settings: TrainerSettings,
    state: TrainingState,
    rng: StdRng,
}

impl<N: SlimNetwork> DistillTrainer<N> {
    /// Assemble a trainer; fails if a weighted loss term has no implementation
    pub fn new(
        model: SlimModel<N>,
        optimizer: Box<dyn Optimizer>,
        composer: LossComposer,
        evaluator: Evaluator,
        layout: OutputLayout,
        settings: TrainerSettings,
    ) -> Result<Self> {
        composer.validate()?;
        if settings.print_every == 0 {
            return Err(Error::InvalidParameter("print_every must be positive".to_string()));
        }
        let rng = StdRng::seed_from_u64(settings.seed);
        Ok(Self {
            model,
            optimizer,
            composer,
            evaluator,
            layout,
            settings,
            state: TrainingState::default(),
            rng,
        })
    }

    /// Load the student checkpoint, or teacher weights, or nothing
    ///
    /// A missing checkpoint and teacher is reported and training goes on
    /// from the initial weights; every other load failure is returned.
    pub fn resume(&mut self, teacher: Option<&Path>) -> Result<StartPoint> {
        let verbosity = self.settings.verbosity;
        match self.model.load(&self.layout.checkpoint(), teacher) {
            Ok(LoadOutcome::Resumed {
                state,
                optimizer,
                report,
            }) => {
                if let Some(opt_state) = optimizer {
                    self.optimizer.load_state(&opt_state)?;
                }
                verbosity.log(
                    Verbosity::Normal,
                    &format!(
                        "resuming from {} (epoch {:?}, best {:.4} @ {:?})",
                        self.layout.checkpoint().display(),
                        state.epoch,
                        state.best_score,
                        state.best_epoch
                    ),
                );
                verbosity.log(Verbosity::Verbose, &report.to_string());
                let epoch = state.epoch;
                self.state = state;
                Ok(StartPoint::Resumed { epoch })
            }
            Ok(LoadOutcome::TeacherBaseline { report }) => {
                verbosity.log(Verbosity::Normal, "training from teacher baseline");
                verbosity.log(Verbosity::Verbose, &report.to_string());
                Ok(StartPoint::TeacherBaseline)
            }
            Err(err @ Error::NoCheckpointAvailable { .. }) => {
                verbosity.log(Verbosity::Normal, &format!("{err}; training from scratch"));
                Ok(StartPoint::Scratch)
            }
            Err(err) => Err(err),
        }
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn model(&self) -> &SlimModel<N> {
        &self.model
    }

    pub fn composer(&self) -> &LossComposer {
        &self.composer
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run the remaining epochs
    pub fn train(
        &mut self,
        loader: &mut dyn DataLoader,
        sink: &mut dyn ScalarSink,
    ) -> Result<TrainSummary> {
        let started = Instant::now();
        let start_epoch = self.state.start_epoch();
        let mut reports = Vec::new();

        for epoch in start_epoch..self.settings.epochs {
            let report = self.run_epoch(epoch, loader, sink)?;
            reports.push(report);
        }

        Ok(TrainSummary {
            epochs: reports,
            best_score: self.state.best_score,
            best_epoch: self.state.best_epoch,
            global_step: self.state.global_step,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Evaluate the student without training
    pub fn test(&self, loader: &dyn DataLoader, sink: &mut dyn ScalarSink) -> Result<EvalReport> {
        let step = self.state.epoch.map_or(0, |e| e as u64);
        self.evaluator.evaluate(
            &self.model,
            self.settings.stu_width_mult,
            loader.test_sets(),
            sink,
            step,
        )
    }

    fn run_epoch(
        &mut self,
        epoch: usize,
        loader: &mut dyn DataLoader,
        sink: &mut dyn ScalarSink,
    ) -> Result<EpochReport> {
        let started = Instant::now();
        let verbosity = self.settings.verbosity;

        let t_lambda = self.composer.begin_epoch(epoch);
        let lr = self.settings.schedule.apply(
            self.optimizer.as_mut(),
            epoch,
            self.settings.epochs,
            self.settings.lr,
        );
        sink.add_scalar(Metric::LearningRate, f64::from(lr), epoch as u64);
        verbosity.log(Verbosity::Normal, &format!("[Epoch {epoch}]\tlr:{lr}\t"));

        let (batches, train_psnr, teacher_psnr) = self.train_batches(epoch, loader, sink)?;
        verbosity.log(
            Verbosity::Normal,
            &format!("training PSNR @epoch {epoch}: {train_psnr:.4}"),
        );

        let eval = self.evaluator.evaluate(
            &self.model,
            self.settings.stu_width_mult,
            loader.test_sets(),
            sink,
            epoch as u64,
        )?;
        verbosity.log(
            Verbosity::Verbose,
            &format!("evaluation took {:.2}s", eval.elapsed_secs),
        );

        let checkpoint_saved = self.state.record_evaluation(epoch, eval.score);
        if checkpoint_saved {
            verbosity.log(
                Verbosity::Normal,
                &format!("saving models @epoch {epoch} with psnr: {:.4}", eval.score),
            );
            self.model.save(
                &self.layout.checkpoint(),
                &self.state,
                Some(self.optimizer.state()),
            )?;
        }

        let elapsed_secs = started.elapsed().as_secs_f64();
        verbosity.log(
            Verbosity::Normal,
            &format!("time of epoch{epoch}: {elapsed_secs:.2}"),
        );

        Ok(EpochReport {
            epoch,
            lr,
            t_lambda,
            batches,
            train_psnr,
            teacher_psnr,
            eval,
            checkpoint_saved,
            elapsed_secs,
        })
    }

    /// One pass over the training batches; returns (count, student PSNR, teacher PSNR)
    fn train_batches(
        &mut self,
        epoch: usize,
        loader: &mut dyn DataLoader,
        sink: &mut dyn ScalarSink,
    ) -> Result<(usize, f32, f32)> {
        let scale = self.model.scale();
        let rgb_range = self.settings.rgb_range;
        let width = self.settings.stu_width_mult;
        let batches = loader.train_batches(&mut self.rng)?;
        let total_images = loader.train_len();
        let batch_size = loader.batch_size();

        let (mut s_psnr, mut t_psnr) = (0.0f64, 0.0f64);
        for (batch_idx, batch) in batches.iter().enumerate() {
            let step = batch_idx + 1;
            self.state.global_step += 1;
            self.optimizer.zero_grad(self.model.parameters_mut());

            let lr = Tensor::from_array4(batch.lr.clone(), false);
            let hr = Tensor::from_array4(batch.hr.clone(), false);
            let teacher_sr = self.model.forward_full(&lr)?;
            let student_sr = self.model.forward_scaled(&lr, width)?;

            let inputs = StepInputs {
                lr: &batch.lr,
                hr: &hr,
                teacher_sr: &teacher_sr,
                student_sr: &student_sr,
            };
            let bundle = self
                .composer
                .compute(&inputs, &mut self.rng, sink, self.state.global_step)?;
            backward(&bundle.total, None);
            self.optimizer.step(self.model.parameters_mut());

            let s_sr = quantize(&student_sr.to_array4()?, rgb_range);
            let t_sr = quantize(&teacher_sr.to_array4()?, rgb_range);
            s_psnr += f64::from(training_psnr(&s_sr, &batch.hr, scale, rgb_range));
            t_psnr += f64::from(training_psnr(&t_sr, &batch.hr, scale, rgb_range));

            if step % self.settings.print_every == 0 {
                self.settings.verbosity.log(
                    Verbosity::Normal,
                    &format!(
                        "[Epoch {epoch}/{}] [Batch {}/{total_images}] [psnr {:.4}][t_psnr {:.4}]",
                        self.settings.epochs,
                        batch_idx * batch_size,
                        s_psnr / step as f64,
                        t_psnr / step as f64,
                    ),
                );
                if self.settings.save_snapshots {
                    self.save_snapshot(batch_idx, scale, &batch.hr, &t_sr, &s_sr)?;
                }
            }
        }

        let n = batches.len().max(1) as f64;
        Ok((batches.len(), (s_psnr / n) as f32, (t_psnr / n) as f32))
    }

    fn save_snapshot(
        &self,
        batch_idx: usize,
        scale: usize,
        hr: &ndarray::Array4<f32>,
        t_sr: &ndarray::Array4<f32>,
        s_sr: &ndarray::Array4<f32>,
    ) -> Result<()> {
        let rgb_range = self.settings.rgb_range;
        for (kind, image) in [("hr", hr), ("t_sr", t_sr), ("s_sr", s_sr)] {
            save_first(image, rgb_range, &self.layout.snapshot(batch_idx, scale, kind))?;
        }
        Ok(())
    }
}

/// PSNR for progress reporting; NaN when the patch is smaller than the
/// training border shave
fn training_psnr(
    sr: &ndarray::Array4<f32>,
    hr: &ndarray::Array4<f32>,
    scale: usize,
    rgb_range: f32,
) -> f32 {
    psnr(sr, hr, scale, rgb_range, false).unwrap_or(f32::NAN)
}
