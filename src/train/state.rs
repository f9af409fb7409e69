//! Mutable training bookkeeping

/// Progress of one distillation run
///
/// Owned by the trainer, merged with each epoch's evaluation result and
/// persisted into checkpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    /// Last completed epoch, `None` before the first
    pub epoch: Option<usize>,
    /// Best evaluation score so far
    pub best_score: f32,
    /// Epoch that produced `best_score`
    pub best_epoch: Option<usize>,
    /// Optimizer steps taken
    pub global_step: u64,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epoch: None,
            best_score: 0.0,
            best_epoch: None,
            global_step: 0,
        }
    }
}

impl TrainingState {
    /// First epoch still to run
    pub fn start_epoch(&self) -> usize {
        self.epoch.map_or(0, |e| e + 1)
    }

    /// Record a finished epoch and its score
    ///
    /// Returns `true` when `score` strictly beats the best so far; the
    /// caller persists a checkpoint exactly in that case.
    pub fn record_evaluation(&mut self, epoch: usize, score: f32) -> bool {
        self.epoch = Some(epoch);
        if score > self.best_score {
            self.best_score = score;
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }
}
