//! Training observability
//!
//! Scalars are pushed through an explicitly passed [`ScalarSink`] handle,
//! keyed by global step. [`ScalarLog`] is the standard sink: it keeps every
//! record, maintains running statistics per metric and flushes to a
//! [`MetricsStore`].
//!
//! # Example
//!
//! ```
//! use destilar::monitor::{Metric, ScalarLog, ScalarSink};
//!
//! let mut log = ScalarLog::new();
//! log.add_scalar(Metric::L1Loss, 0.5, 1);
//! log.add_scalar(Metric::L1Loss, 0.3, 2);
//!
//! let stats = log.stats(&Metric::L1Loss).unwrap();
//! assert_eq!(stats.count, 2);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod storage;

pub use storage::{InMemoryStore, JsonFileStore, MetricsStore, StorageError, StorageResult};


// =============================================================================
// Metric Types
// =============================================================================

/// Scalars emitted during distillation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Student reconstruction L1
    L1Loss,
    /// Teacher reconstruction L1
    TeacherL1Loss,
    /// Contrastive term
    ContrastLoss,
    /// Adversarial term
    AdLoss,
    /// Perceptual term
    PercepLoss,
    /// Weighted objective
    TotalLoss,
    /// Learning rate of the epoch
    LearningRate,
    /// Evaluation PSNR
    TestPsnr,
    /// Evaluation SSIM
    TestSsim,
    /// Evaluation NIQE
    TestNiqe,
    /// Anything else
    Custom(String),
}

impl Metric {
    /// Tag used in logs and stores
    pub fn as_str(&self) -> &str {
        match self {
            Metric::L1Loss => "Train/L1_loss",
            Metric::TeacherL1Loss => "Train/Teacher_l1_loss",
            Metric::ContrastLoss => "Train/Contras_loss",
            Metric::AdLoss => "Train/Ad_loss",
            Metric::PercepLoss => "Train/Percep_loss",
            Metric::TotalLoss => "Train/Total_loss",
            Metric::LearningRate => "Train/lr",
            Metric::TestPsnr => "Test/PSNR",
            Metric::TestSsim => "Test/SSIM",
            Metric::TestNiqe => "Test/NIQE",
            Metric::Custom(name) => name,
        }
    }

    /// Parse a tag produced by [`as_str`](Self::as_str)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Train/L1_loss" => Some(Metric::L1Loss),
            "Train/Teacher_l1_loss" => Some(Metric::TeacherL1Loss),
            "Train/Contras_loss" => Some(Metric::ContrastLoss),
            "Train/Ad_loss" => Some(Metric::AdLoss),
            "Train/Percep_loss" => Some(Metric::PercepLoss),
            "Train/Total_loss" => Some(Metric::TotalLoss),
            "Train/lr" => Some(Metric::LearningRate),
            "Test/PSNR" => Some(Metric::TestPsnr),
            "Test/SSIM" => Some(Metric::TestSsim),
            "Test/NIQE" => Some(Metric::TestNiqe),
            _ => None,
        }
    }
}

// =============================================================================
// MetricRecord
// =============================================================================

/// A single scalar with its step and wall-clock timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
    /// Global step (epoch for test metrics)
    pub step: u64,
    /// Metric type
    pub metric: Metric,
    /// Metric value
    pub value: f64,
    /// Optional tags, e.g. the test dataset name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl MetricRecord {
    /// Create a new metric record with current timestamp
    pub fn new(metric: Metric, value: f64, step: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            timestamp,
            step,
            metric,
            value,
            tags: HashMap::new(),
        }
    }

    /// Add a tag to this record
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }
}

// =============================================================================
// MetricStats
// =============================================================================

/// Statistical summary for a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    /// Number of finite values
    pub count: usize,
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Sum of all finite values
    pub sum: f64,
    /// Whether any NaN values were recorded
    pub has_nan: bool,
    /// Whether any Inf values were recorded
    pub has_inf: bool,
}

/// Running statistics using Welford's algorithm for numerical stability
#[derive(Debug, Clone)]
pub(crate) struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64, // Sum of squares of differences from mean
    min: f64,
    max: f64,
    sum: f64,
    has_nan: bool,
    has_inf: bool,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            has_nan: false,
            has_inf: false,
        }
    }
}

impl RunningStats {
    /// Update running stats with a new value using Welford's algorithm
    pub(crate) fn update(&mut self, value: f64) {
        if value.is_nan() {
            self.has_nan = true;
            return;
        }
        if value.is_infinite() {
            self.has_inf = true;
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            return;
        }

        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn std(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }

    pub(crate) fn to_stats(&self) -> MetricStats {
        MetricStats {
            count: self.count,
            mean: self.mean,
            std: self.std(),
            min: self.min,
            max: self.max,
            sum: self.sum,
            has_nan: self.has_nan,
            has_inf: self.has_inf,
        }
    }
}

// =============================================================================
// ScalarSink
// =============================================================================

/// Destination for step-keyed scalars
///
/// Passed by `&mut` into the loss composer, trainer and evaluator; one
/// sink lives for one run.
pub trait ScalarSink {
    /// Record `value` for `metric` at `step`
    fn add_scalar(&mut self, metric: Metric, value: f64, step: u64);

    /// Record a scalar measured on one test dataset
    ///
    /// Sinks that do not keep tags record it like any other scalar.
    fn add_dataset_scalar(&mut self, metric: Metric, value: f64, step: u64, dataset: &str) {
        let _ = dataset;
        self.add_scalar(metric, value, step);
    }
}

/// Collects scalars and their running statistics
///
/// ```
/// use destilar::monitor::{InMemoryStore, Metric, ScalarLog, ScalarSink};
///
/// let mut log = ScalarLog::with_store(Box::new(InMemoryStore::new()));
/// log.add_scalar(Metric::TotalLoss, 1.25, 10);
/// log.flush().unwrap();
/// ```
pub struct ScalarLog {
    records: Vec<MetricRecord>,
    running_stats: HashMap<Metric, RunningStats>,
    store: Option<Box<dyn MetricsStore>>,
    flushed: usize,
}

impl Default for ScalarLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarLog {
    /// In-memory log with no backing store
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            running_stats: HashMap::new(),
            store: None,
            flushed: 0,
        }
    }

    /// Log that persists to `store` on [`flush`](Self::flush)
    pub fn with_store(store: Box<dyn MetricsStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// All records so far
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Records of one metric, in step order of arrival
    pub fn series(&self, metric: &Metric) -> Vec<(u64, f64)> {
        self.records
            .iter()
            .filter(|r| &r.metric == metric)
            .map(|r| (r.step, r.value))
            .collect()
    }

    /// Summary statistics for one metric
    pub fn stats(&self, metric: &Metric) -> Option<MetricStats> {
        self.running_stats.get(metric).map(RunningStats::to_stats)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write records not yet persisted to the store
    pub fn flush(&mut self) -> StorageResult<()> {
        if let Some(store) = self.store.as_mut() {
            store.write_batch(&self.records[self.flushed..])?;
            store.flush()?;
            self.flushed = self.records.len();
        }
        Ok(())
    }
}

impl ScalarLog {
    fn push(&mut self, record: MetricRecord) {
        self.running_stats
            .entry(record.metric.clone())
            .or_default()
            .update(record.value);
        self.records.push(record);
    }
}

impl ScalarSink for ScalarLog {
    fn add_scalar(&mut self, metric: Metric, value: f64, step: u64) {
        self.push(MetricRecord::new(metric, value, step));
    }

    fn add_dataset_scalar(&mut self, metric: Metric, value: f64, step: u64, dataset: &str) {
        self.push(MetricRecord::new(metric, value, step).with_tag("dataset", dataset));
    }
}
