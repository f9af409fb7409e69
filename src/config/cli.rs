//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! destilar train config.yaml
//! destilar train config.yaml --epochs 10 --lr 2e-4 --dry-run
//! destilar test config.yaml --width-mult 0.5 --self-ensemble
//! destilar validate config.yaml
//! destilar info config.yaml --format json
//! ```

use super::schema::DistillSpec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Destilar: width distillation for super-resolution networks
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "destilar")]
#[command(version)]
#[command(about = "Distil the reduced-width pass of a slimmable super-resolution network")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a student from YAML configuration
    Train(TrainArgs),

    /// Evaluate the saved student without training
    Test(TestArgs),

    /// Validate a configuration file without training
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Random seed for batch order, crops and negatives
    #[arg(long)]
    pub seed: Option<u64>,

    /// Dry run (validate config but don't train)
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the test command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TestArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Width multiplier to evaluate at
    #[arg(short, long)]
    pub width_mult: Option<f32>,

    /// Average over the 8 flip/transpose variants
    #[arg(long)]
    pub self_ensemble: bool,

    /// Write the super-resolved images
    #[arg(long)]
    pub save_results: bool,

    /// Score every test dataset instead of the first
    #[arg(long)]
    pub all_datasets: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for info command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {s}. Valid formats: text, json, yaml"
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply train command-line overrides to a DistillSpec
pub fn apply_overrides(spec: &mut DistillSpec, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        spec.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        spec.data.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.lr = lr;
    }
    if let Some(seed) = args.seed {
        spec.training.seed = seed;
    }
}

/// Apply test command-line overrides to a DistillSpec
///
/// Flags only switch features on; an absent flag keeps the file's value.
pub fn apply_test_overrides(spec: &mut DistillSpec, args: &TestArgs) {
    if let Some(width) = args.width_mult {
        spec.model.stu_width_mult = width;
    }
    spec.training.self_ensemble |= args.self_ensemble;
    spec.training.save_results |= args.save_results;
    spec.training.evaluate_all_datasets |= args.all_datasets;
}
