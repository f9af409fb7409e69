//! Destilar CLI
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! destilar train config.yaml
//!
//! # Train with overrides
//! destilar train config.yaml --epochs 10 --lr 0.0002
//!
//! # Evaluate the saved student at another width
//! destilar test config.yaml --width-mult 0.5 --self-ensemble
//!
//! # Validate config
//! destilar validate config.yaml
//!
//! # Show config info
//! destilar info config.yaml --format yaml
//! ```

use clap::Parser;
use destilar::config::{
    apply_overrides, apply_test_overrides, load_config, read_config, test_from_spec,
    train_from_spec, validate_config, Cli, Command, InfoArgs, OutputFormat, TestArgs, TrainArgs,
    ValidateArgs,
};
use destilar::train::Verbosity;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };

    let result = match cli.command {
        Command::Train(args) => run_train(args, level),
        Command::Test(args) => run_test(args, level),
        Command::Validate(args) => run_validate(args, level),
        Command::Info(args) => run_info(args, level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_train(args: TrainArgs, level: Verbosity) -> Result<(), String> {
    level.log(
        Verbosity::Normal,
        &format!("Destilar: training from {}", args.config.display()),
    );

    let mut spec = read_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    level.log(
        Verbosity::Verbose,
        &format!(
            "  Model: {} x{} (n_feats={}, student width {})",
            spec.model.name, spec.model.scale, spec.model.n_feats, spec.model.stu_width_mult
        ),
    );
    level.log(
        Verbosity::Verbose,
        &format!("  Optimizer: {} (lr={})", spec.optimizer.name, spec.optimizer.lr),
    );
    level.log(
        Verbosity::Verbose,
        &format!(
            "  Epochs: {}, batch size: {}",
            spec.training.epochs, spec.data.batch_size
        ),
    );

    if args.dry_run {
        level.log(Verbosity::Normal, "Dry run - config validated successfully");
        return Ok(());
    }

    let summary = train_from_spec(&spec, level).map_err(|e| format!("Training error: {e}"))?;

    match summary.best_epoch {
        Some(epoch) => level.log(
            Verbosity::Normal,
            &format!(
                "Training complete: best PSNR {:.4} @epoch {epoch} ({:.1}s)",
                summary.best_score, summary.elapsed_secs
            ),
        ),
        None => level.log(
            Verbosity::Normal,
            &format!(
                "Training complete: no checkpoint improved ({:.1}s)",
                summary.elapsed_secs
            ),
        ),
    }
    Ok(())
}

fn run_test(args: TestArgs, level: Verbosity) -> Result<(), String> {
    let mut spec = read_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_test_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    level.log(
        Verbosity::Normal,
        &format!(
            "Testing {} at width {}{}",
            spec.checkpoint.model_filename,
            spec.model.stu_width_mult,
            if spec.training.self_ensemble {
                " with self-ensemble"
            } else {
                ""
            }
        ),
    );

    let report = test_from_spec(&spec, level).map_err(|e| format!("Test error: {e}"))?;
    level.log(
        Verbosity::Normal,
        &format!(
            "Score (PSNR): {:.4} over {} dataset(s) in {:.2}s",
            report.score,
            report.datasets.len(),
            report.elapsed_secs
        ),
    );
    Ok(())
}

fn run_validate(args: ValidateArgs, level: Verbosity) -> Result<(), String> {
    level.log(
        Verbosity::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    level.log(Verbosity::Normal, "Configuration is valid");

    if args.detailed {
        println!();
        println!("Configuration Summary:");
        println!("  Model: {}", spec.model.name);
        println!("  Scale: x{}", spec.model.scale);
        println!("  Hidden width: {}", spec.model.n_feats);
        println!("  Student width: {}", spec.model.stu_width_mult);
        println!();
        println!("  Training data: {}", spec.data.train.display());
        println!("  Batch size: {}", spec.data.batch_size);
        println!("  Patch size: {}", spec.data.patch_size);
        for test in &spec.data.test {
            println!(
                "  Test set: {} ({}){}",
                test.name,
                test.path.display(),
                if test.benchmark { " [benchmark]" } else { "" }
            );
        }
        println!();
        println!("  Optimizer: {}", spec.optimizer.name);
        println!("  Learning rate: {}", spec.optimizer.lr);
        println!("  Schedule: {:?}", spec.schedule);
        println!();
        println!("  Teacher weight: {} (until epoch {})", spec.loss.t_lambda, spec.loss.t_l_remove);
        if spec.loss.neg_num > 0 {
            println!(
                "  Contrastive: {} x {} negatives ({:?})",
                spec.loss.contra_lambda, spec.loss.neg_num, spec.loss.d_func
            );
        }
        println!();
        println!("  Epochs: {}", spec.training.epochs);
        println!("  Checkpoint dir: {}", spec.checkpoint.dir.display());
        if let Some(teacher) = &spec.checkpoint.teacher {
            println!("  Teacher weights: {}", teacher.display());
        }
    }

    Ok(())
}

fn run_info(args: InfoArgs, level: Verbosity) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            level.log(Verbosity::Normal, "Configuration Info:");
            println!();
            println!("Model: {} x{}", spec.model.name, spec.model.scale);
            println!(
                "Optimizer: {} (lr={})",
                spec.optimizer.name, spec.optimizer.lr
            );
            println!("Epochs: {}", spec.training.epochs);
            println!("Batch size: {}", spec.data.batch_size);
            println!("Test sets: {}", spec.data.test.len());

            if spec.training.self_ensemble {
                println!("Self-ensemble: enabled");
            }
            if spec.training.evaluate_all_datasets {
                println!("Evaluation: all datasets");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&spec)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
