//! # det3d-eval
//!
//! Scores 3D detections against ground truth and prints the average precision table.

use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use det3d_eval::{
    evaluate,
    evaluation::detection::constants::DifficultyMode,
    io::{pair_samples, read_records, write_json},
    DetectionCfg,
};

#[macro_use]
extern crate log;

#[derive(Parser, Debug)]
#[command(
    name = "det3d-eval",
    version,
    about = "Average precision of 3D detections per class and difficulty level"
)]
struct Args {
    /// Ground-truth annotations (.json, or .feather with one row per box).
    #[arg(long)]
    ground_truth: PathBuf,
    /// Predicted annotations, same layout as the ground truth plus a `score`.
    #[arg(long)]
    predictions: PathBuf,
    /// JSON evaluation config. Command line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Classes to evaluate, comma separated.
    #[arg(long, value_delimiter = ',')]
    classes: Option<Vec<String>>,
    /// Number of recall sampling points.
    #[arg(long)]
    num_pr_points: Option<usize>,
    /// One of `Overall`, `Distance`, `Overall&Distance`.
    #[arg(long, value_parser = DifficultyMode::parse)]
    difficulty_mode: Option<DifficultyMode>,
    /// Ignore heading when matching.
    #[arg(long, default_value_t = false)]
    no_heading: bool,
    /// Evaluate Car, Bus and Truck separately instead of as Vehicle.
    #[arg(long, default_value_t = false)]
    no_superclass: bool,
    /// Number of parts the IoU computation is split into.
    #[arg(long)]
    num_parts: Option<usize>,
    /// Write the metrics map as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn load_cfg(args: &Args) -> Result<DetectionCfg> {
    let mut cfg = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Cannot open config `{}`.", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Cannot parse config `{}`.", path.display()))?
        }
        None => DetectionCfg::default(),
    };
    if let Some(classes) = &args.classes {
        cfg.classes = classes.clone();
    }
    if let Some(num_pr_points) = args.num_pr_points {
        cfg.num_pr_points = num_pr_points;
    }
    if let Some(difficulty_mode) = args.difficulty_mode {
        cfg.difficulty_mode = difficulty_mode;
    }
    if let Some(num_parts) = args.num_parts {
        cfg.num_parts = num_parts;
    }
    if args.no_heading {
        cfg.ap_with_heading = false;
    }
    if args.no_superclass {
        cfg.use_superclass = false;
    }
    // The table is printed once by `main`.
    cfg.print_ok = false;
    Ok(cfg)
}

/// Script entrypoint.
pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = load_cfg(&args)?;
    debug!("{cfg:?}");

    let gt_records = read_records(&args.ground_truth).with_context(|| {
        format!(
            "Cannot read ground truth `{}`.",
            args.ground_truth.display()
        )
    })?;
    let pred_records = read_records(&args.predictions)
        .with_context(|| format!("Cannot read predictions `{}`.", args.predictions.display()))?;
    let (gt_annos, pred_annos) = pair_samples(gt_records, pred_records)?;
    info!("Loaded {} samples.", gt_annos.len());

    let (report, metrics) = evaluate(&gt_annos, &pred_annos, &cfg)?;
    println!("{report}");

    if let Some(output) = &args.output {
        write_json(output, &metrics)
            .with_context(|| format!("Cannot write metrics to `{}`.", output.display()))?;
        info!("Metrics written to {}.", output.display());
    }
    Ok(())
}
