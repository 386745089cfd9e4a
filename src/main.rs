use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use scene_feeder::{Feeder, FeederConfig, Scaler, Split};

/// Build a feeder from a config file and report what it yields.
#[derive(Parser, Debug)]
#[command(name = "scene-feeder", version)]
struct Args {
    /// Feeder configuration (JSON).
    #[arg(short, long)]
    config: PathBuf,

    /// Training batches to pull.
    #[arg(long, default_value_t = 3)]
    train_batches: usize,

    /// Source labels accepted in the validation pass, comma separated.
    /// Defaults to `a`, the reference recording device of the DCASE
    /// mismatched-device task.
    #[arg(long, value_delimiter = ',', default_value = "a")]
    sources: Vec<String>,

    /// Stop the validation pass after this many batches.
    #[arg(long)]
    max_iteration: Option<usize>,

    /// Which index set the validation pass walks: train | validate.
    #[arg(long, default_value = "validate")]
    data_type: Split,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = FeederConfig::from_json_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let scaler = Scaler::from_json_file(&config.scalar_path)
        .with_context(|| format!("loading scalar {}", config.scalar_path.display()))?;
    let feeder = Feeder::new(&config, scaler).context("building feeder")?;
    info!("{feeder:?}");
    let split = args.data_type;

    for (i, batch) in feeder
        .generate_train()
        .context("starting training stream")?
        .take(args.train_batches)
        .enumerate()
    {
        info!(
            "train batch {i}: {} clips, features {:?}, target {:?}",
            batch.len(),
            batch.features.shape(),
            batch.target.as_ref().map(|t| t.shape().to_vec())
        );
    }

    let mut clips = 0;
    let mut batches = 0;
    for batch in feeder.generate_validate(split, &args.sources, args.max_iteration)? {
        clips += batch.len();
        batches += 1;
    }
    info!("{split} pass: {batches} batches, {clips} clips (sources {:?})", args.sources);

    Ok(())
}
