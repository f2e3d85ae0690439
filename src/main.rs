use anyhow::{Context, Result};
use clap::Parser;
use compressor_power::{config, ml, pipeline, telemetry};
use config::Config;
use pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Train per-model compressor power regressions
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Input records (JSON array); overrides `input.path`
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory for persisted models; overrides `store.dir`
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Train model groups on worker threads
    #[arg(long)]
    parallel: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(input) = cli.input {
        cfg.input.path = input;
    }
    if let Some(dir) = cli.models_dir {
        cfg.store.dir = dir;
    }
    cfg.training.parallel |= cli.parallel;

    let dispatch = telemetry::build_dispatch(&cfg.logging)?;
    let _guard = tracing::dispatcher::set_default(&dispatch);

    info!(input = %cfg.input.path.display(), models = %cfg.store.dir.display(), "starting compressor power training");

    let store = Arc::new(ml::FileModelStore::new(
        cfg.store.dir.clone(),
        cfg.store.extension.clone(),
    ));
    let pipeline = Pipeline::new(cfg, store, dispatch.clone());
    let report = pipeline.run_file().await?;

    let trained = report.trained().count();
    let failed = report.failed().count();
    for (model, error) in report.failed() {
        warn!(%model, %error, "model not trained");
    }
    info!(trained, failed, "training complete");
    Ok(())
}
