/// main.rs — NF-GARCH pipeline entry point
///
/// Thin orchestration shell over `nfgarch_core`: loads `RunConfig` from
/// `.env`/the process environment, reads a price-matrix CSV, runs the full
/// (asset × model spec) sweep, and writes the five output sheets plus the
/// run manifest to the configured output directory. Exit codes follow the
/// `CoreError` taxonomy: 2=InvalidInput, 3=Spec, 4=Numerics,
/// 5=Constraints, 6=TrainingDiverged, 7=Timeout, 8=Cancelled.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nfgarch_core::cancel::{CancellationToken, Deadline};
use nfgarch_core::data::read_price_matrix_csv;
use nfgarch_core::manifest::RunManifest;
use nfgarch_core::{pipeline, CoreError, RunConfig};

#[derive(Parser)]
#[command(name = "nfgarch")]
#[command(about = "NF-GARCH volatility research pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full (asset x model spec) sweep over a price-matrix CSV.
    Run {
        /// Date + per-asset price columns CSV (see `data::read_price_matrix_csv`).
        #[arg(short, long)]
        prices: PathBuf,

        /// Overrides RunConfig::output_dir / $OUTPUT_DIR when set.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Overrides RunConfig::timeout_seconds / $TIMEOUT_SECONDS when set.
        #[arg(short, long)]
        timeout_seconds: Option<f64>,

        /// Enable debug-level logging regardless of $RUST_LOG.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

fn run(prices: PathBuf, output_dir: Option<PathBuf>, timeout_seconds: Option<f64>) -> Result<(), CoreError> {
    let mut config = RunConfig::from_env().map_err(|e| CoreError::InvalidInput(e.to_string()))?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(t) = timeout_seconds {
        config.timeout_seconds = t;
    }

    info!(path = %prices.display(), "reading price matrix");
    let matrix = read_price_matrix_csv(&prices)?;
    let assets = matrix.to_return_series();
    if assets.is_empty() {
        return Err(CoreError::InvalidInput("no usable asset columns in price matrix".to_string()));
    }
    info!(n_assets = assets.len(), "prepared return series");

    let mut manifest = RunManifest::new(&config);
    manifest.log(format!("loaded {} assets from {}", assets.len(), prices.display()));

    let token = CancellationToken::new();
    let deadline = Deadline::from_secs(config.timeout_seconds);

    let outcome = pipeline::run_pipeline(&assets, &config, &token, Some(&deadline));
    let report = match outcome {
        Ok(report) => {
            manifest.log("pipeline completed for all assets".to_string());
            report
        }
        Err(e) => {
            manifest.log(format!("pipeline aborted: {e}"));
            let _ = manifest.write_to_dir(&config.output_dir);
            return Err(e);
        }
    };

    info!(dir = %config.output_dir.display(), "writing output sheets");
    let sheet_paths = report.write_to_dir(&config.output_dir)?;
    manifest.record_sheet_hashes(&sheet_paths)?;
    let manifest_path = manifest.write_to_dir(&config.output_dir)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { prices, output_dir, timeout_seconds, verbose } => {
            init_logging(verbose);
            if let Err(e) = run(prices, output_dir, timeout_seconds) {
                error!(error = %e, exit_code = e.exit_code(), "run failed");
                std::process::exit(e.exit_code());
            }
            Ok(())
        }
    }
    .map_err(|e: CoreError| anyhow!(e.to_string()))
}
