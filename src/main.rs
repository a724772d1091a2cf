//! secrets-walker - Hierarchical Secret Materializer
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use secrets_walker::config::{CliArgs, RunConfig};
use secrets_walker::coordinator::RunCoordinator;
use secrets_walker::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.store_addr.to_string(),
            &config.group,
            &config.output_dir.display().to_string(),
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(run_async(config))
}

async fn run_async(config: RunConfig) -> Result<()> {
    let output_dir = config.output_dir.display().to_string();
    let show_progress = config.show_progress;
    let coordinator = RunCoordinator::new(config);

    let stats = if show_progress {
        let progress = Arc::new(ProgressReporter::new());
        progress.set_status("Contacting secret store...");

        let reporter = Arc::clone(&progress);
        let result = coordinator
            .run_with_progress(move |p| reporter.update(&p))
            .await;

        match result {
            Ok(stats) => {
                progress.finish("Secrets materialized");
                stats
            }
            Err(e) => {
                progress.finish_and_clear();
                return Err(e).context("Materialization failed");
            }
        }
    } else {
        coordinator.run().await.context("Materialization failed")?
    };

    if show_progress {
        print_summary(&stats, &output_dir);
    }

    if stats.empty_leaves > 0 {
        info!(empty = stats.empty_leaves, "Some secrets had no fields");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("secrets_walker=debug,warn")
    } else {
        EnvFilter::new("secrets_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
