mod cli;
mod logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use birdseye_core::pipeline::{run_pipeline, PipelineConfig, SourceSpec};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(&cli.log_file)?;

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupt);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .context("failed to install Ctrl-C handler")?;
    }

    let (source, output, fps) = match cli.command {
        cli::Command::Video { input, output } => (SourceSpec::Video(input), output, 30.0),
        cli::Command::Images { input, output, fps } => (SourceSpec::Images(input), output, fps),
    };

    let config = PipelineConfig {
        source,
        output,
        frame_width: cli.width,
        frame_height: cli.height,
        fps,
    };

    let summary = run_pipeline(&config, &interrupt).context("pipeline failed")?;

    info!(
        frames = summary.frames_processed,
        elapsed_seconds = summary.elapsed_seconds,
        interrupted = summary.interrupted,
        "run finished"
    );
    Ok(())
}
