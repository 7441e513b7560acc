//! Command line entry for the publish task
//!
//! Task parameters arrive through the environment. The only positional
//! input is the trailing list after `--`, which carries the `--env-vars`
//! and `--build-props` sections.

use anyhow::{Context, Result};
use clap::Parser;
use dotnet_publish_image::infrastructure::{TaskConfig, init_logging};
use dotnet_publish_image::task::{TaskError, TaskParameters};
use dotnet_publish_image::TaskRunner;

/// CLI arguments for dotnet-publish-image
#[derive(Parser, Debug)]
#[command(name = "dotnet-publish-image")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the publish plan as JSON instead of running it
    #[arg(long)]
    dry_run: bool,

    /// `--env-vars` and `--build-props` sections
    #[arg(last = true, allow_hyphen_values = true)]
    lists: Vec<String>,
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = TaskConfig::from_env();

    if let Some(level) = &config.log_level {
        init_logging(level);
    }

    let params = TaskParameters::from_env(&args.lists).map_err(TaskError::from)?;
    let runner = TaskRunner::new(config);

    if args.dry_run {
        let plan = runner.dry_run(&params)?;
        let json = plan.to_json().context("Failed to serialize publish plan")?;
        println!("{json}");
        return Ok(());
    }

    let result = runner.run(&params)?;
    tracing::info!(image = %result.image_with_digest, "Image published");
    Ok(())
}

/// Maps a failed run to its stderr message and process exit code
///
/// Failures a child process already reported print nothing and exit with the
/// child's code. Codes outside `0..=255` exit with 1.
pub fn report(err: &anyhow::Error) -> (Option<String>, u8) {
    match err.downcast_ref::<TaskError>() {
        Some(err) => {
            let message = (!err.is_silent()).then(|| format!("error: {err}"));
            (message, u8::try_from(err.exit_code()).unwrap_or(1))
        }
        None => (Some(format!("error: {err:#}")), 1),
    }
}
