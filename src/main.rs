use clap::Parser;
use console::style;
use directories::ProjectDirs;
use std::fs;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};
use vulnsift::cli::{Cli, Commands};
use vulnsift::commands::{self, Status};
use vulnsift::errors::{SiftError, SiftResult};
use vulnsift::output::OutputFormat;
use vulnsift::utils::Config;

/// Exit status for configuration errors and unreadable scan roots.
const FATAL: u8 = 2;

fn init_tracing() {
    // stdout carries reports; logs go to stderr.
    let fmt_layer = fmt::layer()
        .pretty()
        .with_thread_ids(true)
        .with_timer(time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr);

    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt_layer)
        .init();
}

fn run(cli: Cli) -> SiftResult<Status> {
    let now = Instant::now();

    let proj_dirs = ProjectDirs::from("dev", "vulnsift", "vulnsift")
        .ok_or("Unable to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    fs::create_dir_all(config_dir)?;

    let mut config = Config::load(config_dir)?;

    rayon::ThreadPoolBuilder::new()
        .stack_size(config.performance.rayon_thread_stack_size)
        .num_threads(config.performance.worker_threads.unwrap_or(0))
        .build_global()
        .map_err(|e| SiftError::Other(format!("cannot start worker pool: {e}")))?;

    let scanning = matches!(cli.command, Commands::Scan { .. });
    let status = commands::handle_command(cli.command, &mut config)?;

    let console_out = config.output.default_format.parse::<OutputFormat>().ok()
        == Some(OutputFormat::Console);
    if scanning && console_out && !config.output.quiet {
        eprintln!(
            "{} in {:.3}s.",
            style("Finished").green().bold(),
            now.elapsed().as_secs_f32()
        );
    }
    Ok(status)
}

fn main() -> ExitCode {
    init_tracing();

    tracing::debug!("CLI starting up");
    let cli = Cli::parse();

    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            eprintln!("{}: {e}", style("error").red().bold());
            ExitCode::from(FATAL)
        }
    }
}
