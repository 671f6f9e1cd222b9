pub mod rules;
pub mod scan;

use crate::cli::Commands;
use crate::errors::SiftResult;
use crate::utils::config::Config;

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Clean,
    /// A finding reached the `fail_on` threshold.
    Failed,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Clean => 0,
            Status::Failed => 1,
        }
    }
}

pub fn handle_command(command: Commands, config: &mut Config) -> SiftResult<Status> {
    match command {
        Commands::Scan {
            path,
            format,
            severity,
            categories,
            window,
            no_dedupe,
            fail_on,
            quiet,
        } => {
            if let Some(severity) = severity {
                config.scanner.min_severity = severity;
            }
            if !categories.is_empty() {
                config.scanner.categories = categories;
            }
            if let Some(width) = window {
                config.scanner.window_width = width;
            }
            if no_dedupe {
                config.scanner.dedupe = false;
            }
            if let Some(level) = fail_on {
                config.output.fail_on = level;
            }
            if quiet {
                config.output.quiet = true;
            }
            if !format.is_empty() {
                config.output.default_format = format;
            }

            scan::handle(&path, config)
        }
        Commands::Rules { category, verbose } => rules::handle(category.as_deref(), verbose, config),
    }
}
