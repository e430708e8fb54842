mod cli;
mod git;
mod io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, LabCommand, config::ConfigError};

const LOG_ENV_VAR: &str = "LAB_LOG";

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.subcommand {
        LabCommand::MergeRequest(args) => cli::run_merge_request_command(args),
        LabCommand::Issue(args) => cli::run_issue_command(args),
        LabCommand::Browse(args) => cli::browse_repository(args),
    }
}

/// The process exit code for a failed run: 2 if the configuration file
/// couldn't be read or written, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    let is_file_error = error.chain().any(|cause| {
        cause
            .downcast_ref::<ConfigError>()
            .is_some_and(ConfigError::is_file_error)
    });

    if is_file_error { 2 } else { 1 }
}

/// Logs go to stderr so they never mix with command output. `LAB_LOG` takes
/// precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={default_level}", env!("CARGO_CRATE_NAME"))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
