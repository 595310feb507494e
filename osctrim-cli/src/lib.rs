//! Command-line interface for trimming osmChange files to a region.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use env_logger::Env;

mod error;
mod trim;

pub use error::CliError;
use trim::{TrimArgs, run_trim};

pub(crate) const ARG_INPUT: &str = "input";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_PREFIX: &str = "prefix";
pub(crate) const ARG_STORE: &str = "store";
pub(crate) const ARG_HOST: &str = "host";
pub(crate) const ARG_PORT: &str = "port";
pub(crate) const ARG_USER: &str = "user";
pub(crate) const ARG_PASSWORD: &str = "password";
pub(crate) const ARG_BBOX: &str = "bbox";
pub(crate) const ARG_POLY: &str = "poly";
pub(crate) const ARG_COMPRESSION: &str = "compression";
pub(crate) const ARG_VERBOSE: &str = "verbose";
pub(crate) const ENV_INPUT: &str = "OSCTRIM_CMDS_TRIM_INPUT";
pub(crate) const ENV_OUTPUT: &str = "OSCTRIM_CMDS_TRIM_OUTPUT";
pub(crate) const ENV_DATABASE: &str = "OSCTRIM_CMDS_TRIM_DATABASE";
pub(crate) const ENV_USER: &str = "OSCTRIM_CMDS_TRIM_USER";
/// Read for the PostgreSQL password when `--password` is set.
pub(crate) const ENV_PGPASSWORD: &str = "PGPASSWORD";

/// Run the osc-trim CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when argument parsing, configuration merging or any
/// stage of the trim pipeline fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Trim(args) => run_trim(args),
    }
}

/// Install the process logger once configuration is known.
///
/// `RUST_LOG` still wins over the verbosity-derived default.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = Env::default().default_filter_or(default_filter);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already installed; keeping the existing one");
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osc-trim",
    about = "Trim osmChange files to a region and a reference database",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Keep only the edits that touch a region or features already known.
    Trim(TrimArgs),
}

#[cfg(test)]
mod tests;
