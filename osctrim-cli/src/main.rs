//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    match osctrim_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // stderr is the last resort, a failed write has nowhere to go.
            let _reported = writeln!(std::io::stderr().lock(), "osc-trim: {err}");
            ExitCode::FAILURE
        }
    }
}
