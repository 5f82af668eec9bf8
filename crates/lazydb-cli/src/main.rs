//! CLI entrypoint for the lazydb plugin host.
//!
//! The binary delegates to [`lazydb_cli::run`], which loads configuration,
//! starts the plugins, and writes JSON results to standard output.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    lazydb_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
