//! CLI entrypoint for the docswap batch editor.
//!
//! The binary delegates to [`docswap::run`], which loads configuration,
//! processes every document in the source directory, and prints the report.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    docswap::run(std::env::args_os(), &mut stdout, &mut stderr)
}
