//! haorch entry point
//!
//! Parses arguments and dispatches via `cli::run`. Errors are written to
//! stdout as a JSON error object and the process exits non-zero.

use ha_orchestrator::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
