//! psg-harness - request generator and test driver for psg_client
//!
//! Command-line usage:
//!   psg-harness test [--binary PATH] [--bio-file CSV] [--na-file CSV] [-v...]
//!   psg-harness generate [--binary PATH] [--params JSON] INPUT_FILE TYPE NUMBER
//!
//! `test` exits with 0 only when every check passed.

use psg_harness::cli::run_cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    match run_cli().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
