//! Command line: `test` and `generate`

pub mod cli_app;
pub mod generate_command;
pub mod test_command;

pub use cli_app::{run, run_cli, Cli, Commands, GenerateArgs, RequestType, TestArgs, DEFAULT_BINARY};
pub use generate_command::run_generate;
pub use test_command::run_test;
