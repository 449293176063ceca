use super::{run_generate, run_test};
use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;

/// Binary tried first when `--binary` is not given
pub const DEFAULT_BINARY: &str = "./psg_client";

/// psg-harness - JSON-RPC request generator and tester for psg_client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Perform psg_client tests
    Test(TestArgs),

    /// Generate JSON-RPC requests for psg_client
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// psg_client binary to run (default: tries ./psg_client, then $PATH/psg_client)
    #[arg(long, default_value = DEFAULT_BINARY)]
    pub binary: PathBuf,

    /// CSV file with bio IDs "BioID[,Type]" (default: some hard-coded IDs)
    #[arg(long)]
    pub bio_file: Option<PathBuf>,

    /// CSV file with named annotations "BioID,NamedAnnotID[,NamedAnnotID]..." (default: some hard-coded IDs)
    #[arg(long)]
    pub na_file: Option<PathBuf>,

    /// Verbose output (multiple are allowed)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Seconds to wait for each reply line
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// psg_client binary to run (default: tries ./psg_client, then $PATH/psg_client)
    #[arg(long, default_value = DEFAULT_BINARY)]
    pub binary: PathBuf,

    /// Params to add to requests (e.g. '{"include_info": ["canonical-id", "gi"]}')
    #[arg(long)]
    pub params: Option<String>,

    /// CSV file with bio IDs "BioID[,Type]" or named annotations "BioID,NamedAnnotID[,NamedAnnotID]..."
    #[arg(value_name = "INPUT_FILE")]
    pub input_file: PathBuf,

    /// Type of requests
    #[arg(value_enum, value_name = "TYPE")]
    pub request_type: RequestType,

    /// Max number of requests
    #[arg(value_name = "NUMBER")]
    pub number: usize,
}

/// Request types the `generate` command can produce
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Resolve,
    Biodata,
    Blob,
    #[value(name = "named_annot")]
    NamedAnnot,
    Chunk,
}

impl RequestType {
    /// JSON-RPC method name
    pub fn method(self) -> &'static str {
        match self {
            RequestType::Resolve => "resolve",
            RequestType::Biodata => "biodata",
            RequestType::Blob => "blob",
            RequestType::NamedAnnot => "named_annot",
            RequestType::Chunk => "chunk",
        }
    }
}

/// CLI実行エントリーポイント
pub async fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    run(cli.command).await
}

/// Run one command; the exit code reflects the test verdict
pub async fn run(command: Commands) -> Result<ExitCode> {
    debug!("Running {:?}", command);

    match command {
        Commands::Test(args) => {
            let passed = run_test(args).await?;
            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Generate(args) => {
            run_generate(args, &mut std::io::stdout()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
