use anyhow::{Context, Result};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use super::TestArgs;
use crate::config::{resolve_binary, ClientConfig, VerboseLevel};
use crate::ids::{default_bio_ids, default_named_annots, prepare_named_annots, read_bio_ids, read_named_annots};
use crate::jsonrpc::PsgClient;
use crate::scenario::{get_ids, test_all, DEFAULT_MAX_IDS};

/// Open an input file for line reading
pub(crate) fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// `test` command: discover ids, run every scenario, print the summary.
///
/// Returns the verdict; the client is closed on every path.
pub async fn run_test(args: TestArgs) -> Result<bool> {
    let binary = resolve_binary(&args.binary)?;

    let bio_ids = match &args.bio_file {
        Some(path) => read_bio_ids(open_input(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => default_bio_ids(),
    };
    let named_annots = match &args.na_file {
        Some(path) => read_named_annots(open_input(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => default_named_annots(),
    };
    let named_annots = prepare_named_annots(&named_annots);

    let config = ClientConfig::new(binary)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_verbose(VerboseLevel::from_count(args.verbose));

    let mut client = PsgClient::open(&config).await?;
    let mut rng = StdRng::from_entropy();

    let outcome = async {
        let (blob_ids, chunk_ids) = get_ids(&mut client, &bio_ids, DEFAULT_MAX_IDS).await?;
        test_all(
            &mut client,
            &bio_ids,
            &blob_ids,
            &named_annots,
            &chunk_ids,
            &mut rng,
            &mut std::io::stderr(),
        )
        .await
    }
    .await;

    let closed = client.close().await;
    let verdict = outcome?;
    closed?;

    for (method, sent) in &verdict.summary {
        println!("{}: {}", method, sent);
    }

    info!("Test pass finished, passed: {}", verdict.passed);
    Ok(verdict.passed)
}
