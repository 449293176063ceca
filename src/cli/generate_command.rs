use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::io::{self, Write};

use super::test_command::open_input;
use super::{GenerateArgs, RequestType};
use crate::config::{resolve_binary, ClientConfig};
use crate::ids::{bio_id_table, prepare_named_annots, read_bio_ids, read_named_annots, IdTable};
use crate::jsonrpc::{Params, PsgClient, RequestGenerator};
use crate::scenario::get_ids;

/// `generate` command: write `number` requests of one type to `out`
pub async fn run_generate<W: Write + ?Sized>(args: GenerateArgs, out: &mut W) -> Result<()> {
    let static_params = parse_params(args.params.as_deref())?;
    let input = open_input(&args.input_file)?;
    let read_context = || format!("Failed to read {}", args.input_file.display());

    let ids = match args.request_type {
        RequestType::NamedAnnot => {
            prepare_named_annots(&read_named_annots(input).with_context(read_context)?)
        }
        RequestType::Resolve | RequestType::Biodata => {
            bio_id_table(&read_bio_ids(input).with_context(read_context)?)
        }
        RequestType::Blob | RequestType::Chunk => {
            let bio_ids = read_bio_ids(input).with_context(read_context)?;
            let binary = resolve_binary(&args.binary)?;

            let mut client = PsgClient::open(&ClientConfig::new(binary)).await?;
            let discovered = get_ids(&mut client, &bio_ids, args.number).await;
            let closed = client.close().await;
            let (blob_ids, chunk_ids) = discovered?;
            closed?;

            if args.request_type == RequestType::Blob {
                blob_ids
            } else {
                chunk_ids
            }
        }
    };

    write_requests(&ids, &static_params, args.request_type.method(), args.number, out)
}

/// Parse the `--params` JSON object
pub fn parse_params(text: Option<&str>) -> Result<Params> {
    let Some(text) = text else {
        return Ok(Params::new());
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(other) => bail!("Invalid params: expected a JSON object, got {}", other),
        Err(e) => Err(anyhow!("Invalid params: {}", e)),
    }
}

/// Write `number` encoded requests, cycling through the id rows and adding
/// `static_params` to each
pub fn write_requests<W: Write + ?Sized>(
    ids: &IdTable,
    static_params: &Params,
    method: &str,
    number: usize,
    out: &mut W,
) -> Result<()> {
    if number == 0 {
        return Ok(());
    }
    if ids.is_empty() {
        bail!("No IDs for the \"{}\" requests", method);
    }

    if let Some(clash) = ids
        .cycle()
        .next()
        .and_then(|row| static_params.keys().find(|name| row.contains_key(*name)).cloned())
    {
        bail!("Invalid params: \"{}\" is already set from the input file", clash);
    }

    let mut generator = RequestGenerator::new();

    for mut row in ids.cycle().take(number) {
        row.extend(static_params.iter().map(|(k, v)| (k.clone(), v.clone())));

        match writeln!(out, "{}", generator.generate(method, row)) {
            Ok(()) => {}
            // Broken pipeは正常な終了として扱う
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }

    out.flush()?;
    Ok(())
}
