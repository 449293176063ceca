//! Scripted stand-in for `psg_client interactive -server-mode`
//!
//! Reads one JSON-RPC request per line from stdin and answers with canned
//! lines chosen by method (and, for `resolve`, by the bio id prefix).
//! Used by the integration tests.

use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Lines to write for one request; `None` means exit without answering
fn script(request: &Value) -> Option<Vec<String>> {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

    let result = |result: Value| json!({"jsonrpc": "2.0", "result": result, "id": id}).to_string();
    let error = |code: i64, message: &str| {
        json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id}).to_string()
    };
    let success = || result(json!({"status": "Success"}));

    let lines = match method {
        "resolve" => {
            let bio_id = params
                .get("bio_id")
                .and_then(|b| b.get(0))
                .and_then(Value::as_str)
                .unwrap_or_default();

            if bio_id.starts_with("missing:") {
                vec![result(json!({"status": "NotFound", "errors": [format!("Bio id {} not found", bio_id)]}))]
            } else if bio_id.starts_with("fail:") {
                vec![result(json!({"status": "Failure", "errors": ["Resolution failed", bio_id]}))]
            } else {
                vec![success()]
            }
        }
        "biodata" => {
            let sat_key = params.to_string().len();
            vec![
                result(json!({
                    "reply": "BlobInfo",
                    "id": {"sat": 4, "sat_key": sat_key},
                    "id2_info": format!("4.{}.2", sat_key)
                })),
                success(),
            ]
        }
        "blob" => vec![result(json!({"status": "NotFound", "errors": ["Blob not found"]}))],
        "named_annot" => vec![result(json!({"status": "Forbidden", "errors": ["Access denied"]}))],
        "chunk" => vec![success()],
        "fail" => vec![result(json!({"status": "Failure", "errors": ["Internal failure", "retry later"]}))],
        "rpc_error" => vec![error(-32000, "Scripted error")],
        "garbage" => vec!["this is not json".to_string()],
        "silent" => Vec::new(),
        "stream" => {
            let count = params.get("count").and_then(Value::as_u64).unwrap_or(0);
            (0..count)
                .map(|n| result(json!({"reply": "Item", "n": n})))
                .chain(std::iter::once(success()))
                .collect()
        }
        "crash" => return None,
        _ => vec![error(-32601, "Method not found")],
    };

    Some(lines)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) != Some("interactive") {
        eprintln!("Usage: mock_psg_client interactive -server-mode [-debug-printout some]");
        std::process::exit(2);
    }
    info!("Mock server started with {:?}", args);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unparsable request {:?}: {}", line, e);
                let reply = json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null});
                stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
                stdout.flush().await?;
                continue;
            }
        };

        let Some(replies) = script(&request) else {
            info!("Scripted crash");
            std::process::exit(3);
        };

        for reply in replies {
            debug!("Replying: {}", reply);
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
    }

    info!("stdin closed, exiting");
    Ok(())
}
