//! Test scenarios against a running server
//!
//! `get_ids` discovers blob and chunk ids for a set of bio ids; `test_all`
//! then walks every method through its parameter space, one request per
//! `(parameter, value)` pair with the remaining parameters drawn at random,
//! and tallies the replies.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;

use crate::ids::{bio_id_table, powerset, BioId, IdTable};
use crate::jsonrpc::{params, Params, PsgClient, RpcResult};

/// Terminal statuses that are expected outcomes rather than failures
pub const ACCEPTABLE_STATUSES: [&str; 2] = ["NotFound", "Forbidden"];

/// Chunk number appended after the real ones for every blob
pub const CHUNK_SENTINEL: u64 = 999_999_999;

/// Default cap for `get_ids`
pub const DEFAULT_MAX_IDS: usize = 1000;

const INFO_FLAGS: [&str; 13] = [
    "all-info-except",
    "canonical-id",
    "name",
    "other-ids",
    "molecule-type",
    "length",
    "chain-state",
    "state",
    "blob-id",
    "tax-id",
    "hash",
    "date-changed",
    "gi",
];

const INCLUDE_DATA: [&str; 5] = ["no-tse", "slim-tse", "smart-tse", "whole-tse", "orig-tse"];
const ACC_SUBSTITUTION: [&str; 3] = ["default", "limited", "never"];

/// Candidate values per request parameter; `None` means "leave it out"
#[derive(Debug, Clone)]
pub struct ParamSpace {
    values: BTreeMap<&'static str, Vec<Option<Value>>>,
}

impl ParamSpace {
    /// Build the space; `exclude_blobs` candidates are drawn from `blob_ids`
    pub fn new<R: Rng + ?Sized>(blob_ids: &IdTable, rng: &mut R) -> Self {
        let blob_ids_only: Vec<Value> = blob_ids
            .column("blob_id")
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get(0).cloned())
            .collect();

        let mut values = BTreeMap::new();

        values.insert(
            "include_info",
            std::iter::once(None)
                .chain(powerset(&INFO_FLAGS).into_iter().map(|s| Some(json!(s))))
                .collect(),
        );
        values.insert("include_data", with_absent(&INCLUDE_DATA));
        values.insert(
            "exclude_blobs",
            std::iter::once(None)
                .chain((0..4).map(|k| {
                    let picked: Vec<Value> = (0..k)
                        .filter_map(|_| blob_ids_only.choose(rng).cloned())
                        .collect();
                    Some(Value::Array(picked))
                }))
                .collect(),
        );
        values.insert("acc_substitution", with_absent(&ACC_SUBSTITUTION));
        values.insert("resend_timeout", vec![None, Some(json!(0)), Some(json!(100))]);
        values.insert(
            "user_args",
            (0..7).flat_map(|_| with_absent(&["mock", "bogus=fake"])).collect(),
        );

        Self { values }
    }

    /// Candidates for `name`; empty for unknown parameters
    pub fn values(&self, name: &str) -> &[Option<Value>] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Parameters for one request: `param` set to `value`, every other name
    /// in `names` drawn at random. Absent values are left out; a name listed
    /// twice keeps its last value.
    pub fn this_plus_random<R: Rng + ?Sized>(
        &self,
        names: &[&str],
        param: &str,
        value: &Option<Value>,
        rng: &mut R,
    ) -> Params {
        let mut params = Params::new();

        for &other in names {
            let chosen = if other == param {
                value.clone()
            } else {
                self.values(other).choose(rng).cloned().flatten()
            };

            match chosen {
                Some(v) => {
                    params.insert(other.to_string(), v);
                }
                None => {
                    params.remove(other);
                }
            }
        }

        params
    }
}

fn with_absent(values: &[&str]) -> Vec<Option<Value>> {
    std::iter::once(None)
        .chain(values.iter().map(|v| Some(json!(v))))
        .collect()
}

/// A reply worth printing
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub prefix: Vec<String>,
    pub messages: Vec<String>,
    /// Counts against the verdict
    pub failure: bool,
}

impl Report {
    /// `<prefix>: '<m1>', '<m2>' for request '<request>'`
    pub fn render(&self, request: &str) -> String {
        format!(
            "{}: '{}' for request '{}'",
            self.prefix.join(" "),
            self.messages.join("', '"),
            request
        )
    }
}

/// Decide what a collected reply means.
///
/// Replies carrying a `status` are reported and fail unless the status is
/// acceptable; error envelopes and unknown shapes always fail; plain
/// streamed items are ignored.
pub fn assess(reply: &Value) -> Option<Report> {
    let reply_type = reply.get("reply").filter(|t| !t.is_null());

    if let Some(status) = reply.get("status").filter(|s| !s.is_null()) {
        let status = display(status);
        let messages = match reply.get("errors") {
            Some(Value::Array(errors)) => errors.iter().map(display).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![display(other)],
        };

        return Some(Report {
            failure: !ACCEPTABLE_STATUSES.contains(&status.as_str()),
            prefix: vec![
                reply_type
                    .filter(|t| is_truthy(t))
                    .map(display)
                    .unwrap_or_else(|| "Reply".to_string()),
                status,
            ],
            messages,
        });
    }

    if reply_type.is_some() {
        return None;
    }

    let error = reply.get("error");
    let code = error.and_then(|e| e.get("code")).filter(|c| is_truthy(c));
    let prefix = match code {
        Some(code) => vec!["Error".to_string(), display(code)],
        None => vec!["Unknown reply".to_string()],
    };
    let message = error
        .and_then(|e| e.get("message"))
        .map(display)
        .unwrap_or_else(|| display(reply));

    Some(Report {
        prefix,
        messages: vec![message],
        failure: true,
    })
}

/// Strings as is, everything else as JSON
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Chunk id rows for a blob's `id2_info` (`<sat>.<info>.<chunks>[...]`):
/// `[i, id2_info]` for every chunk, then `[CHUNK_SENTINEL, id2_info]`
pub fn chunk_ids_for(id2_info: &str) -> Vec<Value> {
    let Some(chunks) = id2_info.split('.').nth(2).filter(|c| !c.is_empty()) else {
        return Vec::new();
    };

    let chunks: u64 = match chunks.parse() {
        Ok(n) => n,
        Err(e) => {
            warn!("Ignoring id2_info {:?}: {}", id2_info, e);
            return Vec::new();
        }
    };

    (1..=chunks)
        .chain(std::iter::once(CHUNK_SENTINEL))
        .map(|chunk| json!([chunk, id2_info]))
        .collect()
}

/// Discover blob and chunk ids from `BlobInfo` items of `biodata` replies.
///
/// Stops once both lists have at least `max` entries. Returns the
/// `blob_id` and `chunk_id` tables.
pub async fn get_ids(
    client: &mut PsgClient,
    bio_ids: &[BioId],
    max: usize,
) -> RpcResult<(IdTable, IdTable)> {
    let mut blob_ids = Vec::new();
    let mut chunk_ids = Vec::new();

    for bio_id in bio_ids {
        client
            .send(
                "biodata",
                params([("bio_id", json!(bio_id)), ("include_data", json!("no-tse"))]),
            )
            .await?;

        let mut replies = client.receive();
        while let Some(reply) = replies.next_reply().await? {
            if reply.get("reply").and_then(Value::as_str) != Some("BlobInfo") {
                continue;
            }

            if let Some(Value::Object(id)) = reply.get("id") {
                if !id.is_empty() {
                    blob_ids.push(Value::Array(id.values().cloned().collect()));
                }
            }

            if let Some(id2_info) = reply.get("id2_info").and_then(Value::as_str) {
                chunk_ids.extend(chunk_ids_for(id2_info));
            }
        }

        if blob_ids.len() >= max && chunk_ids.len() >= max {
            break;
        }
    }

    info!("Discovered {} blob ids, {} chunk ids", blob_ids.len(), chunk_ids.len());

    Ok((
        IdTable::new().with_column("blob_id", blob_ids),
        IdTable::new().with_column("chunk_id", chunk_ids),
    ))
}

/// Outcome of a full test pass
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Every reply was acceptable and every method had ids
    pub passed: bool,
    /// Requests sent per method, in the order the methods ran
    pub summary: Vec<(&'static str, usize)>,
}

struct MethodPlan<'a> {
    method: &'static str,
    ids: &'a IdTable,
    params: &'static [&'static str],
}

/// Send every method through its parameter space.
///
/// Problem replies are written to `reports`; transport failures abort the
/// pass and are returned as errors.
pub async fn test_all<R, W>(
    client: &mut PsgClient,
    bio_ids: &[BioId],
    blob_ids: &IdTable,
    named_annots: &IdTable,
    chunk_ids: &IdTable,
    rng: &mut R,
    reports: &mut W,
) -> RpcResult<Verdict>
where
    R: Rng + ?Sized,
    W: Write + ?Sized,
{
    let space = ParamSpace::new(blob_ids, rng);
    let bio_ids = bio_id_table(bio_ids);

    // user_argsはリクエスト数を増やすために使う
    let plans = [
        MethodPlan { method: "resolve", ids: &bio_ids, params: &["include_info", "acc_substitution"] },
        MethodPlan {
            method: "biodata",
            ids: &bio_ids,
            params: &["include_data", "exclude_blobs", "acc_substitution", "resend_timeout"],
        },
        MethodPlan { method: "blob", ids: blob_ids, params: &["include_data", "user_args"] },
        MethodPlan { method: "named_annot", ids: named_annots, params: &["include_data", "acc_substitution"] },
        MethodPlan { method: "chunk", ids: chunk_ids, params: &["user_args", "user_args"] },
    ];

    let mut passed = true;
    let mut summary = Vec::with_capacity(plans.len());

    for plan in &plans {
        let mut sent = 0;

        'values: for &param in plan.params {
            for value in space.values(param) {
                let Some(mut request_params) = plan.ids.random_pick(rng) else {
                    writeln!(
                        reports,
                        "Error: 'No IDs for the \"{}\" requests, skipping'",
                        plan.method
                    )?;
                    passed = false;
                    break 'values;
                };

                for (name, value) in space.this_plus_random(plan.params, param, value, rng) {
                    request_params.insert(name, value);
                }

                sent += 1;
                let request = client.send(plan.method, request_params).await?;

                let mut replies = client.receive();
                while let Some(reply) = replies.next_reply().await? {
                    if let Some(report) = assess(&reply) {
                        passed &= !report.failure;
                        writeln!(reports, "{}", report.render(&request))?;
                    }
                }
            }
        }

        debug!("{}: {} requests", plan.method, sent);
        summary.push((plan.method, sent));
    }

    Ok(Verdict { passed, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_assess_success_item_is_ignored() {
        assert_eq!(assess(&json!({"reply": "BlobInfo", "id": {"sat": 4}})), None);
    }

    #[test]
    fn test_assess_acceptable_status() {
        let report = assess(&json!({"status": "NotFound", "errors": ["Bio id not found"]})).unwrap();
        assert!(!report.failure);
        assert_eq!(report.prefix, vec!["Reply", "NotFound"]);
        assert_eq!(
            report.render("{\"id\":\"resolve_1\"}"),
            "Reply NotFound: 'Bio id not found' for request '{\"id\":\"resolve_1\"}'"
        );

        let report = assess(&json!({"status": "Forbidden", "errors": []})).unwrap();
        assert!(!report.failure);
    }

    #[test]
    fn test_assess_failed_item_status() {
        let report = assess(&json!({
            "reply": "BioseqInfo",
            "status": "Failure",
            "errors": ["first", {"code": 3}]
        }))
        .unwrap();
        assert!(report.failure);
        assert_eq!(report.prefix, vec!["BioseqInfo", "Failure"]);
        assert_eq!(report.render("r"), "BioseqInfo Failure: 'first', '{\"code\":3}' for request 'r'");
    }

    #[test]
    fn test_assess_empty_reply_type_falls_back() {
        let report = assess(&json!({"reply": "", "status": "Failure", "errors": ["x"]})).unwrap();
        assert!(report.failure);
        assert_eq!(report.prefix, vec!["Reply", "Failure"]);

        // ステータスなしの空reply型は通常の項目扱い
        assert_eq!(assess(&json!({"reply": ""})), None);
    }

    #[test]
    fn test_assess_error_envelope() {
        let report =
            assess(&json!({"error": {"code": -32601, "message": "Method not found"}})).unwrap();
        assert!(report.failure);
        assert_eq!(report.prefix, vec!["Error", "-32601"]);
        assert_eq!(report.messages, vec!["Method not found"]);
    }

    #[test]
    fn test_assess_unknown_reply() {
        let reply = json!({"jsonrpc": "2.0", "id": "blob_9"});
        let report = assess(&reply).unwrap();
        assert!(report.failure);
        assert_eq!(report.prefix, vec!["Unknown reply"]);
        assert_eq!(report.messages, vec![reply.to_string()]);

        let report = assess(&json!({"error": {"code": 0, "message": "odd"}})).unwrap();
        assert_eq!(report.prefix, vec!["Unknown reply"]);
        assert_eq!(report.messages, vec!["odd"]);
    }

    #[test]
    fn test_chunk_ids_for() {
        let rows = chunk_ids_for("4.5678.3");
        assert_eq!(
            rows,
            vec![
                json!([1, "4.5678.3"]),
                json!([2, "4.5678.3"]),
                json!([3, "4.5678.3"]),
                json!([CHUNK_SENTINEL, "4.5678.3"]),
            ]
        );

        assert_eq!(chunk_ids_for("4.5678.0"), vec![json!([CHUNK_SENTINEL, "4.5678.0"])]);
        assert!(chunk_ids_for("4.5678").is_empty());
        assert!(chunk_ids_for("4.5678.x").is_empty());
        assert!(chunk_ids_for("").is_empty());
    }

    #[test]
    fn test_param_space_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let blob_ids = IdTable::new().with_column("blob_id", vec![json!([4, 1234]), json!([4, 99])]);
        let space = ParamSpace::new(&blob_ids, &mut rng);

        assert_eq!(space.values("include_info").len(), 1 + 8192);
        assert_eq!(space.values("include_data").len(), 6);
        assert_eq!(space.values("acc_substitution").len(), 4);
        assert_eq!(space.values("resend_timeout").len(), 3);
        assert_eq!(space.values("user_args").len(), 21);
        assert!(space.values("nonexistent").is_empty());

        let exclude = space.values("exclude_blobs");
        assert_eq!(exclude.len(), 5);
        assert_eq!(exclude[0], None);
        for (k, value) in exclude[1..].iter().enumerate() {
            let picked = value.as_ref().unwrap().as_array().unwrap();
            assert_eq!(picked.len(), k);
            assert!(picked.iter().all(|v| v == &json!(4)));
        }
    }

    #[test]
    fn test_this_plus_random_fixes_the_param() {
        let mut rng = StdRng::seed_from_u64(2);
        let space = ParamSpace::new(&IdTable::new(), &mut rng);
        let names = ["include_data", "exclude_blobs", "acc_substitution", "resend_timeout"];

        for _ in 0..20 {
            let params =
                space.this_plus_random(&names, "resend_timeout", &Some(json!(100)), &mut rng);
            assert_eq!(params["resend_timeout"], json!(100));
            assert!(params.keys().all(|k| names.contains(&k.as_str())));
        }

        let params = space.this_plus_random(&["user_args"], "user_args", &None, &mut rng);
        assert!(params.is_empty());
    }

    #[test]
    fn test_this_plus_random_duplicate_names() {
        let mut rng = StdRng::seed_from_u64(3);
        let space = ParamSpace::new(&IdTable::new(), &mut rng);

        let params = space.this_plus_random(
            &["user_args", "user_args"],
            "user_args",
            &Some(json!("mock")),
            &mut rng,
        );
        assert_eq!(params.len(), 1);
        assert_eq!(params["user_args"], json!("mock"));
    }
}
