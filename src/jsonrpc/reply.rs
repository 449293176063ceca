//! Reply collection
//!
//! The server answers one request with zero or more streamed items
//! (`result.reply` present) followed by exactly one terminal line: either a
//! terminal reply (`result.status`) or a JSON-RPC error envelope. The
//! collector turns those lines into a finite sequence: streamed items are
//! yielded as they arrive, a failed terminal reply or an error is yielded as
//! the last element, and a successful terminal reply ends the sequence
//! without yielding anything.

use log::debug;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::error::{RpcError, RpcResult};
use crate::config::VerboseLevel;

/// Terminal status of a successful reply
pub const STATUS_SUCCESS: &str = "Success";

/// Outcome of classifying one decoded line
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Streamed item; more lines follow for the same request
    Item(Value),
    /// Terminal element; nothing follows
    Last(Value),
    /// Successful terminal reply; the sequence ends empty-handed
    Done,
}

/// Classify one decoded reply line.
///
/// - no `result`: terminal; the `error` object wrapped as `{"error": ...}`,
///   or the whole line when there is no `error` either
/// - `result.reply` present: streamed item, the `result` object
/// - otherwise terminal reply: the `result` object unless its status is
///   [`STATUS_SUCCESS`]
pub fn classify(data: Value) -> Step {
    let result = match data.get("result") {
        Some(result) if !result.is_null() => result.clone(),
        _ => {
            return match data.get("error") {
                Some(error) => Step::Last(json!({ "error": error })),
                None => Step::Last(data),
            };
        }
    };

    if result.get("reply").is_some() {
        return Step::Item(result);
    }

    match result.get("status").and_then(Value::as_str) {
        Some(STATUS_SUCCESS) => Step::Done,
        _ => Step::Last(result),
    }
}

/// Pulls the replies to one request off the pending queue.
///
/// Each pull waits at most `timeout` for the next line, so a slow streamed
/// reply has to keep producing within that window. Any error ends the
/// sequence.
pub struct ReplyCollector<'a> {
    queue: &'a mut mpsc::UnboundedReceiver<String>,
    timeout: Duration,
    verbose: VerboseLevel,
    finished: bool,
}

impl<'a> ReplyCollector<'a> {
    pub fn new(
        queue: &'a mut mpsc::UnboundedReceiver<String>,
        timeout: Duration,
        verbose: VerboseLevel,
    ) -> Self {
        Self {
            queue,
            timeout,
            verbose,
            finished: false,
        }
    }

    /// Next relevant reply, or `None` once the request is complete
    pub async fn next_reply(&mut self) -> RpcResult<Option<Value>> {
        if self.finished {
            return Ok(None);
        }

        let line = match self.pop_line().await {
            Ok(line) => line,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        let data: Value = match serde_json::from_str(&line) {
            Ok(data) => data,
            Err(source) => {
                self.finished = true;
                return Err(RpcError::Decode { line, source });
            }
        };

        match classify(data) {
            Step::Item(item) => Ok(Some(item)),
            Step::Last(last) => {
                self.finished = true;
                Ok(Some(last))
            }
            Step::Done => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Drain the whole sequence
    pub async fn collect_all(mut self) -> RpcResult<Vec<Value>> {
        let mut replies = Vec::new();
        while let Some(reply) = self.next_reply().await? {
            replies.push(reply);
        }
        Ok(replies)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    async fn pop_line(&mut self) -> RpcResult<String> {
        let line = match timeout(self.timeout, self.queue.recv()).await {
            Ok(Some(line)) => line,
            // reader task ended: the server closed its stdout
            Ok(None) => return Err(RpcError::Closed),
            Err(_) => return Err(RpcError::Timeout(self.timeout)),
        };

        let line = line.trim_end().to_string();
        debug!("Received: {}", line);

        if self.verbose >= VerboseLevel::Response {
            eprintln!("{}", line);
        }

        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn queue_with(lines: &[&str]) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            tx.send(format!("{}\n", line)).unwrap();
        }
        // 送信側を保持しないとキューが閉じてしまうのでリークさせる
        std::mem::forget(tx);
        rx
    }

    async fn collect(queue: &mut mpsc::UnboundedReceiver<String>) -> RpcResult<Vec<Value>> {
        ReplyCollector::new(queue, Duration::from_millis(200), VerboseLevel::Quiet)
            .collect_all()
            .await
    }

    #[test]
    fn test_classify_success_is_done() {
        let step = classify(json!({"result": {"status": "Success"}}));
        assert_eq!(step, Step::Done);
    }

    #[test]
    fn test_classify_failure_yields_result() {
        let result = json!({"status": "NotFound", "errors": ["no such id"]});
        let step = classify(json!({"jsonrpc": "2.0", "result": result.clone(), "id": "resolve_1"}));
        assert_eq!(step, Step::Last(result));
    }

    #[test]
    fn test_classify_item() {
        let result = json!({"reply": "BlobInfo", "id": {"blob_id": "4.1234"}});
        let step = classify(json!({"result": result.clone()}));
        assert_eq!(step, Step::Item(result));
    }

    #[test]
    fn test_classify_item_with_status_is_still_an_item() {
        let result = json!({"reply": "BioseqInfo", "status": "Failure", "errors": ["x"]});
        assert_eq!(classify(json!({"result": result.clone()})), Step::Item(result));
    }

    #[test]
    fn test_classify_error_envelope_keeps_only_error() {
        let step = classify(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": "Method not found"},
            "id": "bogus_1"
        }));
        assert_eq!(
            step,
            Step::Last(json!({"error": {"code": -32601, "message": "Method not found"}}))
        );
    }

    #[test]
    fn test_classify_unknown_shape_yields_whole_object() {
        let data = json!({"jsonrpc": "2.0", "id": "resolve_1", "surprise": true});
        assert_eq!(classify(data.clone()), Step::Last(data));

        let data = json!({"result": null, "id": "resolve_1"});
        assert_eq!(classify(data.clone()), Step::Last(data));
    }

    #[test]
    fn test_classify_terminal_without_status_is_surfaced() {
        let result = json!({"errors": ["lost"]});
        assert_eq!(classify(json!({"result": result.clone()})), Step::Last(result));
    }

    #[tokio::test]
    async fn test_success_yields_nothing() {
        let mut queue = queue_with(&[r#"{"jsonrpc":"2.0","result":{"status":"Success"},"id":"resolve_1"}"#]);
        assert!(collect(&mut queue).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_yields_exactly_the_terminal_object() {
        let mut queue = queue_with(&[
            r#"{"result":{"status":"Failure","errors":["boom"]}}"#,
        ]);
        let replies = collect(&mut queue).await.unwrap();
        assert_eq!(replies, vec![json!({"status": "Failure", "errors": ["boom"]})]);
    }

    #[tokio::test]
    async fn test_items_then_terminal() {
        for k in 0..4 {
            for terminal in [
                r#"{"result":{"status":"Success"}}"#,
                r#"{"result":{"status":"Forbidden","errors":["no"]}}"#,
            ] {
                let items: Vec<String> = (0..k)
                    .map(|i| format!(r#"{{"result":{{"reply":"BlobInfo","n":{}}}}}"#, i))
                    .collect();
                let mut lines: Vec<&str> = items.iter().map(String::as_str).collect();
                lines.push(terminal);

                let mut queue = queue_with(&lines);
                let replies = collect(&mut queue).await.unwrap();

                let streamed: Vec<&Value> =
                    replies.iter().filter(|r| r.get("reply").is_some()).collect();
                assert_eq!(streamed.len(), k);
                for (i, item) in streamed.iter().enumerate() {
                    assert_eq!(item["n"], json!(i));
                }

                let expected_len = if terminal.contains("Success") { k } else { k + 1 };
                assert_eq!(replies.len(), expected_len);
            }
        }
    }

    #[tokio::test]
    async fn test_collector_stops_at_terminal_line() {
        let mut queue = queue_with(&[
            r#"{"result":{"status":"Success"}}"#,
            r#"{"result":{"status":"NotFound","errors":["next request"]}}"#,
        ]);

        assert!(collect(&mut queue).await.unwrap().is_empty());

        // 次のリクエストの応答はキューに残っている
        let replies = collect(&mut queue).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["status"], "NotFound");
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let mut queue = queue_with(&[
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":"blob_3"}"#,
        ]);
        let replies = collect(&mut queue).await.unwrap();
        assert_eq!(
            replies,
            vec![json!({"error": {"code": -32602, "message": "Invalid params"}})]
        );
    }

    #[tokio::test]
    async fn test_malformed_line_is_a_decode_error() {
        let mut queue = queue_with(&["this is not json"]);
        let mut collector =
            ReplyCollector::new(&mut queue, Duration::from_millis(200), VerboseLevel::Quiet);

        match collector.next_reply().await {
            Err(RpcError::Decode { line, .. }) => assert_eq!(line, "this is not json"),
            other => panic!("Expected decode error, got {:?}", other),
        }
        assert!(collector.is_finished());
        assert!(collector.next_reply().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_when_nothing_arrives() {
        let mut queue = queue_with(&[]);
        let started = Instant::now();

        let result = collect(&mut queue).await;

        assert!(matches!(result, Err(RpcError::Timeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (tx, mut queue) = mpsc::unbounded_channel::<String>();
        tx.send(r#"{"result":{"reply":"BioseqInfo"}}"#.to_string()).unwrap();
        drop(tx);

        let mut collector =
            ReplyCollector::new(&mut queue, Duration::from_secs(5), VerboseLevel::Quiet);
        assert!(collector.next_reply().await.unwrap().is_some());
        assert!(matches!(collector.next_reply().await, Err(RpcError::Closed)));
    }
}
