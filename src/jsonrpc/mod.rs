//! Line-delimited JSON-RPC 2.0 client for a server subprocess
//!
//! ## 主要コンポーネント
//!
//! - [`message`]: request encoding with `<method>_<n>` correlation ids
//! - [`transport`]: `PsgClient` - child process, stdout reader task, pending queue
//! - [`reply`]: `ReplyCollector` - decodes and classifies the replies to one request
//! - [`error`]: transport-level error taxonomy
//!
//! ## 使用例
//!
//! ```rust,no_run
//! use psg_harness::config::ClientConfig;
//! use psg_harness::jsonrpc::{params, PsgClient};
//! use serde_json::json;
//!
//! # async fn run() -> psg_harness::jsonrpc::RpcResult<()> {
//! let mut client = PsgClient::open(&ClientConfig::new("./psg_client")).await?;
//! client.send("resolve", params([("bio_id", json!(["NC_000024"]))])).await?;
//!
//! let mut replies = client.receive();
//! while let Some(reply) = replies.next_reply().await? {
//!     println!("{}", reply);
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod message;
pub mod reply;
pub mod transport;

// Re-export main types for convenience
pub use error::{RpcError, RpcResult};
pub use message::{params, Params, Request, RequestGenerator, JSONRPC_VERSION};
pub use reply::{classify, ReplyCollector, Step, STATUS_SUCCESS};
pub use transport::PsgClient;
