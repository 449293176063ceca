pub mod cli;
pub mod config;
pub mod ids;
pub mod jsonrpc;
pub mod scenario;

// 公開API
pub use config::{ClientConfig, VerboseLevel};
pub use jsonrpc::{PsgClient, ReplyCollector, Request, RequestGenerator, RpcError, RpcResult};
pub use scenario::{get_ids, test_all, Verdict};
