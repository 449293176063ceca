use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSONRPC version string carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Named request parameters (keys are unique)
pub type Params = Map<String, Value>;

/// JSONRPC 2.0 request as sent to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// JSONRPC version - MUST be exactly "2.0"
    pub jsonrpc: String,

    /// Method name to be invoked
    pub method: String,

    /// Named parameters for the method
    pub params: Params,

    /// Correlation id, `<method>_<ordinal>`
    pub id: String,
}

impl Request {
    /// Create a new request
    pub fn new(method: impl Into<String>, params: Params, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Ordinal part of the correlation id, if the id has the `<method>_<n>` shape
    pub fn ordinal(&self) -> Option<u64> {
        self.id
            .strip_prefix(self.method.as_str())?
            .strip_prefix('_')?
            .parse()
            .ok()
    }
}

/// Single-line JSON encoding, field order `jsonrpc`, `method`, `params`, `id`
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Builds requests with ids numbered by a counter shared across all methods.
///
/// The counter is incremented before use, so the first request gets ordinal 1.
/// Each client owns its own generator; the `generate` command owns another.
#[derive(Debug, Default)]
pub struct RequestGenerator {
    request_no: u64,
}

impl RequestGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next request for `method`
    pub fn next_request(&mut self, method: &str, params: Params) -> Request {
        self.request_no += 1;
        Request::new(method, params, format!("{}_{}", method, self.request_no))
    }

    /// Build the next request and encode it as one line of JSON
    pub fn generate(&mut self, method: &str, params: Params) -> String {
        self.next_request(method, params).to_string()
    }

    /// Number of requests issued so far
    pub fn issued(&self) -> u64 {
        self.request_no
    }
}

/// Build a `Params` map from `(name, value)` pairs
pub fn params<I, K>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
