//! Client configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::jsonrpc::{RpcError, RpcResult};

/// Binary looked up on `PATH` when the requested one is not executable
pub const FALLBACK_BINARY: &str = "psg_client";

/// Default per-line reply timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How much of the exchange is echoed to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerboseLevel {
    #[default]
    Quiet = 0,
    /// Echo every request sent
    Request = 1,
    /// Also echo every raw reply line
    Response = 2,
    /// Also ask the server for its debug printout
    Debug = 3,
}

impl VerboseLevel {
    /// Level from the number of `-v` flags
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => VerboseLevel::Quiet,
            1 => VerboseLevel::Request,
            2 => VerboseLevel::Response,
            _ => VerboseLevel::Debug,
        }
    }
}

/// Settings for one client session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub binary: PathBuf,
    pub timeout: Duration,
    pub verbose: VerboseLevel,
}

impl ClientConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
            verbose: VerboseLevel::Quiet,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: VerboseLevel) -> Self {
        self.verbose = verbose;
        self
    }

    /// Arguments selecting the server's line-delimited JSON-RPC mode
    pub fn command_args(&self) -> Vec<&'static str> {
        let mut args = vec!["interactive", "-server-mode"];
        if self.verbose >= VerboseLevel::Debug {
            args.extend(["-debug-printout", "some"]);
        }
        args
    }
}

/// Resolve the server binary: the requested one if executable, else
/// [`FALLBACK_BINARY`] from `PATH`.
pub fn resolve_binary(requested: &Path) -> RpcResult<PathBuf> {
    if let Ok(found) = which::which(requested) {
        return Ok(found);
    }

    match which::which(FALLBACK_BINARY) {
        Ok(found) => {
            log::info!(
                "{} is not executable, using {}",
                requested.display(),
                found.display()
            );
            Ok(found)
        }
        Err(_) => Err(RpcError::BinaryNotFound(requested.display().to_string())),
    }
}
